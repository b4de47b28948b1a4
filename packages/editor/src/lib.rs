//! # Nodegraph Editor
//!
//! Editing engine over the node-tree model: derived metadata and
//! transactional undo.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: RootSet + Path accessor + registry   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Document lifecycle                  │
//! │  - Apply atomic operations with inverses    │
//! │  - Group them into committed history steps  │
//! │  - Snapshot steps for coarse edits          │
//! │  - Invalidate the tree cache on change      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ cache: NodeMetadata index, tree view        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The tree is the source of truth**: metadata is a derived view
//! 2. **One undo point per action**: operations accumulate until commit
//! 3. **Never partially applied**: undo and redo install a complete tree or
//!    nothing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nodegraph_editor::{AtomicOperation, Document};
//!
//! let mut doc = Document::load("graph.json", registry)?;
//!
//! doc.apply(AtomicOperation::insert("[1].inputs[1]".parse()?, node))?;
//! doc.commit("insert");
//!
//! println!("{}", doc.metadata().render_tree(None));
//!
//! doc.undo()?;
//! doc.save()?;
//! ```

mod cache;
mod document;
mod errors;
mod history;
mod operations;

pub use cache::{IssueKind, MetaId, NodeMetadata, TreeCache, ValidationIssue, ValidationReport};
pub use document::Document;
pub use errors::EditorError;
pub use history::{
    History, HistoryError, HistoryState, HistoryStep, JsonSnapshots, SnapshotCodec,
    DEFAULT_MAX_LEVELS,
};
pub use operations::{AtomicOperation, RecordedOperation};

// Re-export the model for convenience
pub use nodegraph_model as model;
