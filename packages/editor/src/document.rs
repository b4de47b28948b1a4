//! # Document Handle
//!
//! A Document owns one root set together with its metadata cache and its
//! history. Documents can be:
//! - **Memory-backed**: built from roots or JSON text, for tests and tools
//! - **File-backed**: loaded from disk and saved back
//!
//! ## Lifecycle
//!
//! ```text
//! Load → Edit → Commit → Undo/Redo → Save
//!   ↓      ↓       ↓          ↓         ↓
//! JSON   Ops    Step      Restore     JSON
//! ```
//!
//! Every structural operation and every history transition marks the tree
//! cache dirty; the next metadata query rebuilds it.

use crate::cache::{TreeCache, ValidationReport};
use crate::history::{History, JsonSnapshots};
use crate::operations::AtomicOperation;
use crate::EditorError;
use nodegraph_model::{format, schema, Annotate, FromValue, Path, RootSet, TypeShapeRegistry};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Editable node-tree document
#[derive(Debug)]
pub struct Document {
    /// Source file, if file-backed
    pub path: Option<PathBuf>,

    /// Increments on each change to the tree
    pub version: u64,

    roots: RootSet,
    registry: Rc<TypeShapeRegistry>,
    cache: TreeCache,
    history: History,
    dirty: bool,
}

impl Document {
    /// Create an empty memory-backed document
    pub fn new(registry: Rc<TypeShapeRegistry>) -> Self {
        Self::from_roots(RootSet::new(), registry)
    }

    pub fn from_roots(roots: RootSet, registry: Rc<TypeShapeRegistry>) -> Self {
        Self {
            path: None,
            version: 0,
            roots,
            registry,
            cache: TreeCache::new(),
            history: History::new(),
            dirty: false,
        }
    }

    /// Parse a memory-backed document
    pub fn from_json(json: &str, registry: Rc<TypeShapeRegistry>) -> Result<Self, EditorError> {
        let roots = format::from_json_str(json, &registry)?;
        Ok(Self::from_roots(roots, registry))
    }

    /// Load a file-backed document
    pub fn load(path: impl Into<PathBuf>, registry: Rc<TypeShapeRegistry>) -> Result<Self, EditorError> {
        let path = path.into();
        let json = std::fs::read_to_string(&path)?;
        let mut doc = Self::from_json(&json, registry)?;
        debug!(path = %path.display(), roots = doc.roots.len(), "Loaded document");
        doc.path = Some(path);
        Ok(doc)
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Save to the backing file
    pub fn save(&mut self) -> Result<(), EditorError> {
        let path = self.path.clone().ok_or(EditorError::NotFileBacked)?;
        self.save_as(path)
    }

    /// Save to `path`, which becomes the backing file. A tree that no longer
    /// fits its declarations (after a snapshot edit) is not written.
    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<(), EditorError> {
        let path = path.into();
        schema::check_roots(&self.roots, &self.registry)?;
        std::fs::write(&path, format::to_json_string_pretty(&self.roots)?)?;
        debug!(path = %path.display(), "Saved document");
        self.path = Some(path);
        self.dirty = false;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(format::to_json_string(&self.roots)?)
    }

    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    pub fn registry(&self) -> &TypeShapeRegistry {
        &self.registry
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Check if document has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn get_value<T: FromValue>(&self, path: &Path) -> Result<T, EditorError> {
        Ok(self.roots.get_value(path)?)
    }

    fn touched(&mut self, structural: bool) {
        self.version += 1;
        self.dirty = true;
        if structural {
            self.cache.mark_dirty();
        }
    }

    /// Apply an operation, recording it in the open history step. Writes
    /// that do not fit the registry's declarations are refused.
    pub fn apply(&mut self, op: AtomicOperation) -> Result<u64, EditorError> {
        let structural = self
            .history
            .add_checked_operation(&mut self.roots, op, &self.registry)?
            .touches_structure();
        self.touched(structural);
        Ok(self.version)
    }

    /// Start a coarse edit recorded by snapshot; follow with
    /// [`edit_roots`](Self::edit_roots)
    pub fn begin_snapshot_edit(&mut self) -> Result<(), EditorError> {
        let codec = JsonSnapshots::new(&self.registry);
        self.history.record_snapshot(&self.roots, &codec)?;
        Ok(())
    }

    /// Direct access to the tree during a snapshot edit
    pub fn edit_roots(&mut self) -> Result<&mut RootSet, EditorError> {
        let snapshot_edit = self
            .history
            .open_step()
            .map_or(false, |step| step.snapshot_based);
        if !snapshot_edit {
            return Err(EditorError::NoSnapshotEdit);
        }
        self.touched(true);
        Ok(&mut self.roots)
    }

    /// Close the open step. Returns whether an undo point was created.
    pub fn commit(&mut self, description: impl Into<String>) -> bool {
        let committed = self.history.commit(description);
        if committed {
            self.cache.mark_dirty();
        }
        committed
    }

    /// Revert the uncommitted step
    pub fn discard(&mut self) -> Result<bool, EditorError> {
        let codec = JsonSnapshots::new(&self.registry);
        let discarded = self.history.discard_open_step(&mut self.roots, &codec)?;
        if discarded {
            self.touched(true);
        }
        Ok(discarded)
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let codec = JsonSnapshots::new(&self.registry);
        let undone = self.history.undo(&mut self.roots, &codec)?;
        if undone {
            self.touched(true);
        }
        Ok(undone)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let codec = JsonSnapshots::new(&self.registry);
        let redone = self.history.redo(&mut self.roots, &codec)?;
        if redone {
            self.touched(true);
        }
        Ok(redone)
    }

    pub fn ensure_snapshot(&mut self) -> Result<bool, EditorError> {
        let codec = JsonSnapshots::new(&self.registry);
        Ok(self.history.ensure_snapshot(&self.roots, &codec)?)
    }

    /// Metadata for the current tree, rebuilt if stale
    pub fn metadata(&mut self) -> &TreeCache {
        self.cache.refresh_if_needed(&self.roots, &self.registry);
        &self.cache
    }

    pub fn validate(&mut self) -> ValidationReport {
        self.cache.refresh_if_needed(&self.roots, &self.registry);
        self.cache.validate(&self.roots)
    }

    pub fn tree_view(&self, annotate: Option<Annotate<'_>>) -> String {
        self.roots.tree_view(annotate)
    }
}
