//! # Nodegraph Model
//!
//! Tree of polymorphic nodes addressed by structural paths.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ registry: type declarations → TypeShape     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ format: JSON document → RootSet             │
//! │  - Validate every $type before conversion   │
//! │  - Convert members by declared field type   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ accessor: Path → read / write / navigate    │
//! │ schema: writes checked against declarations │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nodegraph_model::{format, FieldType, Path, TypeDecl, TypeShapeRegistry};
//!
//! let mut registry = TypeShapeRegistry::new();
//! registry.register(TypeDecl::node("Constant").field("value", FieldType::Float))?;
//! registry.register(TypeDecl::node("Sum").multi_port("inputs"))?;
//!
//! let mut roots = format::from_json_str(&json, &registry)?;
//! let path: Path = "[1].inputs[2].value".parse()?;
//! roots.set_value(&path, 4.0)?;
//! assert_eq!(roots.get_value::<f64>(&path)?, 4.0);
//!
//! println!("{}", roots.tree_view(None));
//! ```

pub mod accessor;
mod error;
pub mod format;
mod path;
mod registry;
mod roots;
pub mod schema;
mod value;
mod visitor;

pub use error::{AccessError, AccessResult, DocumentError, RegistryError, TypeTagIssue};
pub use path::{Path, PathParseError, Step};
pub use registry::{
    FieldDecl, FieldType, MemberShape, TypeDecl, TypeKind, TypeShape, TypeShapeRegistry,
};
pub use roots::{Annotate, RootSet, BRANCH, LAST_BRANCH, PIPE, SPACE};
pub use schema::Slot;
pub use value::{FromValue, Members, Node, Record, Tagged, Value, ValueKind, ValueRef, TYPE_TAG_KEY};
pub use visitor::{child_links, walk_node, walk_roots, ChildLink, Port, Visitor};
