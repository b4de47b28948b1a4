//! # Atomic Operations
//!
//! Minimal, independently invertible tree mutations addressed by [`Path`].
//!
//! ## Semantics
//!
//! ### SetValue
//! - Assigns a member, collection element or root
//! - The new value must match the kind already there (or either is null);
//!   [`AtomicOperation::check`] also holds it to the declared type
//!
//! ### Insert / Remove
//! - Path ends in an index inside a collection or the root set
//! - Insert at `len` appends
//!
//! ### ReplaceSubtree
//! - Swaps the node at a path (or fills a null port) with another node
//!
//! The inverse of an operation is computed against the tree as it is
//! *before* the operation is applied.

use nodegraph_model::{
    schema, AccessError, AccessResult, Node, Path, RootSet, TypeShapeRegistry, Value, ValueKind,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AtomicOperation {
    SetValue { path: Path, value: Value },
    Insert { path: Path, value: Value },
    Remove { path: Path },
    ReplaceSubtree { path: Path, node: Node },
}

impl AtomicOperation {
    pub fn set(path: Path, value: impl Into<Value>) -> Self {
        Self::SetValue {
            path,
            value: value.into(),
        }
    }

    pub fn insert(path: Path, value: impl Into<Value>) -> Self {
        Self::Insert {
            path,
            value: value.into(),
        }
    }

    pub fn remove(path: Path) -> Self {
        Self::Remove { path }
    }

    pub fn replace(path: Path, node: Node) -> Self {
        Self::ReplaceSubtree { path, node }
    }

    pub fn path(&self) -> &Path {
        match self {
            AtomicOperation::SetValue { path, .. }
            | AtomicOperation::Insert { path, .. }
            | AtomicOperation::Remove { path }
            | AtomicOperation::ReplaceSubtree { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AtomicOperation::SetValue { .. } => "set_value",
            AtomicOperation::Insert { .. } => "insert",
            AtomicOperation::Remove { .. } => "remove",
            AtomicOperation::ReplaceSubtree { .. } => "replace_subtree",
        }
    }

    /// Whether applying this operation can change which nodes exist
    pub fn is_structural(&self) -> bool {
        match self {
            AtomicOperation::SetValue { path, value } => {
                value.is_structural() || path.len() == 1
            }
            _ => true,
        }
    }

    /// Whether applying `self` keeps `roots` conforming to the declarations
    /// in `registry`. Removal always does.
    pub fn check(&self, roots: &RootSet, registry: &TypeShapeRegistry) -> AccessResult<()> {
        match self {
            AtomicOperation::SetValue { path, value } | AtomicOperation::Insert { path, value } => {
                schema::check_write(roots, registry, path, value)
            }
            AtomicOperation::Remove { .. } => Ok(()),
            AtomicOperation::ReplaceSubtree { path, node } => {
                schema::check_node_write(roots, registry, path, node)
            }
        }
    }

    pub fn apply(&self, roots: &mut RootSet) -> AccessResult<()> {
        match self {
            AtomicOperation::SetValue { path, value } => {
                roots.set_value(path, value.clone())?;
            }
            AtomicOperation::Insert { path, value } => {
                roots.insert_at(path, value.clone())?;
            }
            AtomicOperation::Remove { path } => {
                roots.remove_at(path)?;
            }
            AtomicOperation::ReplaceSubtree { path, node } => {
                let current = roots.get_ref(path)?;
                if current.as_node().is_none() && current.kind() != ValueKind::Null {
                    return Err(AccessError::type_mismatch(path, ValueKind::Node, current.kind()));
                }
                roots.set_value(path, node.clone())?;
            }
        }
        Ok(())
    }

    /// Operation that undoes `self` when applied right after it
    pub fn to_inverse(&self, roots: &RootSet) -> AccessResult<AtomicOperation> {
        match self {
            AtomicOperation::SetValue { path, .. } => Ok(AtomicOperation::SetValue {
                path: path.clone(),
                value: roots.get_value::<Value>(path)?,
            }),
            AtomicOperation::Insert { path, .. } => Ok(AtomicOperation::Remove { path: path.clone() }),
            AtomicOperation::Remove { path } => Ok(AtomicOperation::Insert {
                path: path.clone(),
                value: roots.get_value::<Value>(path)?,
            }),
            AtomicOperation::ReplaceSubtree { path, .. } => match roots.get_value::<Value>(path)? {
                Value::Node(old) => Ok(AtomicOperation::ReplaceSubtree {
                    path: path.clone(),
                    node: *old,
                }),
                Value::Null => Ok(AtomicOperation::SetValue {
                    path: path.clone(),
                    value: Value::Null,
                }),
                other => Err(AccessError::type_mismatch(path, ValueKind::Node, other.kind())),
            },
        }
    }
}

/// An applied operation paired with its inverse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedOperation {
    pub forward: AtomicOperation,
    pub inverse: AtomicOperation,
}

impl RecordedOperation {
    /// Whether applying or reverting this operation changes tree structure
    pub fn touches_structure(&self) -> bool {
        self.forward.is_structural() || self.inverse.is_structural()
    }
}
