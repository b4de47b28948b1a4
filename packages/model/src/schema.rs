//! # Declared Slot Types
//!
//! The accessor alone only compares a write against the value it replaces.
//! The checks here compare it against the registry's declarations instead,
//! under the same rules the document loader enforces, so a tree that only
//! ever changes through checked writes always saves into a loadable
//! document.
//!
//! ## Rules
//!
//! - Scalars and lists must match the declared kind exactly; `Int` and
//!   `Float` never stand in for each other.
//! - `Null` fits only `Node`, `Record` and `Any` slots.
//! - List elements follow the list's inner type.
//! - Nodes and records must carry a registered tag of the right kind, a
//!   `Record(tag)` slot takes only that tag, and every member they carry
//!   must be declared and conform in turn. Absent members are fine; the
//!   loader fills them with defaults.

use crate::accessor::get_ref;
use crate::error::{AccessError, AccessResult};
use crate::path::{Path, Step};
use crate::registry::{FieldType, TypeKind, TypeShapeRegistry};
use crate::roots::RootSet;
use crate::value::{Node, Tagged, Value, ValueKind, ValueRef};

static ANY: FieldType = FieldType::Any;

/// What a location in the tree is declared to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot<'r> {
    /// An entry of the root set; always a non-null node
    Root,
    Field(&'r FieldType),
}

/// Kind a scalar or collection field type expects
fn expected_kind(ty: &FieldType) -> ValueKind {
    match ty {
        FieldType::Bool => ValueKind::Bool,
        FieldType::Int => ValueKind::Int,
        FieldType::Float => ValueKind::Float,
        FieldType::Text => ValueKind::Text,
        FieldType::Node => ValueKind::Node,
        FieldType::Record(_) => ValueKind::Record,
        FieldType::List(_) => ValueKind::List,
        FieldType::Any => ValueKind::Null,
    }
}

/// Declared type of the location `path` addresses. The location itself
/// need not exist yet (an insertion index one past the end), but its
/// parent must.
pub fn slot_type<'r>(
    roots: &RootSet,
    registry: &'r TypeShapeRegistry,
    path: &Path,
) -> AccessResult<Slot<'r>> {
    let parent = path.parent().ok_or(AccessError::EmptyPath)?;
    let last = path.last().ok_or(AccessError::EmptyPath)?;

    match last {
        Step::Index(_) if parent.is_empty() => Ok(Slot::Root),
        Step::Index(_) => match slot_type(roots, registry, &parent)? {
            Slot::Field(FieldType::List(inner)) => Ok(Slot::Field(&**inner)),
            Slot::Field(FieldType::Any) => Ok(Slot::Field(&ANY)),
            Slot::Root => Err(AccessError::type_mismatch(path, ValueKind::List, ValueKind::Node)),
            Slot::Field(other) => {
                Err(AccessError::type_mismatch(path, ValueKind::List, expected_kind(other)))
            }
        },
        Step::Member(name) => {
            let owner = get_ref(roots, &parent)?;
            let tag = match owner {
                ValueRef::Node(node) => node.tag(),
                ValueRef::Value(Value::Node(node)) => node.tag(),
                ValueRef::Value(Value::Record(record)) => record.tag(),
                ValueRef::Value(Value::Null) => {
                    return Err(AccessError::TargetNull { path: parent });
                }
                other => {
                    return Err(AccessError::type_mismatch(path, ValueKind::Record, other.kind()));
                }
            };
            let decl = registry.decl(tag).ok_or_else(|| {
                AccessError::undeclared(&parent, format!("type '{}' is not registered", tag))
            })?;
            decl.field_type(name)
                .map(Slot::Field)
                .ok_or_else(|| AccessError::PathNotFound {
                    path: path.clone(),
                    member: name.to_string(),
                    type_tag: tag.to_string(),
                })
        }
    }
}

/// Check `value` against what `slot` is declared to hold
pub fn check_slot(
    registry: &TypeShapeRegistry,
    slot: Slot<'_>,
    value: &Value,
    path: &Path,
) -> AccessResult<()> {
    match slot {
        Slot::Root => match value {
            Value::Node(node) => check_tagged(registry, &**node, TypeKind::Node, path),
            other => Err(AccessError::type_mismatch(path, ValueKind::Node, other.kind())),
        },
        Slot::Field(ty) => check_value(registry, ty, value, path),
    }
}

/// Check `value` against a declared field type, recursively
pub fn check_value(
    registry: &TypeShapeRegistry,
    ty: &FieldType,
    value: &Value,
    path: &Path,
) -> AccessResult<()> {
    match (ty, value) {
        (FieldType::Node | FieldType::Record(_) | FieldType::Any, Value::Null) => Ok(()),
        (FieldType::Bool, Value::Bool(_))
        | (FieldType::Int, Value::Int(_))
        | (FieldType::Float, Value::Float(_))
        | (FieldType::Text, Value::Text(_)) => Ok(()),
        (FieldType::Node, Value::Node(node)) => check_tagged(registry, &**node, TypeKind::Node, path),
        (FieldType::Record(tag), Value::Record(record)) => {
            if record.tag() != tag {
                return Err(AccessError::undeclared(
                    path,
                    format!("expected record '{}', found '{}'", tag, record.tag()),
                ));
            }
            check_tagged(registry, record, TypeKind::Record, path)
        }
        (FieldType::List(inner), Value::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                check_value(registry, inner, item, &path.child_index(i))?;
            }
            Ok(())
        }
        (FieldType::Any, Value::Node(node)) => check_tagged(registry, &**node, TypeKind::Node, path),
        (FieldType::Any, Value::Record(record)) => {
            check_tagged(registry, record, TypeKind::Record, path)
        }
        (FieldType::Any, Value::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                let item_path = path.child_index(i);
                if matches!(item, Value::List(_)) {
                    return Err(AccessError::malformed(
                        &item_path,
                        "a collection cannot be stored directly inside a collection",
                    ));
                }
                check_value(registry, &ANY, item, &item_path)?;
            }
            Ok(())
        }
        (FieldType::Any, _) => Ok(()),
        (ty, value) => Err(AccessError::type_mismatch(path, expected_kind(ty), value.kind())),
    }
}

fn check_tagged<T: Tagged>(
    registry: &TypeShapeRegistry,
    value: &T,
    kind: TypeKind,
    path: &Path,
) -> AccessResult<()> {
    let decl = registry
        .decl(value.tag())
        .ok_or_else(|| AccessError::undeclared(path, format!("type '{}' is not registered", value.tag())))?;
    if decl.kind != kind {
        let (expected, found) = match kind {
            TypeKind::Node => (ValueKind::Node, ValueKind::Record),
            TypeKind::Record => (ValueKind::Record, ValueKind::Node),
        };
        return Err(AccessError::type_mismatch(path, expected, found));
    }
    for (name, member) in value.members() {
        let member_path = path.child_member(name);
        let ty = decl.field_type(name).ok_or_else(|| AccessError::PathNotFound {
            path: member_path.clone(),
            member: name.clone(),
            type_tag: decl.tag.clone(),
        })?;
        check_value(registry, ty, member, &member_path)?;
    }
    Ok(())
}

/// Check that placing `node` at `path` keeps the tree conforming
pub fn check_node_write(
    roots: &RootSet,
    registry: &TypeShapeRegistry,
    path: &Path,
    node: &Node,
) -> AccessResult<()> {
    match slot_type(roots, registry, path)? {
        Slot::Root | Slot::Field(FieldType::Node | FieldType::Any) => {
            check_tagged(registry, node, TypeKind::Node, path)
        }
        Slot::Field(other) => Err(AccessError::type_mismatch(path, expected_kind(other), ValueKind::Node)),
    }
}

/// Check that writing `value` at `path` keeps the tree conforming
pub fn check_write(
    roots: &RootSet,
    registry: &TypeShapeRegistry,
    path: &Path,
    value: &Value,
) -> AccessResult<()> {
    let slot = slot_type(roots, registry, path)?;
    check_slot(registry, slot, value, path)
}

/// Check every root against the declarations
pub fn check_roots(roots: &RootSet, registry: &TypeShapeRegistry) -> AccessResult<()> {
    for (i, node) in roots.iter().enumerate() {
        check_tagged(registry, node, TypeKind::Node, &Path::index(i))?;
    }
    Ok(())
}
