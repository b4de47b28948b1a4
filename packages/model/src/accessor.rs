//! # Path Accessor
//!
//! Resolves a [`Path`] against a [`RootSet`] by walking member and index
//! steps through the [`Tagged`] capability of nodes and records.
//!
//! Reads never mutate. Writes resolve the parent of the target and then
//! assign the terminal member or element, checking the assigned value
//! against what is already there.

use crate::error::{AccessError, AccessResult};
use crate::path::{Path, Step};
use crate::roots::RootSet;
use crate::value::{FromValue, Node, Tagged, Value, ValueKind, ValueRef};

fn check_shape(path: &Path) -> AccessResult<()> {
    path.validate_shape()
        .map_err(|reason| AccessError::malformed(path, reason))
}

/// Take one step from `current`. `at` is the path up to and including the
/// step, reported on failure.
fn step_ref<'a>(current: ValueRef<'a>, step: &Step, at: &Path) -> AccessResult<ValueRef<'a>> {
    match (current, step) {
        (ValueRef::RootSet(nodes), Step::Index(i)) => nodes
            .get(*i)
            .map(ValueRef::Node)
            .ok_or(AccessError::IndexOutOfRange {
                path: at.clone(),
                index: *i,
                len: nodes.len(),
            }),
        (ValueRef::RootSet(_), Step::Member(_)) => Err(AccessError::type_mismatch(
            at,
            ValueKind::Node,
            ValueKind::RootSet,
        )),
        (ValueRef::Node(node), step) => member_step(node, step, at),
        (ValueRef::Value(value), step) => match (value, step) {
            (Value::Null, _) => Err(AccessError::TargetNull { path: at.clone() }),
            (Value::Node(node), step) => member_step(&**node, step, at),
            (Value::Record(record), Step::Member(name)) => record
                .member(name)
                .map(ValueRef::Value)
                .ok_or_else(|| AccessError::PathNotFound {
                    path: at.clone(),
                    member: name.to_string(),
                    type_tag: record.tag().to_string(),
                }),
            (Value::List(items), Step::Index(i)) => {
                items
                    .get(*i)
                    .map(ValueRef::Value)
                    .ok_or(AccessError::IndexOutOfRange {
                        path: at.clone(),
                        index: *i,
                        len: items.len(),
                    })
            }
            (Value::List(_), Step::Member(_)) => Err(AccessError::type_mismatch(
                at,
                ValueKind::Record,
                ValueKind::List,
            )),
            (other, Step::Member(_)) => Err(AccessError::type_mismatch(
                at,
                ValueKind::Record,
                other.kind(),
            )),
            (other, Step::Index(_)) => Err(AccessError::type_mismatch(
                at,
                ValueKind::List,
                other.kind(),
            )),
        },
    }
}

fn member_step<'a>(node: &'a Node, step: &Step, at: &Path) -> AccessResult<ValueRef<'a>> {
    match step {
        Step::Member(name) => {
            node.member(name)
                .map(ValueRef::Value)
                .ok_or_else(|| AccessError::PathNotFound {
                    path: at.clone(),
                    member: name.to_string(),
                    type_tag: node.tag().to_string(),
                })
        }
        Step::Index(_) => Err(AccessError::type_mismatch(at, ValueKind::List, ValueKind::Node)),
    }
}

/// Borrow whatever `path` resolves to
pub fn get_ref<'a>(roots: &'a RootSet, path: &Path) -> AccessResult<ValueRef<'a>> {
    check_shape(path)?;
    let mut current = ValueRef::RootSet(roots.nodes());
    for (i, step) in path.steps().iter().enumerate() {
        current = step_ref(current, step, &path.prefix(i + 1))?;
    }
    Ok(current)
}

/// Resolve `path` and extract the terminal value as `T`
pub fn get_value<T: FromValue>(roots: &RootSet, path: &Path) -> AccessResult<T> {
    let target = get_ref(roots, path)?;
    T::from_value_ref(target).map_err(|expected| AccessError::TypeMismatch {
        path: path.clone(),
        expected,
        found: target.kind(),
    })
}

/// Resolve all but the last step of `path`
pub fn get_parent<'a>(roots: &'a RootSet, path: &Path) -> AccessResult<ValueRef<'a>> {
    let parent = path.parent().ok_or(AccessError::EmptyPath)?;
    check_shape(path)?;
    get_ref(roots, &parent)
}

/// Mutable counterpart of [`ValueRef`], private to the write paths
enum SlotMut<'a> {
    RootSet(&'a mut Vec<Node>),
    Node(&'a mut Node),
    Value(&'a mut Value),
}

impl SlotMut<'_> {
    fn kind(&self) -> ValueKind {
        match self {
            SlotMut::RootSet(_) => ValueKind::RootSet,
            SlotMut::Node(_) => ValueKind::Node,
            SlotMut::Value(value) => value.kind(),
        }
    }
}

fn step_mut<'a>(current: SlotMut<'a>, step: &Step, at: &Path) -> AccessResult<SlotMut<'a>> {
    match (current, step) {
        (SlotMut::RootSet(nodes), Step::Index(i)) => {
            let len = nodes.len();
            nodes
                .get_mut(*i)
                .map(SlotMut::Node)
                .ok_or(AccessError::IndexOutOfRange {
                    path: at.clone(),
                    index: *i,
                    len,
                })
        }
        (SlotMut::RootSet(_), Step::Member(_)) => Err(AccessError::type_mismatch(
            at,
            ValueKind::Node,
            ValueKind::RootSet,
        )),
        (SlotMut::Node(node), step) => member_step_mut(node, step, at),
        (SlotMut::Value(value), step) => match (value, step) {
            (Value::Null, _) => Err(AccessError::TargetNull { path: at.clone() }),
            (Value::Node(node), step) => member_step_mut(&mut **node, step, at),
            (Value::Record(record), Step::Member(name)) => {
                let tag = record.tag().to_string();
                record
                    .member_mut(name)
                    .map(SlotMut::Value)
                    .ok_or_else(|| AccessError::PathNotFound {
                        path: at.clone(),
                        member: name.to_string(),
                        type_tag: tag,
                    })
            }
            (Value::List(items), Step::Index(i)) => {
                let len = items.len();
                items
                    .get_mut(*i)
                    .map(SlotMut::Value)
                    .ok_or(AccessError::IndexOutOfRange {
                        path: at.clone(),
                        index: *i,
                        len,
                    })
            }
            (other, Step::Member(_)) => Err(AccessError::type_mismatch(
                at,
                ValueKind::Record,
                other.kind(),
            )),
            (other, Step::Index(_)) => Err(AccessError::type_mismatch(
                at,
                ValueKind::List,
                other.kind(),
            )),
        },
    }
}

fn member_step_mut<'a>(node: &'a mut Node, step: &Step, at: &Path) -> AccessResult<SlotMut<'a>> {
    match step {
        Step::Member(name) => {
            let tag = node.tag().to_string();
            node.member_mut(name)
                .map(SlotMut::Value)
                .ok_or_else(|| AccessError::PathNotFound {
                    path: at.clone(),
                    member: name.to_string(),
                    type_tag: tag,
                })
        }
        Step::Index(_) => Err(AccessError::type_mismatch(at, ValueKind::List, ValueKind::Node)),
    }
}

/// Resolve the parent slot of a non-empty path mutably, returning it with
/// the terminal step
fn resolve_parent_mut<'a, 'p>(
    roots: &'a mut RootSet,
    path: &'p Path,
) -> AccessResult<(SlotMut<'a>, &'p Step)> {
    let last = path.last().ok_or(AccessError::EmptyPath)?;
    check_shape(path)?;
    let mut current = SlotMut::RootSet(roots.nodes_mut());
    let parent_len = path.len() - 1;
    for (i, step) in path.steps()[..parent_len].iter().enumerate() {
        current = step_mut(current, step, &path.prefix(i + 1))?;
    }
    Ok((current, last))
}

fn into_node(path: &Path, value: Value) -> AccessResult<Node> {
    match value {
        Value::Node(node) => Ok(*node),
        other => Err(AccessError::type_mismatch(path, ValueKind::Node, other.kind())),
    }
}

fn no_nested_list(path: &Path, value: &Value) -> AccessResult<()> {
    if matches!(value, Value::List(_)) {
        return Err(AccessError::malformed(
            path,
            "a collection cannot be stored directly inside a collection",
        ));
    }
    Ok(())
}

/// Assign `value` at `path`, returning the value it replaced
pub fn set_value(roots: &mut RootSet, path: &Path, value: Value) -> AccessResult<Value> {
    let (parent, last) = resolve_parent_mut(roots, path)?;

    let slot: &mut Value = match (parent, last) {
        (SlotMut::RootSet(nodes), Step::Index(i)) => {
            let len = nodes.len();
            if *i >= len {
                return Err(AccessError::IndexOutOfRange {
                    path: path.clone(),
                    index: *i,
                    len,
                });
            }
            let node = into_node(path, value)?;
            let old = std::mem::replace(&mut nodes[*i], node);
            return Ok(Value::Node(Box::new(old)));
        }
        (SlotMut::Value(Value::List(items)), Step::Index(i)) => {
            no_nested_list(path, &value)?;
            let len = items.len();
            items.get_mut(*i).ok_or(AccessError::IndexOutOfRange {
                path: path.clone(),
                index: *i,
                len,
            })?
        }
        (parent, last) => match step_mut(parent, last, path)? {
            SlotMut::Value(slot) => slot,
            // Members always resolve to values; roots and nodes only come
            // from the index arm handled above.
            other => {
                return Err(AccessError::type_mismatch(path, ValueKind::Node, other.kind()));
            }
        },
    };

    if !slot.is_assignable_from(&value) {
        return Err(AccessError::type_mismatch(path, slot.kind(), value.kind()));
    }
    Ok(std::mem::replace(slot, value))
}

/// Insert `value` into the collection (or root set) at the index that ends
/// `path`. An index equal to the length appends.
pub fn insert_at(roots: &mut RootSet, path: &Path, value: Value) -> AccessResult<()> {
    let (parent, last) = resolve_parent_mut(roots, path)?;
    let index = match last {
        Step::Index(i) => *i,
        Step::Member(_) => {
            return Err(AccessError::malformed(path, "insertion requires an index step"));
        }
    };

    match parent {
        SlotMut::RootSet(nodes) => {
            if index > nodes.len() {
                return Err(AccessError::IndexOutOfRange {
                    path: path.clone(),
                    index,
                    len: nodes.len(),
                });
            }
            nodes.insert(index, into_node(path, value)?);
            Ok(())
        }
        SlotMut::Value(Value::List(items)) => {
            no_nested_list(path, &value)?;
            if index > items.len() {
                return Err(AccessError::IndexOutOfRange {
                    path: path.clone(),
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        SlotMut::Value(Value::Null) => Err(AccessError::TargetNull {
            path: path.prefix(path.len() - 1),
        }),
        other => Err(AccessError::type_mismatch(
            &path.prefix(path.len() - 1),
            ValueKind::List,
            other.kind(),
        )),
    }
}

/// Remove and return the collection (or root set) element at `path`
pub fn remove_at(roots: &mut RootSet, path: &Path) -> AccessResult<Value> {
    let (parent, last) = resolve_parent_mut(roots, path)?;
    let index = match last {
        Step::Index(i) => *i,
        Step::Member(_) => {
            return Err(AccessError::malformed(path, "removal requires an index step"));
        }
    };

    match parent {
        SlotMut::RootSet(nodes) => {
            if index >= nodes.len() {
                return Err(AccessError::IndexOutOfRange {
                    path: path.clone(),
                    index,
                    len: nodes.len(),
                });
            }
            Ok(Value::Node(Box::new(nodes.remove(index))))
        }
        SlotMut::Value(Value::List(items)) => {
            if index >= items.len() {
                return Err(AccessError::IndexOutOfRange {
                    path: path.clone(),
                    index,
                    len: items.len(),
                });
            }
            Ok(items.remove(index))
        }
        SlotMut::Value(Value::Null) => Err(AccessError::TargetNull {
            path: path.prefix(path.len() - 1),
        }),
        other => Err(AccessError::type_mismatch(
            &path.prefix(path.len() - 1),
            ValueKind::List,
            other.kind(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RootSet {
        RootSet::from_nodes(vec![
            Node::new("Constant").with("value", 1.0),
            Node::new("Sum")
                .with("label", "total")
                .with(
                    "inputs",
                    vec![
                        Value::from(Node::new("Constant").with("value", 2.0)),
                        Value::from(Node::new("Constant").with("value", 3.0)),
                    ],
                )
                .with("fallback", Value::Null),
        ])
    }

    #[test]
    fn test_get_value_walks_members_and_indices() {
        let roots = sample();
        let path = Path::parse("[1].inputs[1].value").unwrap();
        assert_eq!(get_value::<f64>(&roots, &path), Ok(3.0));
        assert_eq!(
            get_value::<String>(&roots, &Path::parse("[1].label").unwrap()),
            Ok("total".to_string())
        );
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let mut roots = sample();
        let path = Path::parse("[1].inputs[0].value").unwrap();
        let old = set_value(&mut roots, &path, Value::Float(9.5)).unwrap();
        assert_eq!(old, Value::Float(2.0));
        assert_eq!(get_value::<f64>(&roots, &path), Ok(9.5));
    }

    #[test]
    fn test_path_not_found_reports_type() {
        let roots = sample();
        let err = get_value::<f64>(&roots, &Path::parse("[0].missing").unwrap()).unwrap_err();
        assert_eq!(
            err,
            AccessError::PathNotFound {
                path: Path::parse("[0].missing").unwrap(),
                member: "missing".to_string(),
                type_tag: "Constant".to_string(),
            }
        );
    }

    #[test]
    fn test_target_null() {
        let roots = sample();
        let err = get_value::<f64>(&roots, &Path::parse("[1].fallback.value").unwrap()).unwrap_err();
        assert!(matches!(err, AccessError::TargetNull { .. }));
    }

    #[test]
    fn test_type_mismatch_on_read_and_write() {
        let mut roots = sample();
        let path = Path::parse("[0].value").unwrap();
        assert!(matches!(
            get_value::<i64>(&roots, &path),
            Err(AccessError::TypeMismatch {
                expected: ValueKind::Int,
                found: ValueKind::Float,
                ..
            })
        ));
        assert!(matches!(
            set_value(&mut roots, &path, Value::Text("x".into())),
            Err(AccessError::TypeMismatch { .. })
        ));
        // The failed write left the value alone
        assert_eq!(get_value::<f64>(&roots, &path), Ok(1.0));
    }

    #[test]
    fn test_index_out_of_range() {
        let roots = sample();
        let err = get_value::<Node>(&roots, &Path::parse("[1].inputs[5]").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            AccessError::IndexOutOfRange { index: 5, len: 2, .. }
        ));
        assert!(matches!(
            get_value::<Node>(&roots, &Path::index(7)),
            Err(AccessError::IndexOutOfRange { index: 7, len: 2, .. })
        ));
    }

    #[test]
    fn test_nested_collections_rejected() {
        let mut roots = sample();
        let path = Path::parse("[1].inputs[0][1]").unwrap();
        assert!(matches!(
            get_value::<Value>(&roots, &path),
            Err(AccessError::MalformedPath { .. })
        ));
        let element = Path::parse("[1].inputs[0]").unwrap();
        assert!(matches!(
            set_value(&mut roots, &element, Value::List(vec![])),
            Err(AccessError::MalformedPath { .. })
        ));
    }

    #[test]
    fn test_get_parent_resolves_all_but_last() {
        let roots = sample();
        let parent = get_parent(&roots, &Path::parse("[1].inputs[0]").unwrap()).unwrap();
        assert_eq!(parent.kind(), ValueKind::List);
        assert_eq!(get_parent(&roots, &Path::empty()).unwrap_err(), AccessError::EmptyPath);
    }

    #[test]
    fn test_insert_and_remove_in_collection() {
        let mut roots = sample();
        let at = Path::parse("[1].inputs[1]").unwrap();
        insert_at(&mut roots, &at, Value::from(Node::new("Constant").with("value", 7.0))).unwrap();
        assert_eq!(get_value::<f64>(&roots, &at.child_member("value")), Ok(7.0));
        assert_eq!(
            get_value::<Vec<Value>>(&roots, &Path::parse("[1].inputs").unwrap())
                .unwrap()
                .len(),
            3
        );

        let removed = remove_at(&mut roots, &at).unwrap();
        assert_eq!(removed.as_node().map(|n| n.tag()), Some("Constant"));
        assert_eq!(
            get_value::<f64>(&roots, &Path::parse("[1].inputs[1].value").unwrap()),
            Ok(3.0)
        );
    }

    #[test]
    fn test_root_set_insert_requires_node() {
        let mut roots = sample();
        assert!(matches!(
            insert_at(&mut roots, &Path::index(0), Value::Int(1)),
            Err(AccessError::TypeMismatch { expected: ValueKind::Node, .. })
        ));
        insert_at(&mut roots, &Path::index(2), Value::from(Node::new("Output"))).unwrap();
        assert_eq!(roots.len(), 3);
    }

    #[test]
    fn test_assigning_root_set_is_rejected() {
        let mut roots = sample();
        assert_eq!(
            set_value(&mut roots, &Path::empty(), Value::Null).unwrap_err(),
            AccessError::EmptyPath
        );
    }
}
