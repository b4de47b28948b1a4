//! # Document Format
//!
//! A document is a JSON object holding the ordered root nodes:
//!
//! ```json
//! { "roots": [ { "$type": "Sum", "inputs": [ { "$type": "Constant", "value": 1.0 } ] } ] }
//! ```
//!
//! Every object inside `roots` carries its type tag under `$type`. Loading
//! happens in two passes. The first walks the raw JSON and collects every
//! tag that is missing or does not resolve against the registry; any such
//! issue fails the load before a single node is built. The second converts
//! objects into nodes and records, guided by the declared field types.

use crate::error::{DocumentError, TypeTagIssue};
use crate::path::Path;
use crate::registry::{FieldType, TypeKind, TypeShapeRegistry};
use crate::roots::RootSet;
use crate::value::{Node, Record, Tagged, Value, TYPE_TAG_KEY};
use serde_json::{Map, Value as Json};
use tracing::debug;

const ROOTS_KEY: &str = "roots";

type JsonObject = Map<String, Json>;

/// Parse and convert a document
pub fn from_json_str(input: &str, registry: &TypeShapeRegistry) -> Result<RootSet, DocumentError> {
    let raw: Json = serde_json::from_str(input)?;
    from_json_value(&raw, registry)
}

pub fn from_json_value(raw: &Json, registry: &TypeShapeRegistry) -> Result<RootSet, DocumentError> {
    let roots = raw
        .as_object()
        .and_then(|doc| doc.get(ROOTS_KEY))
        .and_then(Json::as_array)
        .ok_or_else(|| DocumentError::Malformed("expected an object with a 'roots' array".into()))?;

    let issues = check_type_tags(roots, registry);
    if !issues.is_empty() {
        return Err(DocumentError::UnresolvedTypes(issues));
    }

    let mut nodes = Vec::with_capacity(roots.len());
    for (i, item) in roots.iter().enumerate() {
        let path = Path::index(i);
        let object = item
            .as_object()
            .ok_or_else(|| DocumentError::schema(&path, "root entries must be nodes"))?;
        nodes.push(node_from_object(object, &path, registry)?);
    }
    debug!(roots = nodes.len(), "Loaded document");
    Ok(RootSet::from_nodes(nodes))
}

pub fn to_json_string(roots: &RootSet) -> Result<String, DocumentError> {
    Ok(serde_json::to_string(roots)?)
}

pub fn to_json_string_pretty(roots: &RootSet) -> Result<String, DocumentError> {
    Ok(serde_json::to_string_pretty(roots)?)
}

/// Collect every object under `roots` whose type tag is missing or unknown.
///
/// Locations are reported as paths into the document, with the root array
/// playing the role of the root set.
pub fn check_type_tags(roots: &[Json], registry: &TypeShapeRegistry) -> Vec<TypeTagIssue> {
    let mut issues = Vec::new();
    for (i, item) in roots.iter().enumerate() {
        check_json(item, &Path::index(i), registry, &mut issues);
    }
    issues
}

fn check_json(json: &Json, path: &Path, registry: &TypeShapeRegistry, issues: &mut Vec<TypeTagIssue>) {
    match json {
        Json::Object(object) => {
            match object.get(TYPE_TAG_KEY) {
                Some(Json::String(tag)) if registry.resolves(tag) => {}
                Some(Json::String(tag)) => issues.push(TypeTagIssue {
                    path: path.clone(),
                    tag: Some(tag.clone()),
                }),
                Some(other) => issues.push(TypeTagIssue {
                    path: path.clone(),
                    tag: Some(other.to_string()),
                }),
                None => issues.push(TypeTagIssue {
                    path: path.clone(),
                    tag: None,
                }),
            }
            for (name, member) in object {
                if name != TYPE_TAG_KEY {
                    check_json(member, &path.child_member(name), registry, issues);
                }
            }
        }
        Json::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_json(item, &path.child_index(i), registry, issues);
            }
        }
        _ => {}
    }
}

fn object_tag<'j>(object: &'j JsonObject, path: &Path) -> Result<&'j str, DocumentError> {
    object
        .get(TYPE_TAG_KEY)
        .and_then(Json::as_str)
        .ok_or_else(|| DocumentError::schema(path, "missing type tag"))
}

/// Convert members of `object` onto `target` in declaration order, filling
/// absent members with their defaults
fn fill_members<T: Tagged>(
    target: &mut T,
    object: &JsonObject,
    path: &Path,
    registry: &TypeShapeRegistry,
) -> Result<(), DocumentError> {
    let decl = registry
        .decl(target.tag())
        .ok_or_else(|| DocumentError::schema(path, format!("unknown type '{}'", target.tag())))?;

    if let Some(unknown) = object
        .keys()
        .find(|name| *name != TYPE_TAG_KEY && decl.field_type(name).is_none())
    {
        return Err(DocumentError::schema(
            &path.child_member(unknown),
            format!("'{}' declares no member '{}'", decl.tag, unknown),
        ));
    }

    for field in &decl.fields {
        let member_path = path.child_member(&field.name);
        let value = match object.get(&field.name) {
            Some(json) => value_from_json(json, &field.ty, &member_path, registry)?,
            None => field.ty.default_value(),
        };
        target.members_mut().insert(field.name.clone(), value);
    }
    Ok(())
}

fn node_from_object(
    object: &JsonObject,
    path: &Path,
    registry: &TypeShapeRegistry,
) -> Result<Node, DocumentError> {
    let tag = object_tag(object, path)?;
    if registry.kind_of(tag) != Some(TypeKind::Node) {
        return Err(DocumentError::schema(path, format!("'{}' is not a node type", tag)));
    }
    let mut node = Node::new(tag);
    fill_members(&mut node, object, path, registry)?;
    Ok(node)
}

fn record_from_object(
    object: &JsonObject,
    path: &Path,
    registry: &TypeShapeRegistry,
) -> Result<Record, DocumentError> {
    let tag = object_tag(object, path)?;
    if registry.kind_of(tag) != Some(TypeKind::Record) {
        return Err(DocumentError::schema(path, format!("'{}' is not a record type", tag)));
    }
    let mut record = Record::new(tag);
    fill_members(&mut record, object, path, registry)?;
    Ok(record)
}

fn expected(path: &Path, what: &str, json: &Json) -> DocumentError {
    DocumentError::schema(path, format!("expected {}, found {}", what, json_kind(json)))
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Convert one member value against its declared type. `null` is accepted
/// for node, record and `Any` members only.
fn value_from_json(
    json: &Json,
    ty: &FieldType,
    path: &Path,
    registry: &TypeShapeRegistry,
) -> Result<Value, DocumentError> {
    if json.is_null() && matches!(ty, FieldType::Node | FieldType::Record(_) | FieldType::Any) {
        return Ok(Value::Null);
    }
    match ty {
        FieldType::Bool => json.as_bool().map(Value::Bool).ok_or_else(|| expected(path, "bool", json)),
        FieldType::Int => json.as_i64().map(Value::Int).ok_or_else(|| expected(path, "integer", json)),
        FieldType::Float => json.as_f64().map(Value::Float).ok_or_else(|| expected(path, "number", json)),
        FieldType::Text => json
            .as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(|| expected(path, "string", json)),
        FieldType::Node => {
            let object = json.as_object().ok_or_else(|| expected(path, "node", json))?;
            Ok(Value::from(node_from_object(object, path, registry)?))
        }
        FieldType::Record(tag) => {
            let object = json.as_object().ok_or_else(|| expected(path, "record", json))?;
            let record = record_from_object(object, path, registry)?;
            if record.tag() != tag {
                return Err(DocumentError::schema(
                    path,
                    format!("expected record '{}', found '{}'", tag, record.tag()),
                ));
            }
            Ok(Value::Record(record))
        }
        FieldType::List(inner) => {
            let items = json.as_array().ok_or_else(|| expected(path, "array", json))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| value_from_json(item, inner, &path.child_index(i), registry))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        FieldType::Any => value_from_json_any(json, path, registry),
    }
}

/// Convert arbitrary JSON, deciding node or record from the object's tag.
///
/// Used for `Any` members and for values supplied from outside a document.
pub fn value_from_json_any(
    json: &Json,
    path: &Path,
    registry: &TypeShapeRegistry,
) -> Result<Value, DocumentError> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| DocumentError::schema(path, format!("unrepresentable number {}", n))),
        },
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = path.child_index(i);
                if item.is_array() {
                    return Err(DocumentError::schema(
                        &item_path,
                        "a collection cannot be stored directly inside a collection",
                    ));
                }
                values.push(value_from_json_any(item, &item_path, registry)?);
            }
            Ok(Value::List(values))
        }
        Json::Object(object) => {
            let tag = object_tag(object, path)?;
            match registry.kind_of(tag) {
                Some(TypeKind::Node) => Ok(Value::from(node_from_object(object, path, registry)?)),
                Some(TypeKind::Record) => Ok(Value::Record(record_from_object(object, path, registry)?)),
                None => Err(DocumentError::UnresolvedTypes(vec![TypeTagIssue {
                    path: path.clone(),
                    tag: Some(tag.to_string()),
                }])),
            }
        }
    }
}
