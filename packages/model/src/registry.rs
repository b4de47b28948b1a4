//! # Type Shape Registry
//!
//! Node-defining code declares each node and record type once: its tag and
//! its fields with their static types. From those declarations the registry
//! derives a [`TypeShape`] per tag, on first use, and keeps it for its own
//! lifetime. Shapes depend only on declarations, never on instance data, so
//! nothing ever invalidates them.
//!
//! The interesting bit of a shape is which members can reach a node at all.
//! A member whose static type graph terminates without a node (scalars,
//! lists of scalars, records made only of those) is marked so traversal can
//! skip it without looking at the value.
//!
//! ```rust,ignore
//! let mut registry = TypeShapeRegistry::new();
//! registry.register(TypeDecl::node("Constant").field("value", FieldType::Float))?;
//! registry.register(TypeDecl::record("Holder").child("node"))?;
//! registry.register(
//!     TypeDecl::node("Sum")
//!         .multi_port("inputs")
//!         .field("holder", FieldType::record("Holder")),
//! )?;
//! ```
//!
//! The registry is single-threaded: shapes are memoized behind a `RefCell`.

use crate::error::RegistryError;
use crate::path::is_member_name;
use crate::value::{Node, Record, Value};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;

/// Whether a tag names a tree element or a plain value holder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Node,
    Record,
}

/// Static type of a declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    /// Optional single child node
    Node,
    /// Record of the given tag
    Record(String),
    /// Ordered collection; `List(Node)` is a multi-port
    List(Box<FieldType>),
    /// Anything; inspected at runtime
    Any,
}

impl FieldType {
    pub fn record(tag: impl Into<String>) -> Self {
        FieldType::Record(tag.into())
    }

    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    /// Value a freshly instantiated member starts with
    pub fn default_value(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Text => Value::Text(String::new()),
            FieldType::List(_) => Value::List(Vec::new()),
            FieldType::Node | FieldType::Record(_) | FieldType::Any => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

/// Declaration of one node or record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub tag: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

impl TypeDecl {
    pub fn node(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: TypeKind::Node,
            fields: Vec::new(),
        }
    }

    pub fn record(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: TypeKind::Record,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
        });
        self
    }

    /// Single child port
    pub fn child(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Node)
    }

    /// Ordered collection of child nodes
    pub fn multi_port(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::list(FieldType::Node))
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }
}

/// One declared member as seen by traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberShape {
    pub name: String,
    pub ty: FieldType,

    /// Whether the member's static type graph can reach a node
    pub reaches_node: bool,
}

/// Derived, memoized shape of one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape {
    pub tag: String,
    pub kind: TypeKind,

    /// All members in declaration order
    pub members: Vec<MemberShape>,

    /// True when no member can ever hold a node
    pub no_node_container: bool,
}

impl TypeShape {
    /// Child-bearing members in declaration order
    pub fn child_members(&self) -> impl Iterator<Item = &MemberShape> {
        self.members.iter().filter(|m| m.reaches_node)
    }
}

/// Explicit per-type shape service
#[derive(Debug, Default)]
pub struct TypeShapeRegistry {
    decls: HashMap<String, TypeDecl>,
    shapes: RefCell<HashMap<String, Rc<TypeShape>>>,
    computed: Cell<usize>,
}

fn nests_collection(ty: &FieldType) -> bool {
    match ty {
        FieldType::List(inner) => matches!(**inner, FieldType::List(_)),
        _ => false,
    }
}

impl TypeShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of declarations
    pub fn from_decls(decls: impl IntoIterator<Item = TypeDecl>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for decl in decls {
            registry.register(decl)?;
        }
        Ok(registry)
    }

    /// Register a declaration.
    ///
    /// Shapes computed before this call stay valid: a record tag that was
    /// unknown when a shape was derived counted as possibly holding nodes.
    pub fn register(&mut self, decl: TypeDecl) -> Result<(), RegistryError> {
        if self.decls.contains_key(&decl.tag) {
            return Err(RegistryError::DuplicateType(decl.tag));
        }
        for field in &decl.fields {
            if !is_member_name(&field.name) {
                return Err(RegistryError::InvalidFieldName {
                    tag: decl.tag.clone(),
                    field: field.name.clone(),
                });
            }
            if nests_collection(&field.ty) {
                return Err(RegistryError::NestedCollection {
                    tag: decl.tag.clone(),
                    field: field.name.clone(),
                });
            }
        }
        debug!(tag = %decl.tag, fields = decl.fields.len(), "Registering type");
        self.decls.insert(decl.tag.clone(), decl);
        Ok(())
    }

    pub fn decl(&self, tag: &str) -> Option<&TypeDecl> {
        self.decls.get(tag)
    }

    pub fn kind_of(&self, tag: &str) -> Option<TypeKind> {
        self.decls.get(tag).map(|d| d.kind)
    }

    /// Whether a serialized type tag names a registered type
    pub fn resolves(&self, tag: &str) -> bool {
        self.decls.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Number of shapes derived so far
    pub fn computed_shapes(&self) -> usize {
        self.computed.get()
    }

    /// Shape of `tag`, derived on first request
    pub fn shape(&self, tag: &str) -> Option<Rc<TypeShape>> {
        if let Some(shape) = self.shapes.borrow().get(tag) {
            return Some(Rc::clone(shape));
        }

        let decl = self.decls.get(tag)?;
        let members: Vec<MemberShape> = decl
            .fields
            .iter()
            .map(|field| {
                let mut visiting = HashSet::new();
                visiting.insert(decl.tag.clone());
                MemberShape {
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                    reaches_node: self.reaches_node(&field.ty, &mut visiting),
                }
            })
            .collect();
        let shape = Rc::new(TypeShape {
            tag: decl.tag.clone(),
            kind: decl.kind,
            no_node_container: members.iter().all(|m| !m.reaches_node),
            members,
        });

        debug!(tag, no_node_container = shape.no_node_container, "Computed type shape");
        self.computed.set(self.computed.get() + 1);
        self.shapes
            .borrow_mut()
            .insert(tag.to_string(), Rc::clone(&shape));
        Some(shape)
    }

    /// Static reachability; `visiting` breaks cycles through recursive
    /// record types
    fn reaches_node(&self, ty: &FieldType, visiting: &mut HashSet<String>) -> bool {
        match ty {
            FieldType::Node | FieldType::Any => true,
            FieldType::Bool | FieldType::Int | FieldType::Float | FieldType::Text => false,
            FieldType::List(inner) => self.reaches_node(inner, visiting),
            FieldType::Record(tag) => {
                if let Some(shape) = self.shapes.borrow().get(tag) {
                    return !shape.no_node_container;
                }
                let Some(decl) = self.decls.get(tag) else {
                    // Unknown record types cannot be proven node-free
                    return true;
                };
                if !visiting.insert(tag.clone()) {
                    return false;
                }
                let reaches = decl
                    .fields
                    .iter()
                    .any(|field| self.reaches_node(&field.ty, visiting));
                visiting.remove(tag);
                reaches
            }
        }
    }

    /// New node with every declared member set to its default
    pub fn instantiate_node(&self, tag: &str) -> Result<Node, RegistryError> {
        let decl = self.typed_decl(tag, TypeKind::Node)?;
        let mut node = Node::new(tag);
        for field in &decl.fields {
            node.insert_member(field.name.clone(), field.ty.default_value());
        }
        Ok(node)
    }

    /// New record with every declared member set to its default
    pub fn instantiate_record(&self, tag: &str) -> Result<Record, RegistryError> {
        let decl = self.typed_decl(tag, TypeKind::Record)?;
        let mut record = Record::new(tag);
        for field in &decl.fields {
            record.insert_member(field.name.clone(), field.ty.default_value());
        }
        Ok(record)
    }

    fn typed_decl(&self, tag: &str, kind: TypeKind) -> Result<&TypeDecl, RegistryError> {
        self.decls
            .get(tag)
            .filter(|decl| decl.kind == kind)
            .ok_or_else(|| RegistryError::UnknownType(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Tagged;

    fn registry() -> TypeShapeRegistry {
        TypeShapeRegistry::from_decls([
            TypeDecl::node("Constant").field("value", FieldType::Float),
            TypeDecl::record("Holder").child("node").field("weight", FieldType::Float),
            TypeDecl::record("Range")
                .field("min", FieldType::Float)
                .field("max", FieldType::Float),
            TypeDecl::node("Sum")
                .field("label", FieldType::Text)
                .multi_port("inputs")
                .field("holder", FieldType::record("Holder"))
                .field("range", FieldType::record("Range"))
                .field("weights", FieldType::list(FieldType::Float)),
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_marks_child_bearing_members() {
        let registry = registry();
        let shape = registry.shape("Sum").unwrap();
        let children: Vec<&str> = shape.child_members().map(|m| m.name.as_str()).collect();
        assert_eq!(children, vec!["inputs", "holder"]);
        assert!(!shape.no_node_container);
        assert!(registry.shape("Constant").unwrap().no_node_container);
        assert!(registry.shape("Range").unwrap().no_node_container);
    }

    #[test]
    fn test_shapes_are_computed_once() {
        let registry = registry();
        assert_eq!(registry.computed_shapes(), 0);
        let first = registry.shape("Sum").unwrap();
        let second = registry.shape("Sum").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.computed_shapes(), 1);
        assert!(registry.shape("Nope").is_none());
        assert_eq!(registry.computed_shapes(), 1);
    }

    #[test]
    fn test_recursive_records_terminate() {
        let registry = TypeShapeRegistry::from_decls([
            TypeDecl::record("Chain")
                .field("next", FieldType::record("Chain"))
                .field("value", FieldType::Int),
            TypeDecl::node("Owner").field("chain", FieldType::record("Chain")),
        ])
        .unwrap();
        assert!(registry.shape("Owner").unwrap().no_node_container);
    }

    #[test]
    fn test_unknown_record_is_conservative() {
        let registry = TypeShapeRegistry::from_decls([
            TypeDecl::node("Owner").field("extra", FieldType::record("Later")),
        ])
        .unwrap();
        assert!(!registry.shape("Owner").unwrap().no_node_container);
    }

    #[test]
    fn test_register_rejects_bad_declarations() {
        let mut registry = registry();
        assert_eq!(
            registry.register(TypeDecl::node("Sum")),
            Err(RegistryError::DuplicateType("Sum".to_string()))
        );
        assert!(matches!(
            registry.register(
                TypeDecl::node("Grid").field("cells", FieldType::list(FieldType::list(FieldType::Node)))
            ),
            Err(RegistryError::NestedCollection { .. })
        ));
        assert!(matches!(
            registry.register(TypeDecl::node("Odd").field("$bad", FieldType::Int)),
            Err(RegistryError::InvalidFieldName { .. })
        ));
    }

    #[test]
    fn test_instantiate_fills_defaults_in_order() {
        let registry = registry();
        let node = registry.instantiate_node("Sum").unwrap();
        let names: Vec<&str> = node.members().keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["label", "inputs", "holder", "range", "weights"]);
        assert_eq!(node.member("inputs"), Some(&Value::List(vec![])));
        assert!(registry.instantiate_node("Holder").is_err());
        assert!(registry.instantiate_record("Holder").is_ok());
    }

    #[test]
    fn test_decls_deserialize_from_json() {
        let json = r#"[
            { "tag": "Sum", "kind": "node", "fields": [
                { "name": "inputs", "type": { "list": "node" } },
                { "name": "holder", "type": { "record": "Holder" } }
            ] }
        ]"#;
        let decls: Vec<TypeDecl> = serde_json::from_str(json).unwrap();
        assert_eq!(decls[0], TypeDecl::node("Sum").multi_port("inputs").field("holder", FieldType::record("Holder")));
    }
}
