//! # Node Records and Member Values
//!
//! Nodes are polymorphic records: a type tag plus ordered members. Member
//! access goes through the [`Tagged`] capability rather than runtime
//! reflection, so every variant is handled by the same accessor code.

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Key carrying the type discriminator in serialized objects
pub const TYPE_TAG_KEY: &str = "$type";

pub type Members = IndexMap<String, Value>;

/// Dynamic member value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),

    /// Child node (a single port)
    Node(Box<Node>),

    /// Tagged value holder that is not itself a tree element
    Record(Record),

    /// Ordered collection; a list of nodes is a multi-port
    List(Vec<Value>),
}

/// Variant name of a value, used in type-mismatch diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Node,
    Record,
    List,
    RootSet,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Node => "node",
            ValueKind::Record => "record",
            ValueKind::List => "list",
            ValueKind::RootSet => "root set",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Node(_) => ValueKind::Node,
            Value::Record(_) => ValueKind::Record,
            Value::List(_) => ValueKind::List,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(&**node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Value::Node(node) => Some(&mut **node),
            _ => None,
        }
    }

    /// Whether this value can carry tree structure (nodes directly or
    /// through records and lists)
    pub fn is_structural(&self) -> bool {
        matches!(self, Value::Node(_) | Value::Record(_) | Value::List(_))
    }

    /// Assignment rule used by the accessor: same kind, or either side null
    pub fn is_assignable_from(&self, other: &Value) -> bool {
        self.is_null() || other.is_null() || self.kind() == other.kind()
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(Box::new(node))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Member capability shared by nodes and records
pub trait Tagged {
    fn tag(&self) -> &str;
    fn members(&self) -> &Members;
    fn members_mut(&mut self) -> &mut Members;

    fn member(&self, name: &str) -> Option<&Value> {
        self.members().get(name)
    }

    fn member_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.members_mut().get_mut(name)
    }

    fn has_member(&self, name: &str) -> bool {
        self.members().contains_key(name)
    }
}

macro_rules! tagged_record {
    ($name:ident) => {
        impl $name {
            pub fn new(tag: impl Into<String>) -> Self {
                Self {
                    tag: tag.into(),
                    members: Members::new(),
                }
            }

            /// Builder-style member insertion (keeps insertion order)
            pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
                self.members.insert(name.into(), value.into());
                self
            }

            /// Insert or overwrite a member without any kind check
            pub fn insert_member(&mut self, name: impl Into<String>, value: impl Into<Value>) {
                self.members.insert(name.into(), value.into());
            }
        }

        impl Tagged for $name {
            fn tag(&self) -> &str {
                &self.tag
            }

            fn members(&self) -> &Members {
                &self.members
            }

            fn members_mut(&mut self) -> &mut Members {
                &mut self.members
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.members.len() + 1))?;
                map.serialize_entry(TYPE_TAG_KEY, &self.tag)?;
                for (name, value) in &self.members {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    };
}

/// Polymorphic tree element
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    tag: String,
    members: Members,
}

/// Tagged value holder (e.g. a wrapper optionally holding a node)
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    tag: String,
    members: Members,
}

tagged_record!(Node);
tagged_record!(Record);

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Node(node) => node.serialize(serializer),
            Value::Record(record) => record.serialize(serializer),
            Value::List(items) => items.serialize(serializer),
        }
    }
}

/// Borrowed view of whatever a path resolves to
#[derive(Debug, Clone, Copy)]
pub enum ValueRef<'a> {
    RootSet(&'a [Node]),
    Node(&'a Node),
    Value(&'a Value),
}

impl<'a> ValueRef<'a> {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueRef::RootSet(_) => ValueKind::RootSet,
            ValueRef::Node(_) => ValueKind::Node,
            ValueRef::Value(value) => value.kind(),
        }
    }

    /// The node behind this reference, whether it is a root or a member value
    pub fn as_node(&self) -> Option<&'a Node> {
        match *self {
            ValueRef::Node(node) => Some(node),
            ValueRef::Value(Value::Node(node)) => Some(&**node),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match *self {
            ValueRef::RootSet(nodes) => {
                Value::List(nodes.iter().cloned().map(Value::from).collect())
            }
            ValueRef::Node(node) => Value::Node(Box::new(node.clone())),
            ValueRef::Value(value) => value.clone(),
        }
    }
}

/// Typed extraction for [`crate::accessor::get_value`]
///
/// Extraction never coerces: an `Int` member does not satisfy `f64`.
pub trait FromValue: Sized {
    /// Returns the expected kind on mismatch
    fn from_value_ref(value: ValueRef<'_>) -> Result<Self, ValueKind>;
}

impl FromValue for Value {
    fn from_value_ref(value: ValueRef<'_>) -> Result<Self, ValueKind> {
        Ok(value.to_value())
    }
}

impl FromValue for Node {
    fn from_value_ref(value: ValueRef<'_>) -> Result<Self, ValueKind> {
        value.as_node().cloned().ok_or(ValueKind::Node)
    }
}

impl FromValue for Record {
    fn from_value_ref(value: ValueRef<'_>) -> Result<Self, ValueKind> {
        match value {
            ValueRef::Value(Value::Record(record)) => Ok(record.clone()),
            _ => Err(ValueKind::Record),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value_ref(value: ValueRef<'_>) -> Result<Self, ValueKind> {
        match value {
            ValueRef::Value(Value::List(items)) => Ok(items.clone()),
            ValueRef::RootSet(_) => match value.to_value() {
                Value::List(items) => Ok(items),
                _ => Err(ValueKind::List),
            },
            _ => Err(ValueKind::List),
        }
    }
}

macro_rules! scalar_from_value {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value_ref(value: ValueRef<'_>) -> Result<Self, ValueKind> {
                match value {
                    ValueRef::Value(Value::$variant(inner)) => Ok(inner.clone()),
                    _ => Err(ValueKind::$variant),
                }
            }
        }
    };
}

scalar_from_value!(bool, Bool);
scalar_from_value!(i64, Int);
scalar_from_value!(f64, Float);
scalar_from_value!(String, Text);
