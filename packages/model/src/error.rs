//! Error types for the node-tree model

use crate::path::Path;
use crate::value::ValueKind;
use std::fmt;
use thiserror::Error;

pub type AccessResult<T> = Result<T, AccessError>;

/// Addressing failures. Each is a distinct condition callers can match on;
/// the accessor never falls back to a default value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("Target is null at '{path}'")]
    TargetNull { path: Path },

    #[error("Member '{member}' not found on type '{type_tag}' at '{path}'")]
    PathNotFound {
        path: Path,
        member: String,
        type_tag: String,
    },

    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: Path,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Index {index} out of range at '{path}' (length {len})")]
    IndexOutOfRange { path: Path, index: usize, len: usize },

    #[error("Malformed path '{path}': {reason}")]
    MalformedPath { path: Path, reason: String },

    /// The value does not fit what the registry declares for its location
    #[error("Undeclared value at '{path}': {reason}")]
    Undeclared { path: Path, reason: String },

    #[error("The root set itself cannot be assigned")]
    EmptyPath,
}

impl AccessError {
    pub fn type_mismatch(path: &Path, expected: ValueKind, found: ValueKind) -> Self {
        Self::TypeMismatch {
            path: path.clone(),
            expected,
            found,
        }
    }

    pub fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn undeclared(path: &Path, reason: impl Into<String>) -> Self {
        Self::Undeclared {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// The path at which resolution failed, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            AccessError::TargetNull { path }
            | AccessError::PathNotFound { path, .. }
            | AccessError::TypeMismatch { path, .. }
            | AccessError::IndexOutOfRange { path, .. }
            | AccessError::MalformedPath { path, .. }
            | AccessError::Undeclared { path, .. } => Some(path),
            AccessError::EmptyPath => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Type '{0}' is already registered")]
    DuplicateType(String),

    #[error("Type '{0}' is not registered")]
    UnknownType(String),

    #[error("Field '{field}' of '{tag}' nests a collection directly inside a collection")]
    NestedCollection { tag: String, field: String },

    #[error("Field name '{field}' of '{tag}' is not a valid member name")]
    InvalidFieldName { tag: String, field: String },
}

/// A type tag that could not be resolved while loading a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTagIssue {
    /// Location of the offending object in the source document
    pub path: Path,

    /// The tag found, or `None` when the object carries no tag at all
    pub tag: Option<String>,
}

impl fmt::Display for TypeTagIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "unresolved type '{}' at '{}'", tag, self.path),
            None => write!(f, "missing type tag at '{}'", self.path),
        }
    }
}

fn join_issues(issues: &[TypeTagIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Document references unknown types: {}", join_issues(.0))]
    UnresolvedTypes(Vec<TypeTagIssue>),

    #[error("Schema violation at '{path}': {message}")]
    Schema { path: Path, message: String },
}

impl DocumentError {
    pub fn schema(path: &Path, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.clone(),
            message: message.into(),
        }
    }
}
