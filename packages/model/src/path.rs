//! # Structural Paths
//!
//! A [`Path`] addresses any value reachable from a root set as an ordered
//! sequence of steps: enter a named member, or enter a collection index.
//!
//! ## String form
//!
//! ```text
//! ""                    the root set itself
//! "[1]"                 second root node
//! "[1].inputs[2]"       third element of the `inputs` multi-port of root 1
//! "[0].holder.node"     node held inside a wrapper record
//! "[0][\"a.b\"]"       member whose name is not an identifier
//! ```
//!
//! Member names that are not identifiers are written in brackets as a
//! quoted string, with `"` and `\` escaped by a backslash.
//!
//! Paths are undo-log addresses and cache keys, so `Display` and `FromStr`
//! round-trip exactly and equality/hashing are defined over the steps.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// One step of a [`Path`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    /// Enter a named member of a node or record
    Member(Arc<str>),

    /// Enter an element of a collection (or the root set)
    Index(usize),
}

impl Step {
    pub fn member(name: impl AsRef<str>) -> Self {
        Step::Member(Arc::from(name.as_ref()))
    }

    pub fn as_member(&self) -> Option<&str> {
        match self {
            Step::Member(name) => Some(name),
            Step::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Step::Index(i) => Some(*i),
            Step::Member(_) => None,
        }
    }
}

/// Immutable structural address
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    steps: Arc<[Step]>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathParseError {
    #[error("Unexpected character '{found}' at {pos} in path '{input}'")]
    UnexpectedChar {
        input: String,
        pos: usize,
        found: char,
    },

    #[error("Invalid index '{index}' in path '{input}'")]
    InvalidIndex { input: String, index: String },

    #[error("Unterminated index in path '{input}'")]
    UnterminatedIndex { input: String },

    #[error("Empty member name at {pos} in path '{input}'")]
    EmptyMember { input: String, pos: usize },

    #[error("Unterminated quoted member in path '{input}'")]
    UnterminatedQuote { input: String },
}

impl Path {
    /// The zero-step path denoting the root set
    pub fn empty() -> Self {
        Self::from_steps(Vec::new())
    }

    /// Single index step from the root set
    pub fn index(i: usize) -> Self {
        Self::from_steps(vec![Step::Index(i)])
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Append a step, producing a child path
    pub fn push(&self, step: Step) -> Self {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(step);
        Self::from_steps(steps)
    }

    pub fn child_member(&self, name: impl AsRef<str>) -> Self {
        self.push(Step::member(name))
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.push(Step::Index(index))
    }

    /// Concatenate `suffix` onto this path
    pub fn join(&self, suffix: &Path) -> Self {
        if suffix.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return suffix.clone();
        }
        let mut steps = Vec::with_capacity(self.len() + suffix.len());
        steps.extend_from_slice(&self.steps);
        steps.extend_from_slice(&suffix.steps);
        Self::from_steps(steps)
    }

    /// All but the last step; `None` for the empty path
    pub fn parent(&self) -> Option<Path> {
        if self.is_empty() {
            return None;
        }
        Some(Self::from_steps(self.steps[..self.len() - 1].to_vec()))
    }

    /// Prefix of the first `len` steps
    pub fn prefix(&self, len: usize) -> Path {
        Self::from_steps(self.steps[..len.min(self.len())].to_vec())
    }

    /// Steps of `self` after `ancestor`, if `ancestor` is a prefix
    pub fn strip_prefix(&self, ancestor: &Path) -> Option<Path> {
        if self.starts_with(ancestor) {
            Some(Self::from_steps(self.steps[ancestor.len()..].to_vec()))
        } else {
            None
        }
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.steps.starts_with(&prefix.steps)
    }

    /// Strict prefix test: a path is not its own ancestor
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.len() < other.len() && other.starts_with(self)
    }

    /// Index of the root this path starts in, if it starts with an index step
    pub fn root_index(&self) -> Option<usize> {
        self.steps.first().and_then(Step::as_index)
    }

    /// Reject step sequences that put a collection directly inside a
    /// collection. The root set counts as a collection, so a path may not
    /// start with two index steps either.
    pub fn validate_shape(&self) -> Result<(), String> {
        for (i, pair) in self.steps.windows(2).enumerate() {
            if let (Step::Index(_), Step::Index(_)) = (&pair[0], &pair[1]) {
                return Err(format!(
                    "nested collections at step {} (an intermediate node is required between collection levels)",
                    i + 1
                ));
            }
        }
        Ok(())
    }

    pub fn parse(input: &str) -> Result<Self, PathParseError> {
        input.parse()
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Member(name) if is_member_name(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Step::Member(name) => {
                    f.write_str("[\"")?;
                    for c in name.chars() {
                        if c == '"' || c == '\\' {
                            f.write_str("\\")?;
                        }
                        write!(f, "{}", c)?;
                    }
                    f.write_str("\"]")?;
                }
                Step::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.to_string())
    }
}

fn is_member_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_member_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whether `name` can be written bare in a path string
pub(crate) fn is_member_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_member_start(c) => chars.all(is_member_char),
        _ => false,
    }
}

/// Read a quoted member starting after `["`; returns the name and the
/// position after the closing `]`
fn parse_quoted(input: &str, chars: &[char], mut pos: usize) -> Result<(String, usize), PathParseError> {
    let mut name = String::new();
    loop {
        match chars.get(pos) {
            None => {
                return Err(PathParseError::UnterminatedQuote {
                    input: input.to_string(),
                })
            }
            Some('\\') => match chars.get(pos + 1) {
                Some(&c) if c == '"' || c == '\\' => {
                    name.push(c);
                    pos += 2;
                }
                Some(&found) => {
                    return Err(PathParseError::UnexpectedChar {
                        input: input.to_string(),
                        pos: pos + 1,
                        found,
                    })
                }
                None => {
                    return Err(PathParseError::UnterminatedQuote {
                        input: input.to_string(),
                    })
                }
            },
            Some('"') => break,
            Some(&c) => {
                name.push(c);
                pos += 1;
            }
        }
    }
    match chars.get(pos + 1) {
        Some(']') => Ok((name, pos + 2)),
        Some(&found) => Err(PathParseError::UnexpectedChar {
            input: input.to_string(),
            pos: pos + 1,
            found,
        }),
        None => Err(PathParseError::UnterminatedQuote {
            input: input.to_string(),
        }),
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = input.chars().collect();
        let mut steps = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            if c == '[' && chars.get(pos + 1) == Some(&'"') {
                let (name, next) = parse_quoted(input, &chars, pos + 2)?;
                steps.push(Step::member(name));
                pos = next;
                continue;
            }
            if c == '[' {
                let start = pos + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != ']' {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(PathParseError::UnterminatedIndex {
                        input: input.to_string(),
                    });
                }
                let digits: String = chars[start..end].iter().collect();
                let index = if !digits.is_empty() && digits.chars().all(|d| d.is_ascii_digit()) {
                    digits.parse::<usize>().ok()
                } else {
                    None
                };
                let index = index.ok_or_else(|| PathParseError::InvalidIndex {
                    input: input.to_string(),
                    index: digits.clone(),
                })?;
                steps.push(Step::Index(index));
                pos = end + 1;
                continue;
            }

            // A member name either opens the path or follows a '.'
            if c == '.' {
                if steps.is_empty() {
                    return Err(PathParseError::UnexpectedChar {
                        input: input.to_string(),
                        pos,
                        found: c,
                    });
                }
                pos += 1;
                if pos >= chars.len() || !is_member_start(chars[pos]) {
                    return Err(PathParseError::EmptyMember {
                        input: input.to_string(),
                        pos,
                    });
                }
            } else if !(steps.is_empty() && is_member_start(c)) {
                return Err(PathParseError::UnexpectedChar {
                    input: input.to_string(),
                    pos,
                    found: c,
                });
            }

            let start = pos;
            while pos < chars.len() && is_member_char(chars[pos]) {
                pos += 1;
            }
            let name: String = chars[start..pos].iter().collect();
            steps.push(Step::member(name));
        }

        Ok(Self::from_steps(steps))
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
