//! # Root Set
//!
//! The ordered top-level nodes of one document. Root `i` is addressed by
//! `Path::index(i)`; the empty path denotes the set itself.
//!
//! Besides path access the root set renders a diagnostic tree view:
//!
//! ```text
//! [0] Constant
//! [1] Sum
//! ├─ inputs[0]: Constant
//! ├─ inputs[1]: Constant
//! └─ inputs[2]: Constant
//! ```

use crate::accessor;
use crate::error::AccessResult;
use crate::path::Path;
use crate::value::{FromValue, Node, Tagged, Value, ValueRef};
use crate::visitor::{child_links, walk_roots, NodeCollector, Visitor};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub const BRANCH: &str = "├─ ";
pub const LAST_BRANCH: &str = "└─ ";
pub const PIPE: &str = "│  ";
pub const SPACE: &str = "   ";

/// Optional per-node annotation appended to tree-view lines
pub type Annotate<'f> = &'f dyn Fn(&Path, &Node) -> Option<String>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RootSet {
    nodes: Vec<Node>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn get_value<T: FromValue>(&self, path: &Path) -> AccessResult<T> {
        accessor::get_value(self, path)
    }

    pub fn get_ref(&self, path: &Path) -> AccessResult<ValueRef<'_>> {
        accessor::get_ref(self, path)
    }

    pub fn set_value(&mut self, path: &Path, value: impl Into<Value>) -> AccessResult<Value> {
        accessor::set_value(self, path, value.into())
    }

    pub fn insert_at(&mut self, path: &Path, value: impl Into<Value>) -> AccessResult<()> {
        accessor::insert_at(self, path, value.into())
    }

    pub fn remove_at(&mut self, path: &Path) -> AccessResult<Value> {
        accessor::remove_at(self, path)
    }

    /// All reachable `(path, node)` pairs in depth-first order. With
    /// `max_depth = Some(0)` only roots are returned.
    pub fn collect_nodes(&self, max_depth: Option<usize>) -> Vec<(Path, &Node)> {
        let mut collector = NodeCollector {
            max_depth,
            nodes: Vec::new(),
        };
        walk_roots(&mut collector, self);
        collector.nodes
    }

    /// Number of reachable nodes, roots included
    pub fn node_count(&self) -> usize {
        struct Counter(usize);

        impl<'a> Visitor<'a> for Counter {
            fn visit_node(&mut self, path: &Path, node: &'a Node, depth: usize) {
                self.0 += 1;
                crate::visitor::walk_node(self, path, node, depth);
            }
        }

        let mut counter = Counter(0);
        walk_roots(&mut counter, self);
        counter.0
    }

    /// Render the diagnostic tree view
    pub fn tree_view(&self, annotate: Option<Annotate<'_>>) -> String {
        let mut out = String::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let path = Path::index(i);
            out.push_str(&format!("[{}] {}", i, node.tag()));
            push_annotation(&mut out, annotate, &path, node);
            out.push('\n');
            render_children(&mut out, &path, node, "", annotate);
        }
        out
    }
}

pub(crate) fn push_annotation(
    out: &mut String,
    annotate: Option<Annotate<'_>>,
    path: &Path,
    node: &Node,
) {
    if let Some(text) = annotate.and_then(|f| f(path, node)) {
        out.push_str("  (");
        out.push_str(&text);
        out.push(')');
    }
}

fn render_children(
    out: &mut String,
    path: &Path,
    node: &Node,
    prefix: &str,
    annotate: Option<Annotate<'_>>,
) {
    let links = child_links(node);
    let count = links.len();
    for (i, link) in links.into_iter().enumerate() {
        let is_last = i + 1 == count;
        let child_path = path.join(&link.route);
        out.push_str(prefix);
        out.push_str(if is_last { LAST_BRANCH } else { BRANCH });
        out.push_str(&format!("{}: {}", link.port().label(), link.node.tag()));
        push_annotation(out, annotate, &child_path, link.node);
        out.push('\n');

        let next_prefix = format!("{}{}", prefix, if is_last { SPACE } else { PIPE });
        render_children(out, &child_path, link.node, &next_prefix, annotate);
    }
}

impl Serialize for RootSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("RootSet", 1)?;
        doc.serialize_field("roots", &self.nodes)?;
        doc.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_roots() -> RootSet {
        RootSet::from_nodes(vec![
            Node::new("Constant").with("value", 1.0),
            Node::new("Sum").with(
                "inputs",
                vec![
                    Value::from(Node::new("Constant").with("value", 1.0)),
                    Value::from(Node::new("Constant").with("value", 2.0)),
                    Value::from(Node::new("Constant").with("value", 3.0)),
                ],
            ),
        ])
    }

    #[test]
    fn test_collect_nodes_lists_roots_and_multi_port_children() {
        let roots = two_roots();
        let paths: Vec<String> = roots
            .collect_nodes(None)
            .iter()
            .map(|(path, _)| path.to_string())
            .collect();
        assert_eq!(
            paths,
            vec!["[0]", "[1]", "[1].inputs[0]", "[1].inputs[1]", "[1].inputs[2]"]
        );
        assert_eq!(roots.node_count(), 5);
    }

    #[test]
    fn test_collect_nodes_depth_limit() {
        let roots = two_roots();
        assert_eq!(roots.collect_nodes(Some(0)).len(), 2);
        assert_eq!(roots.collect_nodes(Some(1)).len(), 5);
    }

    #[test]
    fn test_tree_view_text() {
        let roots = two_roots();
        let expected = "\
[0] Constant
[1] Sum
├─ inputs[0]: Constant
├─ inputs[1]: Constant
└─ inputs[2]: Constant
";
        assert_eq!(roots.tree_view(None), expected);
    }

    #[test]
    fn test_tree_view_nesting_and_annotations() {
        let roots = RootSet::from_nodes(vec![Node::new("Sum")
            .with(
                "inputs",
                vec![
                    Value::from(Node::new("Negate").with("input", Node::new("Constant"))),
                    Value::from(Node::new("Constant")),
                ],
            )]);

        let annotate = |path: &Path, _node: &Node| Some(path.to_string());
        let expected = "\
[0] Sum  ([0])
├─ inputs[0]: Negate  ([0].inputs[0])
│  └─ input: Constant  ([0].inputs[0].input)
└─ inputs[1]: Constant  ([0].inputs[1])
";
        assert_eq!(roots.tree_view(Some(&annotate)), expected);
    }
}
