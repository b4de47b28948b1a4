use crate::path::{Path, Step};
use crate::roots::RootSet;
use crate::value::{Node, Tagged, Value};

/// Port under which a child node hangs, relative to its owning node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    /// Member route to the port, e.g. `inputs` or `holder.node`
    pub name: String,

    /// Position inside a multi-port collection
    pub index: Option<usize>,
}

impl Port {
    /// Derive the port from the relative route of a child
    pub fn from_route(route: &Path) -> Self {
        match route.last() {
            Some(Step::Index(i)) => Self {
                name: route.parent().unwrap_or_default().to_string(),
                index: Some(*i),
            },
            _ => Self {
                name: route.to_string(),
                index: None,
            },
        }
    }

    pub fn in_multi_port(&self) -> bool {
        self.index.is_some()
    }

    /// Text used by tree views, e.g. `inputs[2]`
    pub fn label(&self) -> String {
        match self.index {
            Some(i) => format!("{}[{}]", self.name, i),
            None => self.name.clone(),
        }
    }
}

/// A child node together with the route that reaches it from its parent
#[derive(Debug, Clone)]
pub struct ChildLink<'a> {
    pub route: Path,
    pub node: &'a Node,
}

impl ChildLink<'_> {
    pub fn port(&self) -> Port {
        Port::from_route(&self.route)
    }
}

/// Direct child nodes of `node`, found by inspecting every member value.
///
/// Nodes are found directly in members, as elements of lists (multi-ports)
/// and inside records. Lists nested directly in lists are skipped.
pub fn child_links(node: &Node) -> Vec<ChildLink<'_>> {
    let mut links = Vec::new();
    for (name, value) in node.members() {
        collect_value(value, Path::empty().child_member(name), false, &mut links);
    }
    links
}

fn collect_value<'a>(value: &'a Value, route: Path, in_list: bool, out: &mut Vec<ChildLink<'a>>) {
    match value {
        Value::Node(child) => out.push(ChildLink {
            route,
            node: &**child,
        }),
        Value::Record(record) => {
            for (name, member) in record.members() {
                collect_value(member, route.child_member(name), false, out);
            }
        }
        Value::List(items) if !in_list => {
            for (i, item) in items.iter().enumerate() {
                collect_value(item, route.child_index(i), true, out);
            }
        }
        _ => {}
    }
}

/// Visitor over the nodes of a root set
///
/// Override `visit_node` to act on each node; call [`walk_node`] from the
/// override to continue into its children.
pub trait Visitor<'a>: Sized {
    fn visit_node(&mut self, path: &Path, node: &'a Node, depth: usize) {
        walk_node(self, path, node, depth);
    }
}

pub fn walk_roots<'a, V: Visitor<'a>>(visitor: &mut V, roots: &'a RootSet) {
    for (i, node) in roots.iter().enumerate() {
        visitor.visit_node(&Path::index(i), node, 0);
    }
}

pub fn walk_node<'a, V: Visitor<'a>>(visitor: &mut V, path: &Path, node: &'a Node, depth: usize) {
    for link in child_links(node) {
        visitor.visit_node(&path.join(&link.route), link.node, depth + 1);
    }
}

/// Collects `(path, node)` pairs, optionally stopping below `max_depth`
pub(crate) struct NodeCollector<'a> {
    pub max_depth: Option<usize>,
    pub nodes: Vec<(Path, &'a Node)>,
}

impl<'a> Visitor<'a> for NodeCollector<'a> {
    fn visit_node(&mut self, path: &Path, node: &'a Node, depth: usize) {
        self.nodes.push((path.clone(), node));
        if self.max_depth.map_or(true, |max| depth < max) {
            walk_node(self, path, node, depth);
        }
    }
}
