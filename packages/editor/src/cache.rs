//! # Node Tree Cache
//!
//! Derived metadata index over every node reachable from a root set:
//! parent/child links, depth, render order and the port each node hangs
//! under. The index is a disposable view of the tree.
//!
//! ## Lifecycle
//!
//! ```text
//! mark_dirty() ──→ refresh_if_needed() ──→ queries
//!      ↑                  │
//!      └── structural     └── full rebuild (only when dirty)
//!          mutation
//! ```
//!
//! ## Traversal
//!
//! Depth-first from each root, pre-order. At each node only the members its
//! [`TypeShape`](nodegraph_model::TypeShape) marks as child-bearing are
//! visited, in declaration order; multi-ports in collection order. Render
//! order is the pre-order counter.
//!
//! The traversal stack and per-node child lists live in a scratch arena
//! that is reset when a rebuild starts and when it ends, on every exit
//! path.
//!
//! A node whose type is unregistered, or whose members do not match their
//! declaration, is logged and skipped. A rebuild never fails.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use nodegraph_model::{
    AccessError, FieldType, Node, Path, Port, RootSet, Tagged, TypeKind, TypeShapeRegistry, Value,
    ValueKind, BRANCH, LAST_BRANCH, PIPE, SPACE,
};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument, warn};

/// Arena slot of a metadata entry. Only valid for the rebuild that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(usize);

impl MetaId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Cache entry for one reachable node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetadata {
    pub path: Path,

    /// Back-reference into the same arena; owns nothing
    pub parent: Option<MetaId>,

    /// Distance from the owning root
    pub depth: usize,

    pub children: Vec<MetaId>,
    pub render_order: usize,
    pub in_multi_port: bool,

    /// Member route under the parent, e.g. `inputs` or `holder.node`
    pub port_name: Option<String>,
    pub port_index: Option<usize>,

    pub root_index: usize,
    pub type_tag: String,
}

impl NodeMetadata {
    /// Tree-view label, `[i]` for roots and `port[i]` otherwise
    pub fn label(&self) -> String {
        match (&self.port_name, self.port_index) {
            (Some(name), Some(i)) => format!("{}[{}]", name, i),
            (Some(name), None) => name.clone(),
            (None, _) => format!("[{}]", self.root_index),
        }
    }
}

/// Resets the scratch arena when created and again when dropped
struct ScratchScope<'a> {
    bump: &'a mut Bump,
}

impl<'a> ScratchScope<'a> {
    fn new(bump: &'a mut Bump) -> Self {
        bump.reset();
        Self { bump }
    }

    fn bump(&self) -> &Bump {
        self.bump
    }
}

impl Drop for ScratchScope<'_> {
    fn drop(&mut self) {
        self.bump.reset();
    }
}

struct Frame<'r> {
    node: &'r Node,
    path: Path,
    parent: Option<MetaId>,
    depth: usize,
    port: Option<Port>,
    root_index: usize,
}

#[derive(Debug)]
pub struct TreeCache {
    entries: Vec<NodeMetadata>,
    by_path: HashMap<Path, MetaId>,
    roots: Vec<MetaId>,
    dirty: bool,
    rebuilds: usize,
    skipped: usize,
    scratch: Bump,
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeCache {
    /// Create an empty cache; the first refresh always rebuilds
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_path: HashMap::new(),
            roots: Vec::new(),
            dirty: true,
            rebuilds: 0,
            skipped: 0,
            scratch: Bump::new(),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of rebuilds performed so far
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Values skipped by the last rebuild: unregistered nodes and members
    /// that do not match their declaration
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Rebuild if dirty. Returns whether a rebuild ran.
    pub fn refresh_if_needed(&mut self, roots: &RootSet, registry: &TypeShapeRegistry) -> bool {
        if !self.dirty {
            return false;
        }
        self.rebuild(roots, registry);
        true
    }

    #[instrument(skip_all, fields(roots = roots.len()))]
    fn rebuild(&mut self, roots: &RootSet, registry: &TypeShapeRegistry) {
        let TreeCache {
            entries,
            by_path,
            roots: root_ids,
            scratch,
            ..
        } = self;
        entries.clear();
        by_path.clear();
        root_ids.clear();
        let mut skipped = 0;

        {
            let scope = ScratchScope::new(scratch);
            let mut stack: BumpVec<Frame<'_>> = BumpVec::new_in(scope.bump());
            let mut children: BumpVec<(Path, &Node)> = BumpVec::new_in(scope.bump());

            for (i, node) in roots.iter().enumerate().rev() {
                stack.push(Frame {
                    node,
                    path: Path::index(i),
                    parent: None,
                    depth: 0,
                    port: None,
                    root_index: i,
                });
            }

            while let Some(frame) = stack.pop() {
                let tag = frame.node.tag();
                let shape = match registry.shape(tag) {
                    Some(shape) if shape.kind == TypeKind::Node => shape,
                    Some(_) => {
                        warn!(path = %frame.path, tag, "Record type used as a node; skipping subtree");
                        skipped += 1;
                        continue;
                    }
                    None => {
                        warn!(path = %frame.path, tag, "Unregistered node type; skipping subtree");
                        skipped += 1;
                        continue;
                    }
                };

                let id = MetaId(entries.len());
                let (port_name, port_index) = match &frame.port {
                    Some(port) => (Some(port.name.clone()), port.index),
                    None => (None, None),
                };
                entries.push(NodeMetadata {
                    path: frame.path.clone(),
                    parent: frame.parent,
                    depth: frame.depth,
                    children: Vec::new(),
                    render_order: id.0,
                    in_multi_port: port_index.is_some(),
                    port_name,
                    port_index,
                    root_index: frame.root_index,
                    type_tag: tag.to_string(),
                });
                by_path.insert(frame.path.clone(), id);
                match frame.parent {
                    Some(parent) => entries[parent.0].children.push(id),
                    None => root_ids.push(id),
                }

                if shape.no_node_container {
                    continue;
                }

                children.clear();
                for member in shape.child_members() {
                    let route = Path::empty().child_member(&member.name);
                    match frame.node.member(&member.name) {
                        Some(value) => {
                            skipped += gather_typed(value, &member.ty, route, &frame.path, registry, &mut children);
                        }
                        None => {
                            warn!(path = %frame.path, member = %member.name, "Declared member missing on node");
                            skipped += 1;
                        }
                    }
                }

                // Reverse so the first child is visited first
                while let Some((route, child)) = children.pop() {
                    stack.push(Frame {
                        node: child,
                        path: frame.path.join(&route),
                        parent: Some(id),
                        depth: frame.depth + 1,
                        port: Some(Port::from_route(&route)),
                        root_index: frame.root_index,
                    });
                }
            }
        }

        self.skipped = skipped;
        self.rebuilds += 1;
        self.dirty = false;
        debug!(nodes = self.entries.len(), skipped, rebuilds = self.rebuilds, "Tree cache rebuilt");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: MetaId) -> Option<&NodeMetadata> {
        self.entries.get(id.0)
    }

    pub fn id_of(&self, path: &Path) -> Option<MetaId> {
        self.by_path.get(path).copied()
    }

    pub fn by_path(&self, path: &Path) -> Option<&NodeMetadata> {
        self.id_of(path).and_then(|id| self.get(id))
    }

    pub fn roots(&self) -> &[MetaId] {
        &self.roots
    }

    pub fn children(&self, id: MetaId) -> &[MetaId] {
        self.get(id).map(|meta| meta.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: MetaId) -> Option<MetaId> {
        self.get(id).and_then(|meta| meta.parent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetaId, &NodeMetadata)> {
        self.entries.iter().enumerate().map(|(i, meta)| (MetaId(i), meta))
    }

    /// Paths of all cached nodes in traversal order
    pub fn all_node_paths(&self) -> Vec<Path> {
        self.entries.iter().map(|meta| meta.path.clone()).collect()
    }

    /// Entries no deeper than `max_depth` (all when `None`)
    pub fn collect(&self, max_depth: Option<usize>) -> Vec<&NodeMetadata> {
        self.entries
            .iter()
            .filter(|meta| max_depth.map_or(true, |max| meta.depth <= max))
            .collect()
    }

    /// Entries sorted for display
    pub fn display_order(&self) -> Vec<&NodeMetadata> {
        let mut ordered: Vec<&NodeMetadata> = self.entries.iter().collect();
        ordered.sort_by_key(|meta| meta.render_order);
        ordered
    }

    /// Tree view built from metadata, in the same format as
    /// [`RootSet::tree_view`]
    pub fn render_tree(&self, annotate: Option<&dyn Fn(&NodeMetadata) -> Option<String>>) -> String {
        let mut out = String::new();
        for &id in &self.roots {
            let meta = &self.entries[id.0];
            out.push_str(&format!("{} {}", meta.label(), meta.type_tag));
            push_annotation(&mut out, annotate, meta);
            out.push('\n');
            self.render_children(&mut out, id, "", annotate);
        }
        out
    }

    fn render_children(
        &self,
        out: &mut String,
        id: MetaId,
        prefix: &str,
        annotate: Option<&dyn Fn(&NodeMetadata) -> Option<String>>,
    ) {
        let children = self.children(id);
        for (i, &child) in children.iter().enumerate() {
            let is_last = i + 1 == children.len();
            let meta = &self.entries[child.0];
            out.push_str(prefix);
            out.push_str(if is_last { LAST_BRANCH } else { BRANCH });
            out.push_str(&format!("{}: {}", meta.label(), meta.type_tag));
            push_annotation(out, annotate, meta);
            out.push('\n');

            let next_prefix = format!("{}{}", prefix, if is_last { SPACE } else { PIPE });
            self.render_children(out, child, &next_prefix, annotate);
        }
    }

    /// Check cached links against the live tree. Diagnostic only: the
    /// cache stays usable whatever the report says.
    pub fn validate(&self, roots: &RootSet) -> ValidationReport {
        let mut issues = Vec::new();

        for (id, meta) in self.iter() {
            match roots.get_ref(&meta.path) {
                Err(err) => issues.push(ValidationIssue::new(&meta.path, IssueKind::Unresolvable(err))),
                Ok(target) => match target.as_node() {
                    None => issues.push(ValidationIssue::new(
                        &meta.path,
                        IssueKind::NotANode { found: target.kind() },
                    )),
                    Some(node) if node.tag() != meta.type_tag => issues.push(ValidationIssue::new(
                        &meta.path,
                        IssueKind::TypeChanged {
                            cached: meta.type_tag.clone(),
                            live: node.tag().to_string(),
                        },
                    )),
                    Some(_) => {}
                },
            }

            if self.id_of(&meta.path) != Some(id) {
                issues.push(ValidationIssue::new(&meta.path, IssueKind::DuplicatePath));
            }

            match meta.parent.and_then(|p| self.get(p)) {
                Some(parent) => {
                    let links = parent.children.iter().filter(|&&c| c == id).count();
                    if links == 0 || !parent.path.is_ancestor_of(&meta.path) {
                        issues.push(ValidationIssue::new(&meta.path, IssueKind::ParentLinkMismatch));
                    } else if links > 1 {
                        issues.push(ValidationIssue::new(&meta.path, IssueKind::DuplicateChild));
                    }
                    if meta.depth != parent.depth + 1 {
                        issues.push(ValidationIssue::new(
                            &meta.path,
                            IssueKind::DepthMismatch {
                                cached: meta.depth,
                                expected: parent.depth + 1,
                            },
                        ));
                    }
                }
                None if meta.parent.is_some() => {
                    issues.push(ValidationIssue::new(&meta.path, IssueKind::ParentLinkMismatch));
                }
                None => {
                    if meta.depth != 0 || meta.path != Path::index(meta.root_index) {
                        issues.push(ValidationIssue::new(
                            &meta.path,
                            IssueKind::DepthMismatch {
                                cached: meta.depth,
                                expected: 0,
                            },
                        ));
                    }
                }
            }
        }

        let live = roots.node_count();
        if live != self.entries.len() {
            issues.push(ValidationIssue::new(
                &Path::empty(),
                IssueKind::NodeCountMismatch {
                    cached: self.entries.len(),
                    live,
                },
            ));
        }

        ValidationReport {
            checked: self.entries.len(),
            stale: self.dirty,
            issues,
        }
    }
}

fn push_annotation(
    out: &mut String,
    annotate: Option<&dyn Fn(&NodeMetadata) -> Option<String>>,
    meta: &NodeMetadata,
) {
    if let Some(text) = annotate.and_then(|f| f(meta)) {
        out.push_str("  (");
        out.push_str(&text);
        out.push(')');
    }
}

/// Collect child nodes under `value` as declared by `ty`. Returns the
/// number of values skipped because they did not match their declaration.
fn gather_typed<'r>(
    value: &'r Value,
    ty: &FieldType,
    route: Path,
    at: &Path,
    registry: &TypeShapeRegistry,
    out: &mut BumpVec<'_, (Path, &'r Node)>,
) -> usize {
    match (ty, value) {
        (_, Value::Null) => 0,
        (FieldType::Node | FieldType::Any, Value::Node(node)) => {
            out.push((route, &**node));
            0
        }
        (FieldType::List(inner), Value::List(items)) => {
            let mut skipped = 0;
            for (i, item) in items.iter().enumerate() {
                skipped += gather_typed(item, inner, route.child_index(i), at, registry, out);
            }
            skipped
        }
        (FieldType::Any, Value::List(items)) => {
            let mut skipped = 0;
            for (i, item) in items.iter().enumerate() {
                if !matches!(item, Value::List(_)) {
                    skipped += gather_typed(item, ty, route.child_index(i), at, registry, out);
                }
            }
            skipped
        }
        (FieldType::Record(_) | FieldType::Any, Value::Record(record)) => {
            let Some(shape) = registry.shape(record.tag()) else {
                warn!(path = %at, route = %route, tag = record.tag(), "Unregistered record type; skipping");
                return 1;
            };
            if shape.no_node_container {
                return 0;
            }
            let mut skipped = 0;
            for member in shape.child_members() {
                if let Some(inner) = record.member(&member.name) {
                    skipped += gather_typed(inner, &member.ty, route.child_member(&member.name), at, registry, out);
                }
            }
            skipped
        }
        (FieldType::Any, _) => 0,
        (declared, found) => {
            warn!(
                path = %at,
                route = %route,
                declared = ?declared,
                found = %found.kind(),
                "Member does not match its declaration; skipping"
            );
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// The cached path no longer resolves
    Unresolvable(AccessError),
    NotANode { found: ValueKind },
    TypeChanged { cached: String, live: String },
    ParentLinkMismatch,
    DuplicateChild,
    DuplicatePath,
    DepthMismatch { cached: usize, expected: usize },
    NodeCountMismatch { cached: usize, live: usize },
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Unresolvable(err) => write!(f, "unresolvable: {}", err),
            IssueKind::NotANode { found } => write!(f, "expected a node, found {}", found),
            IssueKind::TypeChanged { cached, live } => {
                write!(f, "type changed from '{}' to '{}'", cached, live)
            }
            IssueKind::ParentLinkMismatch => f.write_str("parent does not link back to this node"),
            IssueKind::DuplicateChild => f.write_str("parent links this node more than once"),
            IssueKind::DuplicatePath => f.write_str("path is cached more than once"),
            IssueKind::DepthMismatch { cached, expected } => {
                write!(f, "depth {} but expected {}", cached, expected)
            }
            IssueKind::NodeCountMismatch { cached, live } => {
                write!(f, "{} cached nodes but {} live nodes", cached, live)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: Path,
    pub kind: IssueKind,
}

impl ValidationIssue {
    fn new(path: &Path, kind: IssueKind) -> Self {
        Self {
            path: path.clone(),
            kind,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.path, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Entries examined
    pub checked: usize,

    /// The cache was marked dirty when validated
    pub stale: bool,

    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}
