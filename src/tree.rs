//! The node arena: a layout is a tree of named byte regions, owned by a
//! [`Tree`] and addressed by [`NodeId`] indices.
//!
//! Parents own the ordered child list; the back-reference from child to
//! parent is a plain index, so detached subtrees simply become unreachable
//! arena slots. Each parent also maintains an explicit name-to-child-index
//! map so named lookups are a map query rather than a scan.

use hashbrown::HashMap;

use crate::props::{AddressingMode, ByteOrder, Property, Sizing, ValueProvider};

/// Index of a node within its owning [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// One rectangular byte region of a layout.
#[derive(Debug)]
pub struct Node {
    /// Optional name, unique among siblings. Used for child lookup and
    /// cross-node references.
    pub name: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Name to position within `children`. First occurrence wins.
    pub(crate) child_index: HashMap<String, usize>,
    pub addressing_mode: AddressingMode,
    pub byte_order: ByteOrder,
    pub offset: Property,
    pub size: Property,
    pub boundary: Property,
    pub padding_before: Property,
    pub padding_after: Property,
    /// Repetition factor. Anything other than 1 only exists transiently,
    /// before the binding engine expands or prunes the node.
    pub count: Property,
    /// Expected exact byte pattern at this node's address.
    pub signature: Option<Vec<u8>>,
    /// Downgrades a signature mismatch from fatal to "prune this node".
    pub hint: bool,
}

impl Default for Node {
    fn default() -> Self {
        Node::new()
    }
}

impl Node {
    pub fn new() -> Self {
        Node {
            name: None,
            parent: None,
            children: Vec::new(),
            child_index: HashMap::new(),
            addressing_mode: AddressingMode::Relative,
            byte_order: ByteOrder::LittleEndian,
            offset: Property::relative_offset(),
            size: Property::auto_size(),
            boundary: Property::constant(0),
            padding_before: Property::constant(0),
            padding_after: Property::constant(0),
            count: Property::constant(1),
            signature: None,
            hint: false,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Node {
            name: Some(name.into()),
            ..Node::new()
        }
    }

    /// Freezes the size to a fixed value.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Property::constant(size);
        self
    }

    /// Freezes the offset to a fixed value.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Property::constant(offset);
        self
    }

    pub fn with_boundary(mut self, boundary: u64) -> Self {
        self.boundary = Property::constant(boundary);
        self
    }

    pub fn with_padding_before(mut self, padding: u64) -> Self {
        self.padding_before = Property::constant(padding);
        self
    }

    pub fn with_padding_after(mut self, padding: u64) -> Self {
        self.padding_after = Property::constant(padding);
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Property::constant(count);
        self
    }

    /// Repetition factor taken from another node's integer value.
    pub fn with_count_reference(mut self, name: impl Into<String>) -> Self {
        self.count = Property::reference(name);
        self
    }

    /// Size taken from another node's integer value.
    pub fn with_size_reference(mut self, name: impl Into<String>) -> Self {
        self.size = Property::reference(name);
        self
    }

    pub fn with_signature(mut self, signature: &[u8]) -> Self {
        self.signature = Some(signature.to_vec());
        self
    }

    pub fn with_hint(mut self) -> Self {
        self.hint = true;
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Switches the node to absolute addressing. Pair with
    /// [`Node::with_offset`]; a relative offset provider left in place keeps
    /// computing sibling-based values.
    pub fn absolute(mut self) -> Self {
        self.addressing_mode = AddressingMode::Absolute;
        self
    }

    /// Sizes the node into the remaining space (next sibling, end of
    /// parent, or end of the byte source).
    pub fn stretched(mut self) -> Self {
        self.size = Property::stretch_size();
        self
    }

    /// The sizing mode, derived from the size property's provider.
    pub fn sizing(&self) -> Sizing {
        match self.size.provider {
            ValueProvider::AutoSize => Sizing::Auto,
            ValueProvider::StretchSize => Sizing::Stretch,
            _ => Sizing::Fix,
        }
    }

    /// Swaps the size property's provider to match `sizing`. Switching to
    /// `Fix` resets the size to 0 until a value is assigned.
    pub fn set_sizing(&mut self, sizing: Sizing) {
        if self.sizing() == sizing {
            return;
        }
        self.size = match sizing {
            Sizing::Auto => Property::auto_size(),
            Sizing::Stretch => Property::stretch_size(),
            Sizing::Fix => Property::constant(0),
        };
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// An arena-backed layout tree.
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Tree {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Appends `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        node.parent = Some(parent);
        let name = node.name.clone();
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        let position = self.nodes[parent.0].children.len();
        self.nodes[parent.0].children.push(id);
        if let Some(name) = name {
            self.nodes[parent.0].child_index.entry(name).or_insert(position);
        }
        id
    }

    /// Inserts `node` without attaching it anywhere. Used by the clone
    /// machinery, which splices the subtree in afterwards.
    pub(crate) fn insert_orphan(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Attaches an existing orphan as the last child of `parent`.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        let position = self.nodes[parent.0].children.len();
        self.nodes[parent.0].children.push(child);
        if let Some(name) = self.nodes[child.0].name.clone() {
            self.nodes[parent.0].child_index.entry(name).or_insert(position);
        }
    }

    /// Detaches `id` (and thereby its whole subtree) from its parent. The
    /// nodes stay in the arena but are no longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|&c| c != id);
            self.rebuild_child_index(parent);
        }
        self.nodes[id.0].parent = None;
    }

    /// Replaces the child list of `parent` wholesale, reparenting every
    /// entry. Children absent from the new list are left orphaned.
    pub(crate) fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for &child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0].children = children;
        self.rebuild_child_index(parent);
    }

    fn rebuild_child_index(&mut self, parent: NodeId) {
        let children = self.nodes[parent.0].children.clone();
        let mut index = HashMap::new();
        for (position, child) in children.iter().enumerate() {
            if let Some(name) = &self.nodes[child.0].name {
                index.entry(name.clone()).or_insert(position);
            }
        }
        self.nodes[parent.0].child_index = index;
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn position_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.nodes[parent.0].children.iter().position(|&c| c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position_in_parent(id)?;
        if position == 0 {
            None
        } else {
            Some(self.nodes[parent.0].children[position - 1])
        }
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let position = self.position_in_parent(id)?;
        self.nodes[parent.0].children.get(position + 1).copied()
    }

    /// Direct child of `parent` named `name`, if any.
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let position = *self.nodes[parent.0].child_index.get(name)?;
        self.nodes[parent.0].children.get(position).copied()
    }

    /// First node named `name` in pre-order below (and including) `from`.
    pub fn find_in_subtree(&self, from: NodeId, name: &str) -> Option<NodeId> {
        self.pre_order(from)
            .find(|&id| self.node(id).name.as_deref() == Some(name))
    }

    /// Scoped lookup: searches the subtree of each ancestor of `from`,
    /// nearest first, so the match closest to the referring node wins. The
    /// final scope is the whole tree.
    pub fn find_by_name(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut scope = from;
        loop {
            if let Some(found) = self.find_in_subtree(scope, name) {
                return Some(found);
            }
            scope = self.parent(scope)?;
        }
    }

    pub fn pre_order(&self, from: NodeId) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![from],
        }
    }

    /// Nodes without children, in pre-order from the root.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pre_order(self.root)
            .filter(|&id| self.node(id).children.is_empty())
    }
}

/// Depth-first, parents-before-children traversal.
pub struct PreOrder<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(id).children.iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(tree: &Tree, ids: impl IntoIterator<Item = NodeId>) -> Vec<String> {
        ids.into_iter()
            .map(|id| tree.node(id).name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_pre_order_visits_parents_first() {
        let mut tree = Tree::new(Node::named("a"));
        let b = tree.add_child(tree.root(), Node::named("b"));
        tree.add_child(b, Node::named("c"));
        tree.add_child(tree.root(), Node::named("d"));

        assert_eq!(
            names(&tree, tree.pre_order(tree.root())),
            vec!["a", "b", "c", "d"]
        );
    }

    #[test]
    fn test_child_by_name_uses_the_index() {
        let mut tree = Tree::new(Node::named("root"));
        tree.add_child(tree.root(), Node::named("header"));
        let payload = tree.add_child(tree.root(), Node::named("payload"));

        assert_eq!(tree.child_by_name(tree.root(), "payload"), Some(payload));
        assert_eq!(tree.child_by_name(tree.root(), "missing"), None);
    }

    #[test]
    fn test_find_by_name_prefers_the_nearest_scope() {
        // Two nodes named `size`; the reference inside `inner` must see the
        // inner one.
        let mut tree = Tree::new(Node::named("root"));
        tree.add_child(tree.root(), Node::named("size"));
        let inner = tree.add_child(tree.root(), Node::named("inner"));
        let inner_size = tree.add_child(inner, Node::named("size"));
        let field = tree.add_child(inner, Node::named("field"));

        assert_eq!(tree.find_by_name(field, "size"), Some(inner_size));
    }

    #[test]
    fn test_find_by_name_falls_back_to_the_whole_tree() {
        let mut tree = Tree::new(Node::named("root"));
        let header = tree.add_child(tree.root(), Node::named("header"));
        let body = tree.add_child(tree.root(), Node::named("body"));
        let field = tree.add_child(body, Node::named("field"));

        assert_eq!(tree.find_by_name(field, "header"), Some(header));
        assert_eq!(tree.find_by_name(field, "missing"), None);
    }

    #[test]
    fn test_detach_removes_subtree_from_traversal() {
        let mut tree = Tree::new(Node::named("a"));
        let b = tree.add_child(tree.root(), Node::named("b"));
        tree.add_child(b, Node::named("c"));
        tree.add_child(tree.root(), Node::named("d"));

        tree.detach(b);

        assert_eq!(names(&tree, tree.pre_order(tree.root())), vec!["a", "d"]);
        assert_eq!(tree.child_by_name(tree.root(), "b"), None);
        assert_eq!(tree.child_by_name(tree.root(), "d"), Some(NodeId(3)));
    }

    #[test]
    fn test_sibling_navigation() {
        let mut tree = Tree::new(Node::named("a"));
        let b = tree.add_child(tree.root(), Node::named("b"));
        let c = tree.add_child(tree.root(), Node::named("c"));
        let d = tree.add_child(tree.root(), Node::named("d"));

        assert_eq!(tree.previous_sibling(b), None);
        assert_eq!(tree.previous_sibling(c), Some(b));
        assert_eq!(tree.next_sibling(c), Some(d));
        assert_eq!(tree.next_sibling(d), None);
        assert_eq!(tree.position_in_parent(d), Some(2));
    }

    #[test]
    fn test_sizing_round_trip() {
        let mut node = Node::new();
        assert_eq!(node.sizing(), Sizing::Auto);
        node.set_sizing(Sizing::Stretch);
        assert_eq!(node.sizing(), Sizing::Stretch);
        node.set_sizing(Sizing::Fix);
        assert_eq!(node.sizing(), Sizing::Fix);
    }
}
