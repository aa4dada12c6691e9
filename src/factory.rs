//! Deep cloning of layout subtrees.
//!
//! Cloning is semantic, not structural: constants copy their literal,
//! computed providers are recreated fresh so they resolve against the
//! clone's own position, function callbacks share their `Rc`, and a frozen
//! relative-offset base only survives when the provider already ignores
//! boundaries (otherwise the clone re-derives its offset from its new
//! siblings).

use std::rc::Rc;

use hashbrown::HashMap;

use crate::props::{Property, ValueProvider};
use crate::tree::{Node, NodeId, Tree};

/// Clones nodes and whole subtrees.
#[derive(Debug, Default)]
pub struct TemplateFactory;

impl TemplateFactory {
    pub fn new() -> Self {
        TemplateFactory
    }

    /// Clones `src` into a fresh arena.
    pub fn clone_tree(&self, src: &Tree) -> Tree {
        let mut dst = Tree::new(clone_node(src.node(src.root()), None));
        let dst_root = dst.root();
        self.clone_children(src, src.root(), &mut dst, dst_root);
        dst
    }

    fn clone_children(&self, src: &Tree, from: NodeId, dst: &mut Tree, onto: NodeId) {
        for &child in src.children(from) {
            let id = dst.add_child(onto, clone_node(src.node(child), None));
            self.clone_children(src, child, dst, id);
        }
    }

    /// Clones the subtree rooted at `id` within its own arena, renaming the
    /// top node to `name-index`. The clone is left detached; the caller
    /// splices it in. Descendants keep their names.
    pub fn duplicate(&self, tree: &mut Tree, id: NodeId, index: usize) -> NodeId {
        let name = tree
            .node(id)
            .name
            .as_ref()
            .map(|name| format!("{name}-{index}"));
        self.duplicate_subtree(tree, id, name)
    }

    fn duplicate_subtree(&self, tree: &mut Tree, id: NodeId, name: Option<String>) -> NodeId {
        let clone = clone_node(tree.node(id), name);
        let clone_id = tree.insert_orphan(clone);
        let children = tree.children(id).to_vec();
        for child in children {
            let child_clone = self.duplicate_subtree(tree, child, None);
            tree.attach(clone_id, child_clone);
        }
        clone_id
    }
}

fn clone_node(node: &Node, name: Option<String>) -> Node {
    Node {
        name: name.or_else(|| node.name.clone()),
        parent: None,
        children: Vec::new(),
        child_index: HashMap::new(),
        addressing_mode: node.addressing_mode,
        byte_order: node.byte_order,
        offset: clone_property(&node.offset),
        size: clone_property(&node.size),
        boundary: clone_property(&node.boundary),
        padding_before: clone_property(&node.padding_before),
        padding_after: clone_property(&node.padding_after),
        count: clone_property(&node.count),
        signature: node.signature.clone(),
        hint: node.hint,
    }
}

fn clone_property(prototype: &Property) -> Property {
    let provider = match &prototype.provider {
        ValueProvider::Const(value) => ValueProvider::Const(*value),
        ValueProvider::Function(f) => ValueProvider::Function(Rc::clone(f)),
        ValueProvider::Reference { name } => ValueProvider::Reference { name: name.clone() },
        // A frozen base is positional state; it only carries over when the
        // provider does not re-derive the offset from siblings anyway.
        ValueProvider::RelativeOffset {
            ignore_boundary: true,
            base,
        } => ValueProvider::RelativeOffset {
            ignore_boundary: true,
            base: *base,
        },
        ValueProvider::RelativeOffset {
            ignore_boundary: false,
            ..
        } => ValueProvider::RelativeOffset {
            ignore_boundary: false,
            base: 0,
        },
        ValueProvider::AutoSize => ValueProvider::AutoSize,
        ValueProvider::StretchSize => ValueProvider::StretchSize,
        ValueProvider::Leb128Value => ValueProvider::Leb128Value,
        ValueProvider::Leb128Size => ValueProvider::Leb128Size,
    };
    Property {
        provider,
        converter: prototype.converter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clone_tree_copies_structure_and_literals() {
        let mut src = Tree::new(Node::named("root"));
        let a = src.add_child(src.root(), Node::named("a").with_size(4).with_boundary(8));
        src.add_child(a, Node::named("a1").with_signature(&[0x7f, 0x45]));

        let dst = TemplateFactory::new().clone_tree(&src);

        let a = dst.child_by_name(dst.root(), "a").unwrap();
        let a1 = dst.child_by_name(a, "a1").unwrap();
        assert!(matches!(dst.node(a).size.provider, ValueProvider::Const(4)));
        assert!(matches!(
            dst.node(a).boundary.provider,
            ValueProvider::Const(8)
        ));
        assert_eq!(dst.node(a1).signature, Some(vec![0x7f, 0x45]));
    }

    #[test]
    fn test_duplicate_renames_only_the_top_node() {
        let mut tree = Tree::new(Node::named("root"));
        let a = tree.add_child(tree.root(), Node::named("a"));
        tree.add_child(a, Node::named("inner"));

        let clone = TemplateFactory::new().duplicate(&mut tree, a, 2);

        assert_eq!(tree.node(clone).name.as_deref(), Some("a-2"));
        assert_eq!(tree.children(clone).len(), 1);
        assert_eq!(
            tree.node(tree.children(clone)[0]).name.as_deref(),
            Some("inner")
        );
        assert_eq!(tree.parent(clone), None);
    }

    #[test]
    fn test_relative_offset_base_resets_unless_boundary_ignored() {
        let mut frozen = Property::relative_offset();
        frozen.set(16).unwrap();
        assert!(matches!(
            clone_property(&frozen).provider,
            ValueProvider::RelativeOffset {
                ignore_boundary: false,
                base: 0,
            }
        ));

        let pinned = Property::relative_offset_ignoring_boundary(16);
        assert!(matches!(
            clone_property(&pinned).provider,
            ValueProvider::RelativeOffset {
                ignore_boundary: true,
                base: 16,
            }
        ));
    }

    #[test]
    fn test_function_providers_share_their_callback() {
        let prototype = Property::function(|| 42);
        let clone = clone_property(&prototype);
        match (&prototype.provider, &clone.provider) {
            (ValueProvider::Function(a), ValueProvider::Function(b)) => {
                assert!(Rc::ptr_eq(a, b));
                assert_eq!(b(), 42);
            }
            other => panic!("expected function providers, got {other:?}"),
        }
    }
}
