//! The binding engine: turns a template tree into a data-bound tree.
//!
//! Binding clones the template, then rewrites the clone to a fixpoint. Three
//! rewrites exist: a node whose count resolves above one expands into that
//! many suffixed clones, a count of zero prunes the node, and a node with a
//! signature is checked against the data (a match clears the signature, a
//! mismatch is fatal unless the node is hinted, in which case it prunes).
//! Every rewrite restarts the scan from the root, so rewrites triggered by
//! earlier rewrites are picked up naturally.

use log::{debug, trace};

use crate::data::DataProvider;
use crate::err::{Error, Result};
use crate::factory::TemplateFactory;
use crate::props::Property;
use crate::resolve::Resolver;
use crate::tree::{NodeId, Tree};

enum Action {
    Expand(NodeId, u64),
    Prune(NodeId),
    Validate(NodeId),
}

/// Rewrites template clones into data-bound trees.
#[derive(Debug, Default)]
pub struct BindingEngine {
    factory: TemplateFactory,
}

impl BindingEngine {
    pub fn new() -> Self {
        BindingEngine {
            factory: TemplateFactory::new(),
        }
    }

    /// Clones `template` and rewrites the clone against `data` until no
    /// expansion, pruning or validation remains.
    pub fn bind(&self, template: &Tree, data: &mut dyn DataProvider) -> Result<Tree> {
        let mut bound = self.factory.clone_tree(template);
        while let Some(action) = self.find_actionable(&bound, data)? {
            match action {
                Action::Expand(id, count) => self.expand(&mut bound, id, count),
                Action::Prune(id) => {
                    debug!("pruning node {:?} (count resolved to 0)", bound.node(id).name);
                    bound.detach(id);
                }
                Action::Validate(id) => self.validate(&mut bound, id, data)?,
            }
        }
        Ok(bound)
    }

    /// First rewritable node in pre-order. The root never expands or prunes
    /// (there is nothing to splice it into), but its signature still counts.
    fn find_actionable(
        &self,
        tree: &Tree,
        data: &mut dyn DataProvider,
    ) -> Result<Option<Action>> {
        let mut resolver = Resolver::new(tree, data);
        for id in tree.pre_order(tree.root()) {
            if id != tree.root() {
                let count = resolver.count(id)?;
                if count == 0 {
                    return Ok(Some(Action::Prune(id)));
                }
                if count > 1 {
                    return Ok(Some(Action::Expand(id, count)));
                }
            }
            if tree.node(id).signature.is_some() {
                return Ok(Some(Action::Validate(id)));
            }
        }
        Ok(None)
    }

    /// Replaces `id` in its parent's child list with `count` clones named
    /// `name-0` through `name-(count-1)`, each with its count pinned to 1.
    fn expand(&self, tree: &mut Tree, id: NodeId, count: u64) {
        let Some(parent) = tree.parent(id) else {
            return;
        };
        let Some(position) = tree.position_in_parent(id) else {
            return;
        };
        debug!(
            "expanding node {:?} into {count} clones",
            tree.node(id).name
        );

        let mut clones = Vec::with_capacity(count as usize);
        for index in 0..count {
            let clone = self.factory.duplicate(tree, id, index as usize);
            tree.node_mut(clone).count = Property::constant(1);
            clones.push(clone);
        }

        let mut children = tree.children(parent).to_vec();
        children.splice(position..=position, clones);
        tree.replace_children(parent, children);
        tree.detach(id);
    }

    /// Compares the node's signature with the bytes at its address. The gap
    /// between a mismatch and a read past the end of the data is immaterial,
    /// so a short read counts as a mismatch against no bytes.
    fn validate(&self, tree: &mut Tree, id: NodeId, data: &mut dyn DataProvider) -> Result<()> {
        let Some(expected) = tree.node(id).signature.clone() else {
            return Ok(());
        };
        let address = Resolver::new(tree, data).absolute_address(id)?;
        let found = match data.read_at(address, expected.len()) {
            Ok(found) => found,
            Err(Error::OutOfBounds { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        if found == expected {
            trace!(
                "signature of node {:?} matched at address {address:#x}",
                tree.node(id).name
            );
            tree.node_mut(id).signature = None;
            Ok(())
        } else if tree.node(id).hint {
            debug!(
                "signature of hinted node {:?} mismatched at address {address:#x}, pruning",
                tree.node(id).name
            );
            tree.detach(id);
            Ok(())
        } else {
            Err(Error::SignatureMismatch {
                address,
                expected,
                found,
            })
        }
    }
}
