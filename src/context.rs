//! The binding context: one template source, one data source, and the bound
//! tree connecting them.
//!
//! The bound tree is built lazily on first access and kept until the
//! template or the data is replaced, which rebuilds it synchronously. Byte
//! and integer access to named regions goes through the context so that
//! addresses are always computed against the current bound tree.

use log::debug;

use crate::data::{BufferDataProvider, DataProvider};
use crate::engine::BindingEngine;
use crate::err::{Error, Result};
use crate::props::{Property, Sizing, ValueConverter};
use crate::resolve::Resolver;
use crate::tree::{Node, NodeId, Tree};

/// Source of the template tree a context binds.
pub trait TemplateProvider {
    fn template(&self) -> &Tree;
    fn template_mut(&mut self) -> &mut Tree;
    fn set_template(&mut self, template: Tree);
}

/// A template provider holding one owned tree.
#[derive(Debug)]
pub struct StaticTemplateProvider {
    template: Tree,
}

impl StaticTemplateProvider {
    pub fn new(template: Tree) -> Self {
        StaticTemplateProvider { template }
    }
}

impl TemplateProvider for StaticTemplateProvider {
    fn template(&self) -> &Tree {
        &self.template
    }

    fn template_mut(&mut self) -> &mut Tree {
        &mut self.template
    }

    fn set_template(&mut self, template: Tree) {
        self.template = template;
    }
}

/// Couples a template provider with a data provider and caches the tree the
/// engine binds from them.
pub struct BindingContext {
    templates: Box<dyn TemplateProvider>,
    data: Box<dyn DataProvider>,
    engine: BindingEngine,
    bound: Option<Tree>,
}

impl Default for BindingContext {
    fn default() -> Self {
        BindingContext::with_template(Tree::new(Node::new()))
    }
}

impl BindingContext {
    pub fn new(
        templates: impl TemplateProvider + 'static,
        data: impl DataProvider + 'static,
    ) -> Self {
        BindingContext {
            templates: Box::new(templates),
            data: Box::new(data),
            engine: BindingEngine::new(),
            bound: None,
        }
    }

    /// A context over `template` with an empty in-memory byte source.
    pub fn with_template(template: Tree) -> Self {
        BindingContext::new(
            StaticTemplateProvider::new(template),
            BufferDataProvider::default(),
        )
    }

    pub fn with_template_and_data(
        template: Tree,
        data: impl DataProvider + 'static,
    ) -> Self {
        BindingContext::new(StaticTemplateProvider::new(template), data)
    }

    /// The bound tree, built on first access.
    pub fn template(&mut self) -> Result<&Tree> {
        self.parts().map(|(bound, _)| &*bound)
    }

    /// Mutable access to the bound tree. Changes live until the next
    /// rebuild.
    pub fn template_mut(&mut self) -> Result<&mut Tree> {
        self.parts().map(|(bound, _)| bound)
    }

    /// The unbound template tree.
    pub fn tom(&self) -> &Tree {
        self.templates.template()
    }

    /// Mutable access to the unbound template tree. Drops the bound tree,
    /// since edits to the template invalidate it.
    pub fn tom_mut(&mut self) -> &mut Tree {
        self.bound = None;
        self.templates.template_mut()
    }

    /// Replaces the template and rebinds immediately.
    pub fn set_template(&mut self, template: Tree) -> Result<()> {
        debug!("replacing template, rebinding");
        self.templates.set_template(template);
        self.bound = None;
        self.parts().map(|_| ())
    }

    /// Replaces the byte source and rebinds immediately.
    pub fn set_data(&mut self, data: impl DataProvider + 'static) -> Result<()> {
        debug!("replacing data provider, rebinding");
        self.data = Box::new(data);
        self.bound = None;
        self.parts().map(|_| ())
    }

    /// Drops the bound tree; the next access rebuilds it.
    pub fn invalidate(&mut self) {
        self.bound = None;
    }

    /// First node named `name` in the bound tree, in pre-order.
    pub fn find(&mut self, name: &str) -> Result<NodeId> {
        let bound = self.template()?;
        bound
            .find_in_subtree(bound.root(), name)
            .ok_or_else(|| Error::UnresolvedReference {
                name: name.to_owned(),
            })
    }

    /// The byte region bound to `id`.
    pub fn read(&mut self, id: NodeId) -> Result<Vec<u8>> {
        let (bound, data) = self.parts()?;
        Resolver::new(bound, data).read(id)
    }

    /// Writes `bytes` at the node's address. An auto-sized node takes the
    /// written length as its fixed size first, so the address arithmetic of
    /// later siblings sees the region it actually occupies.
    pub fn write(&mut self, id: NodeId, bytes: &[u8]) -> Result<()> {
        let (bound, data) = self.parts()?;
        if bound.node(id).sizing() == Sizing::Auto {
            bound.node_mut(id).size = Property::constant(bytes.len() as u64);
        }
        let address = Resolver::new(bound, &mut *data).absolute_address(id)?;
        data.write_at(address, bytes)
    }

    /// The node's region decoded as an unsigned integer in its byte order.
    pub fn read_int(&mut self, id: NodeId) -> Result<u64> {
        let (bound, data) = self.parts()?;
        Resolver::new(bound, data).read_int(id)
    }

    /// Encodes `value` into the node's region, in its byte order and at its
    /// current size.
    pub fn write_int(&mut self, id: NodeId, value: u64) -> Result<()> {
        let (bound, data) = self.parts()?;
        let mut resolver = Resolver::new(bound, &mut *data);
        let size = resolver.size(id)?;
        let address = resolver.absolute_address(id)?;
        let bytes = ValueConverter::Integer(bound.node(id).byte_order).encode(value, size as usize)?;
        data.write_at(address, &bytes)
    }

    pub fn offset(&mut self, id: NodeId) -> Result<u64> {
        let (bound, data) = self.parts()?;
        Resolver::new(bound, data).offset(id)
    }

    pub fn size(&mut self, id: NodeId) -> Result<u64> {
        let (bound, data) = self.parts()?;
        Resolver::new(bound, data).size(id)
    }

    pub fn absolute_address(&mut self, id: NodeId) -> Result<u64> {
        let (bound, data) = self.parts()?;
        Resolver::new(bound, data).absolute_address(id)
    }

    /// The whole byte source.
    pub fn data(&mut self) -> Result<Vec<u8>> {
        self.data.read_all()
    }

    fn parts(&mut self) -> Result<(&mut Tree, &mut dyn DataProvider)> {
        if self.bound.is_none() {
            debug!("binding template against data");
            let bound = self
                .engine
                .bind(self.templates.template(), self.data.as_mut())?;
            self.bound = Some(bound);
        }
        match self.bound.as_mut() {
            Some(bound) => Ok((bound, self.data.as_mut())),
            None => unreachable!("the bound tree was just built"),
        }
    }
}
