//! A declarative binary-layout engine.
//!
//! A layout is a tree of named byte regions. Offsets, sizes, alignment
//! boundaries, paddings and repetition counts are properties that either
//! hold a literal or compute themselves from siblings, parents, other
//! regions or the bound bytes. Binding a template against a byte source
//! produces a second tree in which repeated regions are expanded, absent
//! regions are pruned and declared signatures are checked, and through
//! which the underlying bytes can be read and written by region name.
//!
//! ```
//! use binlayout::{BindingContext, BufferDataProvider, Node, Tree};
//!
//! let mut template = Tree::new(Node::named("root").with_size(5));
//! template.add_child(template.root(), Node::named("header").with_size(2));
//! template.add_child(template.root(), Node::named("payload").stretched());
//!
//! let data = BufferDataProvider::new(vec![0x01, 0x00, 0xaa, 0xbb, 0xcc]);
//! let mut context = BindingContext::with_template_and_data(template, data);
//!
//! let payload = context.find("payload")?;
//! assert_eq!(context.read(payload)?, vec![0xaa, 0xbb, 0xcc]);
//! # Ok::<(), binlayout::Error>(())
//! ```

pub mod context;
pub mod data;
pub mod engine;
pub mod err;
pub mod factory;
pub mod props;
pub mod resolve;
pub mod transform;
pub mod tree;

pub use crate::context::{BindingContext, StaticTemplateProvider, TemplateProvider};
pub use crate::data::{BufferDataProvider, DataProvider, IoDataProvider};
pub use crate::engine::BindingEngine;
pub use crate::err::{Error, Result};
pub use crate::factory::TemplateFactory;
pub use crate::props::{
    AddressingMode, ByteOrder, Property, Sizing, ValueConverter, ValueProvider,
};
pub use crate::resolve::{boundary_gap, multiple_of_boundary, Resolver};
pub use crate::transform::{fit, project, transform};
pub use crate::tree::{Node, NodeId, Tree};

#[cfg(test)]
mod tests;

#[cfg(test)]
pub(crate) fn ensure_env_logger_initialized() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(env_logger::init);
}
