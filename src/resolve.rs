//! Property resolution: turns the declarative providers of a tree's nodes
//! into concrete offsets, sizes and counts against a bound byte source.
//!
//! A [`Resolver`] is a transient view over one tree and one data provider;
//! every query re-walks the providers involved. A depth counter bounds the
//! recursion so that reference or offset cycles surface as
//! [`Error::CyclicDependency`] instead of blowing the stack.

use log::trace;

use crate::data::DataProvider;
use crate::err::{Error, Result};
use crate::props::{Property, Sizing, ValueConverter, ValueProvider};
use crate::tree::{NodeId, Tree};

// Sibling offset chains nest one evaluation per predecessor, so this also
// bounds the number of siblings a single query can walk through.
const MAX_RESOLVE_DEPTH: usize = 1024;

/// Bytes needed to land `offset` on the next multiple of `boundary`.
/// Zero boundary means unaligned.
pub fn boundary_gap(offset: u64, boundary: u64) -> u64 {
    if boundary == 0 || offset % boundary == 0 {
        0
    } else {
        boundary - offset % boundary
    }
}

/// Rounds `value` up to the next multiple of `boundary`.
pub fn multiple_of_boundary(value: u64, boundary: u64) -> u64 {
    value + boundary_gap(value, boundary)
}

/// Evaluates node properties of one tree against one byte source.
pub struct Resolver<'a> {
    tree: &'a Tree,
    data: &'a mut dyn DataProvider,
    depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a Tree, data: &'a mut dyn DataProvider) -> Self {
        Resolver {
            tree,
            data,
            depth: 0,
        }
    }

    pub fn offset(&mut self, id: NodeId) -> Result<u64> {
        let tree = self.tree;
        self.eval(id, &tree.node(id).offset)
    }

    pub fn size(&mut self, id: NodeId) -> Result<u64> {
        let tree = self.tree;
        self.eval(id, &tree.node(id).size)
    }

    pub fn count(&mut self, id: NodeId) -> Result<u64> {
        let tree = self.tree;
        self.eval(id, &tree.node(id).count)
    }

    pub fn boundary(&mut self, id: NodeId) -> Result<u64> {
        let tree = self.tree;
        self.eval(id, &tree.node(id).boundary)
    }

    pub fn padding_before(&mut self, id: NodeId) -> Result<u64> {
        let tree = self.tree;
        self.eval(id, &tree.node(id).padding_before)
    }

    pub fn padding_after(&mut self, id: NodeId) -> Result<u64> {
        let tree = self.tree;
        self.eval(id, &tree.node(id).padding_after)
    }

    /// Evaluates `property` in the scope of node `id`.
    pub fn eval(&mut self, id: NodeId, property: &Property) -> Result<u64> {
        if self.depth >= MAX_RESOLVE_DEPTH {
            return Err(Error::CyclicDependency);
        }
        self.depth += 1;
        let value = match &property.provider {
            ValueProvider::Const(value) => Ok(*value),
            ValueProvider::Function(f) => Ok(f()),
            ValueProvider::Reference { name } => match self.tree.find_by_name(id, name) {
                Some(target) => self
                    .read(target)
                    .and_then(|bytes| property.converter.decode(&bytes)),
                None => Err(Error::UnresolvedReference { name: name.clone() }),
            },
            ValueProvider::RelativeOffset {
                ignore_boundary,
                base,
            } => self
                .relative_offset(id, *ignore_boundary)
                .map(|offset| base + offset),
            ValueProvider::AutoSize => self.auto_size(id),
            ValueProvider::StretchSize => self.stretch_size(id),
            ValueProvider::Leb128Value => self.leb128_probe(id).map(|(value, _)| value),
            ValueProvider::Leb128Size => self.leb128_probe(id).map(|(_, len)| len as u64),
        };
        self.depth -= 1;
        if let Ok(value) = value {
            trace!(
                "resolved {:?} of node {id:?} to {value}",
                property.provider
            );
        }
        value
    }

    /// The offset of `id` within its parent: padding-before, then alignment
    /// of the parent's own offset to this node's boundary, then the end of
    /// the previous sibling, itself aligned to the boundary.
    fn relative_offset(&mut self, id: NodeId, ignore_boundary: bool) -> Result<u64> {
        let mut offset = self.padding_before(id)?;
        let end_of_previous = self.end_of_previous_sibling(id)?;
        if !ignore_boundary {
            let boundary = self.boundary(id)?;
            if let Some(parent) = self.tree.parent(id) {
                offset += boundary_gap(self.offset(parent)?, boundary);
            }
            offset += boundary_gap(end_of_previous, boundary);
        }
        Ok(offset + end_of_previous)
    }

    /// Offset plus size plus padding-after of the previous sibling, or 0 for
    /// a first child.
    fn end_of_previous_sibling(&mut self, id: NodeId) -> Result<u64> {
        match self.tree.previous_sibling(id) {
            Some(prev) => {
                Ok(self.offset(prev)? + self.size(prev)? + self.padding_after(prev)?)
            }
            None => Ok(0),
        }
    }

    /// The maximum end of any child (offset + size + padding-after), rounded
    /// up to this node's boundary. A childless node auto-sizes to its
    /// boundary.
    fn auto_size(&mut self, id: NodeId) -> Result<u64> {
        let children = self.tree.children(id);
        if children.is_empty() {
            return self.boundary(id);
        }
        let boundary = self.boundary(id)?;
        let mut size = 0;
        for &child in children {
            let end =
                self.offset(child)? + self.size(child)? + self.padding_after(child)?;
            size = size.max(multiple_of_boundary(end, boundary));
        }
        Ok(size)
    }

    /// The space up to the next sibling, else to the end of a fixed-size
    /// parent, else to the parent's boundary, else to the end of the data.
    fn stretch_size(&mut self, id: NodeId) -> Result<u64> {
        if let Some(next) = self.tree.next_sibling(id) {
            let next_offset = self.offset(next)?;
            return Ok(next_offset.saturating_sub(self.offset(id)?));
        }
        let offset = self.offset(id)?;
        if let Some(parent) = self.tree.parent(id) {
            if self.tree.node(parent).sizing() != Sizing::Auto {
                return Ok(self.size(parent)?.saturating_sub(offset));
            }
            let parent_boundary = self.boundary(parent)?;
            if parent_boundary > 0 {
                return Ok(parent_boundary.saturating_sub(offset));
            }
        }
        self.data.len()
    }

    /// The absolute address of `id` in the byte source: its own offset for
    /// absolute nodes, otherwise the parent chain's address plus the offset.
    pub fn absolute_address(&mut self, id: NodeId) -> Result<u64> {
        let offset = self.offset(id)?;
        match self.tree.parent(id) {
            Some(parent) if self.tree.node(id).addressing_mode.is_relative() => {
                Ok(self.absolute_address(parent)? + offset)
            }
            _ => Ok(offset),
        }
    }

    /// The byte region of `id`.
    pub fn read(&mut self, id: NodeId) -> Result<Vec<u8>> {
        let address = self.absolute_address(id)?;
        let size = self.size(id)?;
        self.data.read_at(address, size as usize)
    }

    /// The byte region of `id`, decoded as an unsigned integer in the node's
    /// byte order.
    pub fn read_int(&mut self, id: NodeId) -> Result<u64> {
        let bytes = self.read(id)?;
        ValueConverter::Integer(self.tree.node(id).byte_order).decode(&bytes)
    }

    /// Reads a LEB128 value byte-by-byte at the node's address, returning
    /// the value and its encoded length. Running off the end of the data is
    /// a truncation, not an out-of-bounds access.
    fn leb128_probe(&mut self, id: NodeId) -> Result<(u64, usize)> {
        let address = self.absolute_address(id)?;
        let mut bytes = Vec::with_capacity(2);
        loop {
            let byte = match self.data.read_at(address + bytes.len() as u64, 1) {
                Ok(byte) => byte[0],
                Err(Error::OutOfBounds { .. }) => {
                    return Err(Error::Truncated {
                        what: "LEB128 value",
                    });
                }
                Err(e) => return Err(e),
            };
            bytes.push(byte);
            if byte & 0x80 == 0 {
                return crate::props::decode_leb128(&bytes);
            }
            if bytes.len() == 10 {
                return Err(Error::Leb128TooLong);
            }
        }
    }
}
