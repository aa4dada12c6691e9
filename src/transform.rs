//! Carrying byte values from one bound layout to another.
//!
//! Leaves are matched by name across the two layouts, so a destination
//! template with reordered, added or removed regions still receives every
//! value the source has a region for. [`project`] transfers only the
//! matching leaves; [`transform`] additionally fills destination-only leaves
//! from an explicit map or with zeros, producing a fully initialized
//! destination.

use hashbrown::HashMap;

use crate::context::BindingContext;
use crate::err::{Error, Result};
use crate::props::Sizing;
use crate::tree::NodeId;

/// Truncates or zero-extends `bytes` to exactly `size`.
pub fn fit(mut bytes: Vec<u8>, size: usize) -> Vec<u8> {
    bytes.resize(size, 0);
    bytes
}

/// Copies every named destination leaf from the source leaf of the same
/// name. Destination leaves with no source counterpart are left untouched.
pub fn project(source: &mut BindingContext, destination: &mut BindingContext) -> Result<()> {
    for (name, id) in named_leaves(destination)? {
        match source.find(&name) {
            Ok(source_id) => {
                let bytes = source.read(source_id)?;
                write_fitted(destination, id, bytes)?;
            }
            Err(Error::UnresolvedReference { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Like [`project`], but destination leaves with no source counterpart are
/// taken from `additional` by name, or zero-filled.
pub fn transform(
    source: &mut BindingContext,
    destination: &mut BindingContext,
    additional: &HashMap<String, Vec<u8>>,
) -> Result<()> {
    for (name, id) in named_leaves(destination)? {
        let bytes = match source.find(&name) {
            Ok(source_id) => Some(source.read(source_id)?),
            Err(Error::UnresolvedReference { .. }) => additional.get(&name).cloned(),
            Err(e) => return Err(e),
        };
        match bytes {
            Some(bytes) => write_fitted(destination, id, bytes)?,
            None => {
                let size = destination.size(id)?;
                destination.write(id, &vec![0; size as usize])?;
            }
        }
    }
    Ok(())
}

fn named_leaves(context: &mut BindingContext) -> Result<Vec<(String, NodeId)>> {
    let bound = context.template()?;
    Ok(bound
        .leaves()
        .filter_map(|id| bound.node(id).name.clone().map(|name| (name, id)))
        .collect())
}

/// Fixed-size destinations take exactly their size; auto-sized ones grow or
/// shrink to the written value.
fn write_fitted(destination: &mut BindingContext, id: NodeId, bytes: Vec<u8>) -> Result<()> {
    let sizing = destination.template()?.node(id).sizing();
    let bytes = if sizing == Sizing::Auto {
        bytes
    } else {
        let size = destination.size(id)?;
        fit(bytes, size as usize)
    };
    destination.write(id, &bytes)
}
