//! Layout attributes: closed choice enums, value converters and value
//! providers, and the `Property` that pairs a provider with a converter.
//!
//! Every layout attribute of a node (offset, size, boundary, paddings,
//! repetition count) is a [`Property`]. Reads go through
//! converter-over-provider; writes are only accepted by providers that store
//! a value, everything computed rejects them with an unsupported-operation
//! error.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

use crate::err::{Error, Result};

/// Whether a node's offset is an absolute address or relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressingMode {
    Absolute,
    #[default]
    Relative,
}

impl AddressingMode {
    pub fn is_relative(&self) -> bool {
        *self == AddressingMode::Relative
    }
}

impl FromStr for AddressingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "absolute" => Ok(AddressingMode::Absolute),
            "relative" => Ok(AddressingMode::Relative),
            other => Err(Error::InvalidEnumValue {
                attribute: "addressing-mode",
                value: other.to_owned(),
                expected: "`absolute` or `relative`",
            }),
        }
    }
}

/// How a node's size is determined: a fixed value, derived from its
/// children, or stretched into the remaining space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sizing {
    Fix,
    #[default]
    Auto,
    Stretch,
}

impl FromStr for Sizing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fix" => Ok(Sizing::Fix),
            "auto" => Ok(Sizing::Auto),
            "stretch" => Ok(Sizing::Stretch),
            other => Err(Error::InvalidEnumValue {
                attribute: "sizing",
                value: other.to_owned(),
                expected: "`fix`, `auto` or `stretch`",
            }),
        }
    }
}

/// Endianness of the byte region a node is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "little" => Ok(ByteOrder::LittleEndian),
            "big" => Ok(ByteOrder::BigEndian),
            other => Err(Error::InvalidEnumValue {
                attribute: "byte-order",
                value: other.to_owned(),
                expected: "`little` or `big`",
            }),
        }
    }
}

/// Interprets a raw byte region as a typed (numeric) value and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueConverter {
    /// No interpretation. Used for properties whose provider already yields
    /// a number; decoding bytes through it is rejected.
    #[default]
    Identity,
    /// Fixed-width unsigned integer of the region's length (up to 8 bytes).
    Integer(ByteOrder),
    /// Unsigned LEB128.
    Leb128,
}

impl ValueConverter {
    pub fn decode(&self, bytes: &[u8]) -> Result<u64> {
        match self {
            ValueConverter::Identity => Err(Error::UnsupportedOperation {
                what: "decoding bytes through the identity converter",
            }),
            ValueConverter::Integer(order) => {
                if bytes.is_empty() {
                    return Ok(0);
                }
                if bytes.len() > 8 {
                    return Err(Error::IntegerWidth { len: bytes.len() });
                }
                Ok(match order {
                    ByteOrder::LittleEndian => LittleEndian::read_uint(bytes, bytes.len()),
                    ByteOrder::BigEndian => BigEndian::read_uint(bytes, bytes.len()),
                })
            }
            ValueConverter::Leb128 => {
                let (value, _) = decode_leb128(bytes)?;
                Ok(value)
            }
        }
    }

    pub fn encode(&self, value: u64, len: usize) -> Result<Vec<u8>> {
        match self {
            ValueConverter::Identity => Err(Error::UnsupportedOperation {
                what: "encoding a value through the identity converter",
            }),
            ValueConverter::Integer(order) => {
                if len > 8 {
                    return Err(Error::IntegerWidth { len });
                }
                if len < 8 && value >> (8 * len as u32) != 0 {
                    return Err(Error::IntegerOverflow { value, len });
                }
                let mut buf = vec![0_u8; len];
                match order {
                    ByteOrder::LittleEndian => LittleEndian::write_uint(&mut buf, value, len),
                    ByteOrder::BigEndian => BigEndian::write_uint(&mut buf, value, len),
                }
                Ok(buf)
            }
            ValueConverter::Leb128 => Ok(encode_leb128(value)),
        }
    }
}

/// Decodes an unsigned LEB128 value from the start of `bytes`, returning the
/// value and the number of bytes consumed.
pub fn decode_leb128(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0_u64;
    let mut shift = 0_u32;
    for (i, &byte) in bytes.iter().enumerate() {
        if i == 10 {
            return Err(Error::Leb128TooLong);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(Error::Truncated {
        what: "LEB128 value",
    })
}

/// Encodes `value` as unsigned LEB128.
pub fn encode_leb128(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(2);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}

/// Strategy for computing or storing a property's raw numeric value.
///
/// Computed variants are resolved by [`crate::resolve::Resolver`] against the
/// owning tree and its bound byte source.
#[derive(Clone)]
pub enum ValueProvider {
    /// A stored literal.
    Const(u64),
    /// Computed by an external zero-argument function. Read-only.
    Function(Rc<dyn Fn() -> u64>),
    /// The byte value of another node, looked up by name within the nearest
    /// enclosing scope, decoded through this property's converter.
    Reference { name: String },
    /// The offset algorithm (padding, previous sibling, boundary alignment),
    /// plus a frozen base literal.
    RelativeOffset { ignore_boundary: bool, base: u64 },
    /// Maximum rounded end of the node's children, or its boundary when it
    /// has none. Read-only.
    AutoSize,
    /// The remaining space up to the next sibling, the end of the parent, or
    /// the end of the byte source. Read-only.
    StretchSize,
    /// An unsigned LEB128 read from the byte source at the node's address;
    /// yields the decoded value. Read-only.
    Leb128Value,
    /// Like [`ValueProvider::Leb128Value`], but yields the number of bytes
    /// the value occupies. Read-only.
    Leb128Size,
}

impl ValueProvider {
    /// Message used when a write is rejected.
    fn write_rejection(&self) -> &'static str {
        match self {
            ValueProvider::Const(_) | ValueProvider::RelativeOffset { .. } => {
                unreachable!("writable providers never reject")
            }
            ValueProvider::Function(_) => "writing to a function-computed property",
            ValueProvider::Reference { .. } => "writing through a reference property",
            ValueProvider::AutoSize => "writing to an auto-sized property",
            ValueProvider::StretchSize => "writing to a stretch-sized property",
            ValueProvider::Leb128Value | ValueProvider::Leb128Size => {
                "writing to a LEB128-bound property"
            }
        }
    }
}

impl fmt::Debug for ValueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueProvider::Const(v) => f.debug_tuple("Const").field(v).finish(),
            ValueProvider::Function(_) => f.write_str("Function(..)"),
            ValueProvider::Reference { name } => {
                f.debug_struct("Reference").field("name", name).finish()
            }
            ValueProvider::RelativeOffset {
                ignore_boundary,
                base,
            } => f
                .debug_struct("RelativeOffset")
                .field("ignore_boundary", ignore_boundary)
                .field("base", base)
                .finish(),
            ValueProvider::AutoSize => f.write_str("AutoSize"),
            ValueProvider::StretchSize => f.write_str("StretchSize"),
            ValueProvider::Leb128Value => f.write_str("Leb128Value"),
            ValueProvider::Leb128Size => f.write_str("Leb128Size"),
        }
    }
}

/// A layout attribute: a value provider paired with a value converter.
#[derive(Debug, Clone)]
pub struct Property {
    pub provider: ValueProvider,
    pub converter: ValueConverter,
}

impl Property {
    pub fn constant(value: u64) -> Self {
        Property {
            provider: ValueProvider::Const(value),
            converter: ValueConverter::Identity,
        }
    }

    pub fn function(f: impl Fn() -> u64 + 'static) -> Self {
        Property {
            provider: ValueProvider::Function(Rc::new(f)),
            converter: ValueConverter::Identity,
        }
    }

    /// A cross-node reference decoded as a little-endian integer.
    pub fn reference(name: impl Into<String>) -> Self {
        Property::reference_with(name, ByteOrder::LittleEndian)
    }

    pub fn reference_with(name: impl Into<String>, order: ByteOrder) -> Self {
        Property {
            provider: ValueProvider::Reference { name: name.into() },
            converter: ValueConverter::Integer(order),
        }
    }

    pub fn relative_offset() -> Self {
        Property {
            provider: ValueProvider::RelativeOffset {
                ignore_boundary: false,
                base: 0,
            },
            converter: ValueConverter::Identity,
        }
    }

    pub fn relative_offset_ignoring_boundary(base: u64) -> Self {
        Property {
            provider: ValueProvider::RelativeOffset {
                ignore_boundary: true,
                base,
            },
            converter: ValueConverter::Identity,
        }
    }

    pub fn auto_size() -> Self {
        Property {
            provider: ValueProvider::AutoSize,
            converter: ValueConverter::Identity,
        }
    }

    pub fn stretch_size() -> Self {
        Property {
            provider: ValueProvider::StretchSize,
            converter: ValueConverter::Identity,
        }
    }

    pub fn leb128_value() -> Self {
        Property {
            provider: ValueProvider::Leb128Value,
            converter: ValueConverter::Leb128,
        }
    }

    pub fn leb128_size() -> Self {
        Property {
            provider: ValueProvider::Leb128Size,
            converter: ValueConverter::Leb128,
        }
    }

    /// Stores `value` into the provider. Computed providers reject the
    /// write; a relative offset freezes the value as its base literal.
    pub fn set(&mut self, value: u64) -> Result<()> {
        match &mut self.provider {
            ValueProvider::Const(v) => {
                *v = value;
                Ok(())
            }
            ValueProvider::RelativeOffset { base, .. } => {
                *base = value;
                Ok(())
            }
            other => Err(Error::UnsupportedOperation {
                what: other.write_rejection(),
            }),
        }
    }
}
