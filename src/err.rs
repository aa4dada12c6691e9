use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "signature validation failed at address {address:#x}: expected `{expected:02x?}`, found `{found:02x?}`"
    )]
    SignatureMismatch {
        address: u64,
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    #[error("unsupported operation: {what}")]
    UnsupportedOperation { what: &'static str },

    #[error("unresolved reference `{name}`")]
    UnresolvedReference { name: String },

    #[error("invalid {attribute} value `{value}`, expected {expected}")]
    InvalidEnumValue {
        attribute: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error(
        "access of {len} byte(s) at address {address:#x} is out of bounds (data length {available})"
    )]
    OutOfBounds {
        address: u64,
        len: usize,
        available: u64,
    },

    #[error("cannot convert a {len}-byte region as a fixed-width integer (at most 8)")]
    IntegerWidth { len: usize },

    #[error("value {value} does not fit into a {len}-byte region")]
    IntegerOverflow { value: u64, len: usize },

    #[error("LEB128 value exceeds the 10-byte limit for u64")]
    Leb128TooLong,

    #[error("truncated {what}: ran out of bytes before the continuation bit cleared")]
    Truncated { what: &'static str },

    #[error("property resolution exceeded the depth limit; the layout likely contains a cycle")]
    CyclicDependency,

    #[error("an I/O error has occurred: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
