//! Byte sources a layout binds to.
//!
//! Everything the engine reads or writes goes through [`DataProvider`], so a
//! layout works the same over an in-memory buffer and over any seekable
//! stream (a file, a `Cursor`, a socket wrapper implementing `Seek`).

use std::io::{Read, Seek, SeekFrom, Write};

use crate::err::{Error, Result};

/// Random-access byte source backing a bound layout.
///
/// Methods take `&mut self` because stream-backed providers have to seek.
pub trait DataProvider {
    /// Total number of bytes available.
    fn len(&mut self) -> Result<u64>;

    fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads exactly `len` bytes starting at `address`.
    fn read_at(&mut self, address: u64, len: usize) -> Result<Vec<u8>>;

    /// Writes `bytes` starting at `address`, growing the source if it
    /// supports that.
    fn write_at(&mut self, address: u64, bytes: &[u8]) -> Result<()>;

    /// The entire byte source as one buffer.
    fn read_all(&mut self) -> Result<Vec<u8>> {
        let len = self.len()?;
        self.read_at(0, len as usize)
    }
}

/// A growable in-memory byte source. Writes past the end zero-fill the gap.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferDataProvider {
    buf: Vec<u8>,
}

impl BufferDataProvider {
    pub fn new(buf: Vec<u8>) -> Self {
        BufferDataProvider { buf }
    }

    pub fn zeroed(len: usize) -> Self {
        BufferDataProvider { buf: vec![0; len] }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl DataProvider for BufferDataProvider {
    fn len(&mut self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    fn read_at(&mut self, address: u64, len: usize) -> Result<Vec<u8>> {
        let start = address as usize;
        let end = start.checked_add(len);
        match end {
            Some(end) if end <= self.buf.len() => Ok(self.buf[start..end].to_vec()),
            _ => Err(Error::OutOfBounds {
                address,
                len,
                available: self.buf.len() as u64,
            }),
        }
    }

    fn write_at(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        let start = address as usize;
        let end = start + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// A byte source backed by any seekable stream.
pub struct IoDataProvider<T: Read + Write + Seek> {
    inner: T,
}

impl<T: Read + Write + Seek> IoDataProvider<T> {
    pub fn new(inner: T) -> Self {
        IoDataProvider { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write + Seek> DataProvider for IoDataProvider<T> {
    fn len(&mut self) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::End(0))?)
    }

    fn read_at(&mut self, address: u64, len: usize) -> Result<Vec<u8>> {
        let available = self.len()?;
        if address.checked_add(len as u64).is_none_or(|end| end > available) {
            return Err(Error::OutOfBounds {
                address,
                len,
                available,
            });
        }
        self.inner.seek(SeekFrom::Start(address))?;
        let mut buf = vec![0; len];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_at(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        self.inner.seek(SeekFrom::Start(address))?;
        self.inner.write_all(bytes)?;
        Ok(())
    }
}
