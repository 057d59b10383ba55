//! Foreign linear memory - the byte space addresses point into
//!
//! Design: One contiguous zero-initialised block, bounds-checked on every
//! access. Shared behind a `parking_lot::RwLock` so the codec, the host and
//! the foreign functions can all reach it.

use super::Address;
use crate::codec::CodecError;
use parking_lot::RwLock;
use std::sync::Arc;

/// Memory shared between bridge collaborators
pub type SharedMemory = Arc<RwLock<LinearMemory>>;

/// Byte-addressed foreign memory
#[derive(Debug, Clone)]
pub struct LinearMemory {
    bytes: Vec<u8>,
}

impl LinearMemory {
    /// Zero-filled memory of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Wrap for sharing
    pub fn shared(size: usize) -> SharedMemory {
        Arc::new(RwLock::new(Self::new(size)))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Borrow `len` bytes at `addr`
    pub fn read(&self, addr: Address, len: usize) -> Result<&[u8], CodecError> {
        let end = self.checked_end(addr, len)?;
        Ok(&self.bytes[addr..end])
    }

    /// Copy `data` to `addr`
    pub fn write(&mut self, addr: Address, data: &[u8]) -> Result<(), CodecError> {
        let end = self.checked_end(addr, data.len())?;
        self.bytes[addr..end].copy_from_slice(data);
        Ok(())
    }

    /// Bytes from `addr` up to (not including) the first NUL
    pub fn read_c_string(&self, addr: Address) -> Result<&[u8], CodecError> {
        let tail = self.bytes.get(addr..).ok_or(CodecError::OutOfBounds {
            addr,
            len: 1,
            size: self.size(),
        })?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::Unterminated { addr })?;
        Ok(&tail[..len])
    }

    fn checked_end(&self, addr: Address, len: usize) -> Result<usize, CodecError> {
        addr.checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::OutOfBounds {
                addr,
                len,
                size: self.size(),
            })
    }
}
