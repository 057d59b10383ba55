//! Text and byte transfer into foreign memory
//!
//! The bridge only coordinates encoding; the codec owns the byte layout.
//! `Utf8Codec` writes NUL-terminated UTF-8 into `LinearMemory`.

use crate::allocator::{Address, SharedMemory};
use core::fmt;

/// Codec consumed by the marshaller and return converter
pub trait TextCodec: Send + Sync {
    /// Encode `text` at `addr`, writing at most `max_bytes` including the
    /// terminator. Returns the number of text bytes written.
    fn encode_utf8(&self, text: &str, addr: Address, max_bytes: usize) -> Result<usize, CodecError>;

    /// Decode NUL-terminated UTF-8 at `addr`
    fn decode_utf8(&self, addr: Address) -> Result<String, CodecError>;

    /// Copy raw bytes to `addr`
    fn write_array(&self, bytes: &[u8], addr: Address) -> Result<(), CodecError>;
}

/// UTF-8 codec over shared linear memory
#[derive(Clone)]
pub struct Utf8Codec {
    memory: SharedMemory,
}

impl Utf8Codec {
    pub fn new(memory: SharedMemory) -> Self {
        Self { memory }
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }
}

impl TextCodec for Utf8Codec {
    fn encode_utf8(&self, text: &str, addr: Address, max_bytes: usize) -> Result<usize, CodecError> {
        if max_bytes == 0 {
            return Ok(0);
        }

        let fitted = truncate_to_boundary(text, max_bytes - 1);
        let mut memory = self.memory.write();
        memory.write(addr, fitted.as_bytes())?;
        memory.write(addr + fitted.len(), &[0])?;
        Ok(fitted.len())
    }

    fn decode_utf8(&self, addr: Address) -> Result<String, CodecError> {
        if addr == 0 {
            return Ok(String::new());
        }

        let memory = self.memory.read();
        let bytes = memory.read_c_string(addr)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn write_array(&self, bytes: &[u8], addr: Address) -> Result<(), CodecError> {
        self.memory.write().write(addr, bytes)
    }
}

impl fmt::Debug for Utf8Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Utf8Codec {{ size: {} }}", self.memory.read().size())
    }
}

/// Longest prefix of `text` that fits in `limit` bytes without splitting a character
fn truncate_to_boundary(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    OutOfBounds { addr: Address, len: usize, size: usize },
    Unterminated { addr: Address },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { addr, len, size } => write!(
                f,
                "Access of {} bytes at {:#x} exceeds memory of {} bytes",
                len, addr, size
            ),
            Self::Unterminated { addr } => {
                write!(f, "String at {:#x} has no terminator", addr)
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::LinearMemory;

    fn codec() -> Utf8Codec {
        Utf8Codec::new(LinearMemory::shared(256))
    }

    #[test]
    fn encode_writes_terminator() {
        let codec = codec();
        let written = codec.encode_utf8("hi", 16, 9).unwrap();
        assert_eq!(written, 2);
        assert_eq!(codec.memory().read().read(16, 3).unwrap(), b"hi\0");
    }

    #[test]
    fn encode_decode_multibyte() {
        let codec = codec();
        let text = "größe → 東京 🦀";
        codec.encode_utf8(text, 32, text.chars().count() * 4 + 1).unwrap();
        assert_eq!(codec.decode_utf8(32).unwrap(), text);
    }

    #[test]
    fn encode_truncates_on_char_boundary() {
        let codec = codec();
        // "é" is two bytes; only one fits before the terminator
        let written = codec.encode_utf8("é", 8, 2).unwrap();
        assert_eq!(written, 0);
        assert_eq!(codec.decode_utf8(8).unwrap(), "");
    }

    #[test]
    fn decode_null_address_is_empty() {
        assert_eq!(codec().decode_utf8(0).unwrap(), "");
    }

    #[test]
    fn decode_replaces_invalid_utf8() {
        let codec = codec();
        codec.write_array(&[0x61, 0xff, 0x62, 0x00], 40).unwrap();
        assert_eq!(codec.decode_utf8(40).unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn write_array_out_of_bounds() {
        let codec = codec();
        assert!(matches!(
            codec.write_array(&[1, 2, 3], 255),
            Err(CodecError::OutOfBounds { addr: 255, len: 3, size: 256 })
        ));
    }
}
