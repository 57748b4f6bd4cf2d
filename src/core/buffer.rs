//! # Buffered Packet Reader
//!
//! Cursor types over a single, fully received frame payload.
//!
//! [`PacketReader`] never suspends: every field is decoded from bytes that are
//! already in memory, and reading past the end of the payload is a hard
//! [`ProtocolError::UnexpectedEnd`] rather than a partial result.
//! [`PacketWriter`] is its counterpart for building payloads.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::varnum::{self, VarNum, VarNumDecoder};
use crate::error::{ProtocolError, Result};

/// Non-suspending reader over one frame payload.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Point the reader at a new payload, rewinding the cursor.
    pub fn reset(&mut self, data: &'a [u8]) {
        self.data = data;
        self.pos = 0;
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current offset into the payload.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ProtocolError::UnexpectedEnd {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }

    /// Read a big-endian unsigned short.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_varnum<T: VarNum>(&mut self) -> Result<T> {
        let mut decoder = VarNumDecoder::<T>::new();
        loop {
            if let Some(value) = decoder.push(self.read_u8()?)? {
                return Ok(value);
            }
        }
    }

    pub fn read_varint(&mut self) -> Result<i32> {
        self.read_varnum()
    }

    pub fn read_varlong(&mut self) -> Result<i64> {
        self.read_varnum()
    }

    /// Read a VarInt length prefix followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
        let bytes = self.read_exact(len)?;
        std::str::from_utf8(bytes).map_err(ProtocolError::InvalidUtf8)
    }

    /// Like [`read_string`](Self::read_string), limited to `max_chars` characters.
    ///
    /// The byte length is checked against `max_chars * 4` before the string
    /// bytes are read, then the decoded character count is checked exactly.
    /// On any error the cursor is left where it was before the call.
    pub fn read_string_bounded(&mut self, max_chars: usize) -> Result<&'a str> {
        let start = self.pos;
        let result = self.read_string_within(max_chars);
        if result.is_err() {
            self.pos = start;
        }
        result
    }

    fn read_string_within(&mut self, max_chars: usize) -> Result<&'a str> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;

        let max_bytes = max_chars.saturating_mul(4);
        if len > max_bytes {
            return Err(ProtocolError::StringTooLong {
                len,
                max: max_bytes,
            });
        }

        let bytes = self.read_exact(len)?;
        let s = std::str::from_utf8(bytes).map_err(ProtocolError::InvalidUtf8)?;
        let chars = s.chars().count();
        if chars > max_chars {
            return Err(ProtocolError::StringTooLong {
                len: chars,
                max: max_chars,
            });
        }
        Ok(s)
    }
}

/// Growable payload builder using the same field encodings as [`PacketReader`].
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buf.put_u16(value);
        self
    }

    pub fn write_varint(&mut self, value: i32) -> &mut Self {
        varnum::write_varint(&mut self.buf, value);
        self
    }

    pub fn write_varlong(&mut self, value: i64) -> &mut Self {
        varnum::write_varlong(&mut self.buf, value);
        self
    }

    /// Write a VarInt byte length followed by the UTF-8 bytes.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        varnum::write_varint(&mut self.buf, value.len() as i32);
        self.buf.put_slice(value.as_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}
