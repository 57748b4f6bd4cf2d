//! # Variable-Length Integers
//!
//! VarInt and VarLong encoding shared by every layer of the protocol.
//!
//! Each byte carries 7 payload bits, least significant group first, and uses
//! the high bit to signal that another byte follows. A VarInt spans at most 5
//! bytes and a VarLong at most 10. The accumulated bits are truncated to the
//! target width and reinterpreted as two's complement, so `-1` is encoded as
//! `ff ff ff ff 0f`.
//!
//! Decoding is driven byte by byte through [`VarNumDecoder`], which lets the
//! in-memory [`PacketReader`](crate::core::buffer::PacketReader) and the
//! socket-backed [`StreamReader`](crate::core::stream::StreamReader) share one
//! implementation.

use bytes::BufMut;

use crate::error::{ProtocolError, Result};

/// Segment bits mask (lower 7 bits).
pub const SEGMENT_BITS: u8 = 0x7F;

/// Continue bit (high bit).
pub const CONTINUE_BIT: u8 = 0x80;

/// Maximum encoded size of a VarInt.
pub const VARINT_MAX_BYTES: usize = 5;

/// Maximum encoded size of a VarLong.
pub const VARLONG_MAX_BYTES: usize = 10;

/// A signed integer type with a variable-length wire encoding.
pub trait VarNum: Copy + Sized {
    /// Maximum number of 7-bit groups the encoding may use.
    const MAX_BYTES: usize;

    /// Reinterpret accumulated groups as a two's-complement value of this width.
    fn from_bits(bits: u64) -> Self;

    /// The value's bit pattern, zero-extended to 64 bits.
    fn to_bits(self) -> u64;
}

impl VarNum for i32 {
    const MAX_BYTES: usize = VARINT_MAX_BYTES;

    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn from_bits(bits: u64) -> Self {
        bits as u32 as i32
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn to_bits(self) -> u64 {
        u64::from(self as u32)
    }
}

impl VarNum for i64 {
    const MAX_BYTES: usize = VARLONG_MAX_BYTES;

    #[inline]
    #[allow(clippy::cast_possible_wrap)]
    fn from_bits(bits: u64) -> Self {
        bits as i64
    }

    #[inline]
    #[allow(clippy::cast_sign_loss)]
    fn to_bits(self) -> u64 {
        self as u64
    }
}

/// Incremental decoder fed one byte at a time.
#[derive(Debug, Clone)]
pub struct VarNumDecoder<T: VarNum> {
    total: u64,
    consumed: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T: VarNum> Default for VarNumDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: VarNum> VarNumDecoder<T> {
    pub fn new() -> Self {
        Self {
            total: 0,
            consumed: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Feed the next byte. Returns `Some(value)` once the terminating byte arrives.
    ///
    /// # Errors
    /// Returns [`ProtocolError::VarNumTooLong`] if the final permitted byte still
    /// has its continuation bit set.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<Option<T>> {
        // VarLong's tenth group only contributes its lowest bit.
        let shift = 7 * self.consumed as u32;
        self.total |= u64::from(byte & SEGMENT_BITS) << shift;
        self.consumed += 1;

        if byte & CONTINUE_BIT == 0 {
            return Ok(Some(T::from_bits(self.total)));
        }
        if self.consumed >= T::MAX_BYTES {
            return Err(ProtocolError::VarNumTooLong {
                max_bytes: T::MAX_BYTES,
            });
        }
        Ok(None)
    }
}

/// Decode a VarNum from the front of `bytes`, returning the value and its encoded length.
///
/// Returns `Ok(None)` when `bytes` ends before the number does.
pub fn peek_varnum<T: VarNum>(bytes: &[u8]) -> Result<Option<(T, usize)>> {
    let mut decoder = VarNumDecoder::<T>::new();
    for &byte in bytes {
        if let Some(value) = decoder.push(byte)? {
            return Ok(Some((value, decoder.consumed())));
        }
    }
    Ok(None)
}

/// Append the encoding of `value` to `buf`, returning the number of bytes written.
#[inline]
pub fn write_varnum<T: VarNum>(buf: &mut impl BufMut, value: T) -> usize {
    let mut bits = value.to_bits();
    let mut written = 0;

    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut byte = (bits & u64::from(SEGMENT_BITS)) as u8;
        bits >>= 7;

        if bits != 0 {
            byte |= CONTINUE_BIT;
        }

        buf.put_u8(byte);
        written += 1;

        if bits == 0 {
            return written;
        }
    }
}

/// Write a VarInt to a buffer.
pub fn write_varint(buf: &mut impl BufMut, value: i32) -> usize {
    write_varnum(buf, value)
}

/// Write a VarLong to a buffer.
pub fn write_varlong(buf: &mut impl BufMut, value: i64) -> usize {
    write_varnum(buf, value)
}

/// Number of bytes needed to encode `value` as a VarInt.
#[must_use]
pub fn varint_len(value: i32) -> usize {
    encoded_len(value.to_bits())
}

/// Number of bytes needed to encode `value` as a VarLong.
#[must_use]
pub fn varlong_len(value: i64) -> usize {
    encoded_len(value.to_bits())
}

const fn encoded_len(bits: u64) -> usize {
    if bits == 0 {
        return 1;
    }
    let bits_needed = 64 - bits.leading_zeros();
    (bits_needed as usize).div_ceil(7)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: VarNum>(bytes: &[u8]) -> Result<Option<(T, usize)>> {
        peek_varnum::<T>(bytes)
    }

    #[test]
    fn test_known_varints() {
        // Vectors from the protocol documentation
        let cases: [(i32, &[u8]); 10] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (255, &[0xff, 0x01]),
            (25565, &[0xdd, 0xc7, 0x01]),
            (2_097_151, &[0xff, 0xff, 0x7f]),
            (i32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x07]),
            (-1, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
            (i32::MIN, &[0x80, 0x80, 0x80, 0x80, 0x08]),
        ];

        for (value, bytes) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(buf, bytes, "encode {value}");
            assert_eq!(
                decode::<i32>(bytes).unwrap(),
                Some((value, bytes.len())),
                "decode {value}"
            );
        }
    }

    #[test]
    fn test_known_varlongs() {
        let cases: [(i64, &[u8]); 5] = [
            (0, &[0x00]),
            (2_147_483_648, &[0x80, 0x80, 0x80, 0x80, 0x08]),
            (i64::MAX, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]),
            (
                -1,
                &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
            ),
            (
                i64::MIN,
                &[0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01],
            ),
        ];

        for (value, bytes) in cases {
            let mut buf = Vec::new();
            write_varlong(&mut buf, value);
            assert_eq!(buf, bytes, "encode {value}");
            assert_eq!(decode::<i64>(bytes).unwrap(), Some((value, bytes.len())));
        }
    }

    #[test]
    fn test_varint_too_long() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let err = decode::<i32>(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::VarNumTooLong { max_bytes: 5 }));
    }

    #[test]
    fn test_varlong_too_long() {
        let bytes = [0xff; 11];
        let err = decode::<i64>(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::VarNumTooLong { max_bytes: 10 }));
    }

    #[test]
    fn test_incomplete() {
        assert_eq!(decode::<i32>(&[]).unwrap(), None);
        assert_eq!(decode::<i32>(&[0x80, 0x80]).unwrap(), None);
    }

    #[test]
    fn test_decoder_stops_at_terminator() {
        // Trailing bytes belong to the next field
        assert_eq!(decode::<i32>(&[0x05, 0xff, 0xff]).unwrap(), Some((5, 1)));
    }

    #[test]
    fn test_lengths() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16_384), 3);
        assert_eq!(varint_len(268_435_456), 5);
        assert_eq!(varint_len(-1), 5);
        assert_eq!(varlong_len(i64::from(i32::MAX) + 1), 5);
        assert_eq!(varlong_len(i64::MAX), 9);
        assert_eq!(varlong_len(-1), 10);
    }
}
