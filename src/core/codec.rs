//! Tokio codec for VarInt length-prefixed frames.
//!
//! Wire format: `[VarInt length] [payload(length)]`, where the payload starts
//! with the packet ID. Used with `tokio_util::codec::Framed` by the client
//! connector and by embedders that prefer a `Stream`/`Sink` interface.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_FRAME_SIZE;
use crate::core::varnum::{self, peek_varnum, varint_len};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame {
                len,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some((len, header)) = peek_varnum::<i32>(&src[..])? else {
            return Ok(None);
        };
        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
        self.check_len(len)?;

        if src.len() < header + len {
            src.reserve(header + len - src.len());
            return Ok(None);
        }

        src.advance(header);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.check_len(payload.len())?;
        let len = payload.len() as i32;
        dst.reserve(varint_len(len) + payload.len());
        varnum::write_varint(dst, len);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}
