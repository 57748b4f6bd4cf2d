//! # Stream Reader
//!
//! Framing layer over a live transport.
//!
//! The reader pulls a VarInt frame length from the socket, checks it against the
//! configured cap, and only then reads exactly that many payload bytes. Reads
//! suspend until data arrives; a peer that disconnects surfaces as
//! [`ProtocolError::ConnectionClosed`], never as a decode error.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::varnum::{VarNum, VarNumDecoder};
use crate::error::{ProtocolError, Result};

/// Async reader yielding VarNums and length-prefixed frames.
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> StreamReader<R> {
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fill `buf` completely, suspending as needed.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner
            .read_exact(buf)
            .await
            .map(|_| ())
            .map_err(eof_as_closed)
    }

    async fn read_u8(&mut self) -> Result<u8> {
        self.inner.read_u8().await.map_err(eof_as_closed)
    }

    async fn read_varnum<T: VarNum>(&mut self) -> Result<T> {
        let mut decoder = VarNumDecoder::<T>::new();
        loop {
            if let Some(value) = decoder.push(self.read_u8().await?)? {
                return Ok(value);
            }
        }
    }

    pub async fn read_varint(&mut self) -> Result<i32> {
        self.read_varnum().await
    }

    pub async fn read_varlong(&mut self) -> Result<i64> {
        self.read_varnum().await
    }

    /// Read one frame into `buf`, replacing its contents.
    ///
    /// Returns `Ok(false)` if the peer closed the connection cleanly before the
    /// first byte of a frame. A close anywhere inside a frame is
    /// [`ProtocolError::ConnectionClosed`].
    ///
    /// # Errors
    /// Returns [`ProtocolError::OversizedFrame`] if the declared length exceeds
    /// the cap. Nothing past the length prefix has been read at that point.
    pub async fn read_frame(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        let mut first = [0u8; 1];
        if self.inner.read(&mut first).await? == 0 {
            return Ok(false);
        }

        let mut decoder = VarNumDecoder::<i32>::new();
        let mut next = first[0];
        let len = loop {
            if let Some(len) = decoder.push(next)? {
                break len;
            }
            next = self.read_u8().await?;
        };

        let len = usize::try_from(len).map_err(|_| ProtocolError::NegativeLength(len))?;
        if len > self.max_frame_size {
            return Err(ProtocolError::OversizedFrame {
                len,
                max: self.max_frame_size,
            });
        }

        buf.clear();
        buf.resize(len, 0);
        self.read_exact(buf).await?;
        Ok(true)
    }
}

fn eof_as_closed(e: std::io::Error) -> ProtocolError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(e)
    }
}
