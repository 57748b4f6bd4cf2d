//! Client-side connector speaking the same framing as the server.

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::instrument;

use crate::core::codec::FrameCodec;
use crate::error::Result;
use crate::protocol::packet::{encode_payload, Encode, Packet};

/// Open a TCP connection framed with [`FrameCodec`].
#[instrument(skip(addr))]
pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Framed<TcpStream, FrameCodec>> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(Framed::new(stream, FrameCodec::default()))
}

/// Encode `packet` (ID + body) and send it as one frame.
pub async fn send_packet<P>(framed: &mut Framed<TcpStream, FrameCodec>, packet: &P) -> Result<()>
where
    P: Packet + Encode,
{
    let payload: Bytes = encode_payload(packet);
    framed.send(payload).await
}
