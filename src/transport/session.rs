//! # Session
//!
//! One accepted connection: read a frame, dispatch it, repeat.
//!
//! A session owns its transport, its phase and its frame buffers; nothing is
//! shared with other sessions except the immutable handler table. Replies a
//! handler queued are written as frames before the next frame is read. Any
//! error ends the session and the transport is shut down on every exit path.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::codec::Encoder;
use tracing::{debug, trace};

use crate::config::ServerSettings;
use crate::core::codec::FrameCodec;
use crate::core::stream::StreamReader;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{Dispatcher, HandlerRegistry};
use crate::protocol::outbox::Outbox;
use crate::utils::metrics::global_metrics;

/// Initial capacity of the per-session frame buffer.
const FRAME_BUFFER_CAPACITY: usize = 512;

/// Per-session limits taken from the server configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_frame_size: usize,
    pub idle_timeout: Duration,
}

impl From<&ServerSettings> for SessionLimits {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            max_frame_size: settings.transport.max_frame_size,
            idle_timeout: settings.server.idle_timeout,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

/// Server-side state for one connection.
pub struct Session<S> {
    reader: StreamReader<BufReader<S>>,
    dispatcher: Dispatcher,
    frame: Vec<u8>,
    outbox: Outbox,
    codec: FrameCodec,
    pending: BytesMut,
    idle_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn new(stream: S, registry: Arc<HandlerRegistry>, limits: SessionLimits) -> Self {
        Self {
            reader: StreamReader::new(BufReader::new(stream), limits.max_frame_size),
            dispatcher: Dispatcher::new(registry),
            frame: Vec::with_capacity(FRAME_BUFFER_CAPACITY),
            outbox: Outbox::new(),
            codec: FrameCodec::new(limits.max_frame_size),
            pending: BytesMut::new(),
            idle_timeout: limits.idle_timeout,
        }
    }

    /// Drive the session until the peer disconnects or an error occurs.
    ///
    /// Returns `Ok(())` when the peer closes the connection between frames.
    /// The transport is shut down before returning in every case.
    pub async fn run(mut self) -> Result<()> {
        let outcome = self.serve().await;

        if let Err(e) = self.reader.get_mut().shutdown().await {
            trace!(error = %e, "Transport shutdown failed");
        }
        debug!(phase = %self.dispatcher.phase(), "Session closed");
        outcome
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            let read = tokio::time::timeout(self.idle_timeout, self.reader.read_frame(&mut self.frame));
            let received = match read.await {
                Ok(received) => received?,
                Err(_) => return Err(ProtocolError::ConnectionTimeout),
            };
            if !received {
                debug!("Peer closed connection");
                return Ok(());
            }

            global_metrics().frame_received(self.frame.len() as u64);
            let id = self.dispatcher.dispatch(&self.frame, &mut self.outbox)?;
            trace!(id, len = self.frame.len(), phase = %self.dispatcher.phase(), "Frame dispatched");
            self.flush_outbox().await?;
        }
    }

    /// Frame and write every queued reply, then flush the transport.
    ///
    /// # Errors
    /// Returns [`ProtocolError::OversizedFrame`] if a reply exceeds the frame
    /// cap; nothing is written in that case.
    async fn flush_outbox(&mut self) -> Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }

        self.pending.clear();
        for payload in self.outbox.drain() {
            self.codec.encode(payload, &mut self.pending)?;
        }

        let stream = self.reader.get_mut();
        stream.write_all(&self.pending).await?;
        stream.flush().await?;
        trace!(len = self.pending.len(), "Replies written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::{PacketReader, PacketWriter};
    use crate::protocol::handshake::{HandshakePacket, NextState};
    use crate::protocol::packet::{encode_payload, Encode, Packet};
    use crate::protocol::phase::ProtocolPhase;
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    const STATUS_JSON: &str = r#"{"version":{"name":"1.8.9","protocol":47}}"#;

    struct StatusResponse {
        json: String,
    }

    impl Packet for StatusResponse {
        const ID: i32 = 0x00;
        const PHASE: ProtocolPhase = ProtocolPhase::Status;
    }

    impl Encode for StatusResponse {
        fn encode(&self, writer: &mut PacketWriter) {
            writer.write_string(&self.json);
        }
    }

    fn status_registry() -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::with_defaults();
        registry.register(ProtocolPhase::Status, 0x00, |_, outbox| {
            outbox.send(&StatusResponse {
                json: STATUS_JSON.to_string(),
            });
            Ok(None)
        });
        registry.register(ProtocolPhase::Status, 0x01, |_, outbox| {
            outbox.send_raw(Bytes::from(vec![0x01; 64]));
            Ok(None)
        });
        Arc::new(registry)
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_varint(payload.len() as i32).write_bytes(payload);
        writer.into_bytes().to_vec()
    }

    fn handshake_frame(next_state: NextState) -> Vec<u8> {
        frame(&encode_payload(&HandshakePacket {
            protocol_version: 47,
            server_address: "localhost".to_string(),
            server_port: 25565,
            next_state,
        }))
    }

    fn session(stream: tokio::io::DuplexStream, limits: SessionLimits) -> Session<tokio::io::DuplexStream> {
        Session::new(stream, Arc::new(HandlerRegistry::with_defaults()), limits)
    }

    #[tokio::test]
    async fn test_handshake_then_clean_close() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session(server, SessionLimits::default()).run());

        client.write_all(&handshake_frame(NextState::Login)).await.unwrap();
        client.shutdown().await.unwrap();

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_packet_closes_transport() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session(server, SessionLimits::default()).run());

        client.write_all(&handshake_frame(NextState::Status)).await.unwrap();
        client.write_all(&frame(&[0x05])).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnknownPacket {
                phase: ProtocolPhase::Status,
                id: 0x05
            }
        ));

        // Server side is gone: reads see EOF
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_frame() {
        let (mut client, server) = tokio::io::duplex(1024);
        let limits = SessionLimits {
            max_frame_size: 8,
            ..SessionLimits::default()
        };
        let task = tokio::spawn(session(server, limits).run());

        client.write_all(&[0x40]).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ProtocolError::OversizedFrame { len: 64, max: 8 }));
    }

    #[tokio::test]
    async fn test_eof_mid_frame() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session(server, SessionLimits::default()).run());

        client.write_all(&[0x10, 0x00, 0x2f]).await.unwrap();
        client.shutdown().await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout() {
        let (_client, server) = tokio::io::duplex(1024);
        let limits = SessionLimits {
            idle_timeout: Duration::from_secs(5),
            ..SessionLimits::default()
        };
        let err = session(server, limits).run().await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionTimeout));
    }

    #[tokio::test]
    async fn test_frames_processed_in_order() {
        let (mut client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(session(server, SessionLimits::default()).run());

        // Both frames in one write: the handshake must move the phase before
        // the second frame is looked up, so packet 0 fails in Status.
        let mut bytes = handshake_frame(NextState::Status);
        bytes.extend(handshake_frame(NextState::Status));
        client.write_all(&bytes).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnknownPacket {
                phase: ProtocolPhase::Status,
                id: 0x00
            }
        ));
    }

    #[tokio::test]
    async fn test_handler_reply_is_framed() {
        let (mut client, server) = tokio::io::duplex(1024);
        let session = Session::new(server, status_registry(), SessionLimits::default());
        let task = tokio::spawn(session.run());

        client.write_all(&handshake_frame(NextState::Status)).await.unwrap();
        client.write_all(&frame(&[0x00])).await.unwrap();

        let mut reply = Vec::new();
        let mut reader = StreamReader::new(&mut client, 1024);
        assert!(reader.read_frame(&mut reply).await.unwrap());

        let mut packet = PacketReader::new(&reply);
        assert_eq!(packet.read_varint().unwrap(), 0x00);
        assert_eq!(packet.read_string().unwrap(), STATUS_JSON);
        assert_eq!(packet.remaining(), 0);

        client.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_replies_keep_request_order() {
        let (mut client, server) = tokio::io::duplex(1024);
        let session = Session::new(server, status_registry(), SessionLimits::default());
        let task = tokio::spawn(session.run());

        let mut bytes = handshake_frame(NextState::Status);
        bytes.extend(frame(&[0x01]));
        bytes.extend(frame(&[0x00]));
        client.write_all(&bytes).await.unwrap();

        let mut reader = StreamReader::new(&mut client, 1024);
        let mut reply = Vec::new();
        assert!(reader.read_frame(&mut reply).await.unwrap());
        assert_eq!(reply, vec![0x01; 64]);
        assert!(reader.read_frame(&mut reply).await.unwrap());
        assert_eq!(reply[0], 0x00);

        client.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversized_reply_ends_session() {
        let (mut client, server) = tokio::io::duplex(1024);
        let limits = SessionLimits {
            max_frame_size: 32,
            ..SessionLimits::default()
        };
        let task = tokio::spawn(Session::new(server, status_registry(), limits).run());

        client.write_all(&handshake_frame(NextState::Status)).await.unwrap();
        client.write_all(&frame(&[0x01])).await.unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, ProtocolError::OversizedFrame { len: 64, max: 32 }));

        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
