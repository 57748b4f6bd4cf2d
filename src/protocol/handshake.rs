//! Handshake packet definitions.
//!
//! The handshake is the first packet a client sends. It announces the
//! protocol version and the address it dialed, and selects whether the
//! connection continues as a status ping or a login attempt.

use crate::core::buffer::{PacketReader, PacketWriter};
use crate::error::{ProtocolError, Result};
use crate::protocol::packet::{Decode, Encode, Packet};
use crate::protocol::phase::ProtocolPhase;

/// Handshake packet ID.
pub const PACKET_ID: i32 = 0x00;

/// Maximum server address length, in characters.
pub const MAX_SERVER_ADDRESS: usize = 255;

/// The phase requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    /// Status request (server list ping).
    Status = 1,
    /// Login request.
    Login = 2,
}

impl TryFrom<i32> for NextState {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            1 => Ok(Self::Status),
            2 => Ok(Self::Login),
            _ => Err(ProtocolError::UnexpectedNextState(value)),
        }
    }
}

impl From<NextState> for ProtocolPhase {
    fn from(state: NextState) -> Self {
        match state {
            NextState::Status => ProtocolPhase::Status,
            NextState::Login => ProtocolPhase::Login,
        }
    }
}

/// Handshake packet sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: NextState,
}

impl Packet for HandshakePacket {
    const ID: i32 = PACKET_ID;
    const PHASE: ProtocolPhase = ProtocolPhase::Handshake;
}

impl Decode for HandshakePacket {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self> {
        let protocol_version = reader.read_varint()?;
        let server_address = reader.read_string_bounded(MAX_SERVER_ADDRESS)?.to_owned();
        let server_port = reader.read_u16()?;
        let next_state = NextState::try_from(reader.read_varint()?)?;

        Ok(Self {
            protocol_version,
            server_address,
            server_port,
            next_state,
        })
    }
}

impl Encode for HandshakePacket {
    fn encode(&self, writer: &mut PacketWriter) {
        writer
            .write_varint(self.protocol_version)
            .write_string(&self.server_address)
            .write_u16(self.server_port)
            .write_varint(self.next_state as i32);
    }
}
