//! Packet traits shared by every packet type.

use bytes::Bytes;

use crate::core::buffer::{PacketReader, PacketWriter};
use crate::error::Result;
use crate::protocol::phase::ProtocolPhase;

/// Identity of a packet on the wire.
pub trait Packet {
    /// The packet ID.
    const ID: i32;

    /// The phase this packet belongs to.
    const PHASE: ProtocolPhase;
}

/// A packet body that can be decoded from a buffered frame.
///
/// The reader is positioned just after the packet ID.
pub trait Decode: Sized {
    /// # Errors
    /// Returns a decode error if the body is truncated or malformed.
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self>;
}

/// A packet body that can be written into a payload.
pub trait Encode {
    fn encode(&self, writer: &mut PacketWriter);
}

/// Build a complete frame payload: VarInt packet ID followed by the body.
pub fn encode_payload<P: Packet + Encode>(packet: &P) -> Bytes {
    let mut writer = PacketWriter::new();
    writer.write_varint(P::ID);
    packet.encode(&mut writer);
    writer.into_bytes()
}
