use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::core::buffer::PacketReader;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::HandshakePacket;
use crate::protocol::outbox::Outbox;
use crate::protocol::packet::{Decode, Packet};
use crate::protocol::phase::ProtocolPhase;
use crate::utils::metrics::global_metrics;

/// A packet handler. Receives the reader positioned after the packet ID and
/// the session's [`Outbox`] for replies, and optionally returns the phase the
/// session should switch to.
pub type HandlerFn = dyn Fn(&mut PacketReader<'_>, &mut Outbox) -> Result<Option<ProtocolPhase>>
    + Send
    + Sync
    + 'static;

/// Immutable (phase, packet ID) → handler table, built once and shared by all sessions.
pub struct HandlerRegistry {
    tables: [HashMap<i32, Box<HandlerFn>>; 4],
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerRegistry {
    /// An empty table: every (phase, id) pair is unregistered.
    pub fn new() -> Self {
        Self {
            tables: Default::default(),
        }
    }

    /// The standard table: only the handshake packet is registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_packet::<HandshakePacket, _>(handle_handshake);
        registry
    }

    /// Register a raw handler for `(phase, id)`, replacing any previous one.
    pub fn register<F>(&mut self, phase: ProtocolPhase, id: i32, handler: F)
    where
        F: Fn(&mut PacketReader<'_>, &mut Outbox) -> Result<Option<ProtocolPhase>>
            + Send
            + Sync
            + 'static,
    {
        self.tables[phase.index()].insert(id, Box::new(handler));
    }

    /// Register a typed handler: the body is decoded as `P` and handed to `apply`.
    pub fn register_packet<P, F>(&mut self, apply: F)
    where
        P: Packet + Decode + 'static,
        F: Fn(P, &mut Outbox) -> Result<Option<ProtocolPhase>> + Send + Sync + 'static,
    {
        self.register(P::PHASE, P::ID, move |reader, outbox| {
            apply(P::decode(reader)?, outbox)
        });
    }

    pub fn get(&self, phase: ProtocolPhase, id: i32) -> Option<&HandlerFn> {
        self.tables[phase.index()].get(&id).map(Box::as_ref)
    }

    pub fn is_registered(&self, phase: ProtocolPhase, id: i32) -> bool {
        self.tables[phase.index()].contains_key(&id)
    }

    /// Total number of registered (phase, id) pairs.
    pub fn len(&self) -> usize {
        self.tables.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for phase in ProtocolPhase::ALL {
            let mut ids: Vec<_> = self.tables[phase.index()].keys().copied().collect();
            ids.sort_unstable();
            map.entry(&phase, &ids);
        }
        map.finish()
    }
}

fn handle_handshake(packet: HandshakePacket, _outbox: &mut Outbox) -> Result<Option<ProtocolPhase>> {
    info!(
        protocol_version = packet.protocol_version,
        server_address = %packet.server_address,
        server_port = packet.server_port,
        next_state = ?packet.next_state,
        "Handshake received"
    );
    global_metrics().handshake(packet.next_state);
    Ok(Some(packet.next_state.into()))
}

/// Per-session dispatcher: the shared handler table plus this connection's phase.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    phase: ProtocolPhase,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            phase: ProtocolPhase::Handshake,
        }
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.phase
    }

    /// Route one frame payload (packet ID + body) to its handler.
    ///
    /// Returns the packet ID that was handled. Replies the handler queued are
    /// left in `outbox`; on error it is cleared.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownPacket`] if nothing is registered for the
    ///   current phase and packet ID. The rest of the frame cannot be skipped
    ///   safely, so the caller must close the connection.
    /// - [`ProtocolError::IllegalTransition`] if the handler asks for a phase
    ///   that cannot follow the current one.
    /// - Any decode error raised by the handler.
    pub fn dispatch(&mut self, payload: &[u8], outbox: &mut Outbox) -> Result<i32> {
        let result = self.route(payload, outbox);
        if result.is_err() {
            outbox.clear();
        }
        result
    }

    fn route(&mut self, payload: &[u8], outbox: &mut Outbox) -> Result<i32> {
        let mut reader = PacketReader::new(payload);
        let id = reader.read_varint()?;

        let handler = self
            .registry
            .get(self.phase, id)
            .ok_or(ProtocolError::UnknownPacket {
                phase: self.phase,
                id,
            })?;

        if let Some(next) = handler(&mut reader, outbox)? {
            if !self.phase.can_transition_to(next) {
                return Err(ProtocolError::IllegalTransition {
                    from: self.phase,
                    to: next,
                });
            }
            debug!(from = %self.phase, to = %next, "Phase transition");
            self.phase = next;
        }

        if reader.remaining() > 0 {
            trace!(id, trailing = reader.remaining(), "Handler left bytes unread");
        }
        Ok(id)
    }
}
