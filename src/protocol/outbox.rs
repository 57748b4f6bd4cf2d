//! Packets queued by handlers for delivery to the peer.
//!
//! Handlers run synchronously inside
//! [`Dispatcher::dispatch`](crate::protocol::dispatcher::Dispatcher::dispatch),
//! so they cannot write to the socket themselves. They queue payloads here
//! instead, and the session writes each one as a `VarInt(length) payload`
//! frame once the handler has returned successfully. Packets queued by a
//! failing handler are never sent.

use bytes::Bytes;

use crate::protocol::packet::{encode_payload, Encode, Packet};

/// Per-session queue of outgoing frame payloads.
#[derive(Debug, Default)]
pub struct Outbox {
    queued: Vec<Bytes>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `packet` (ID + body) as one frame.
    pub fn send<P: Packet + Encode>(&mut self, packet: &P) {
        self.queued.push(encode_payload(packet));
    }

    /// Queue a payload that already starts with its packet ID.
    pub fn send_raw(&mut self, payload: Bytes) {
        self.queued.push(payload);
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Drop everything queued so far.
    pub fn clear(&mut self) {
        self.queued.clear();
    }

    /// Take the queued payloads in the order they were sent.
    pub fn drain(&mut self) -> std::vec::Drain<'_, Bytes> {
        self.queued.drain(..)
    }
}
