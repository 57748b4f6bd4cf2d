//! # Protocol Layer
//!
//! Phase tracking, packet definitions and per-connection dispatch.
//!
//! A session starts in [`phase::ProtocolPhase::Handshake`]. Each frame is routed
//! by [`dispatcher::Dispatcher`] to the handler registered for the current
//! (phase, packet ID) pair; a handler may move the session to a later phase.
//! Pairs without a handler fail closed. Handlers answer the peer through an
//! [`outbox::Outbox`].

pub mod dispatcher;
pub mod handshake;
pub mod outbox;
pub mod packet;
pub mod phase;

#[cfg(test)]
mod tests;
