// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::buffer::PacketWriter;
use crate::error::ProtocolError;
use crate::protocol::dispatcher::{Dispatcher, HandlerRegistry};
use crate::protocol::handshake::{HandshakePacket, NextState};
use crate::protocol::outbox::Outbox;
use crate::protocol::packet::encode_payload;
use crate::protocol::phase::ProtocolPhase;

fn handshake_payload(next_state: NextState) -> bytes::Bytes {
    encode_payload(&HandshakePacket {
        protocol_version: 47,
        server_address: "localhost".to_string(),
        server_port: 25565,
        next_state,
    })
}

fn default_dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(HandlerRegistry::with_defaults()))
}

#[test]
fn test_handshake_moves_to_status() {
    let mut dispatcher = default_dispatcher();
    assert_eq!(dispatcher.phase(), ProtocolPhase::Handshake);

    let id = dispatcher
        .dispatch(&handshake_payload(NextState::Status), &mut Outbox::new())
        .expect("handshake should dispatch");
    assert_eq!(id, 0x00);
    assert_eq!(dispatcher.phase(), ProtocolPhase::Status);
}

#[test]
fn test_handshake_moves_to_login() {
    let mut dispatcher = default_dispatcher();
    dispatcher
        .dispatch(&handshake_payload(NextState::Login), &mut Outbox::new())
        .unwrap();
    assert_eq!(dispatcher.phase(), ProtocolPhase::Login);
}

#[test]
fn test_unexpected_next_state_keeps_phase() {
    let mut writer = PacketWriter::new();
    writer
        .write_varint(0x00)
        .write_varint(47)
        .write_string("localhost")
        .write_u16(25565)
        .write_varint(3);
    let payload = writer.into_bytes();

    let mut dispatcher = default_dispatcher();
    let err = dispatcher.dispatch(&payload, &mut Outbox::new()).unwrap_err();
    assert!(matches!(err, ProtocolError::UnexpectedNextState(3)));
    assert!(err.to_string().contains("unexpected next state"));
    assert_eq!(dispatcher.phase(), ProtocolPhase::Handshake);
}

#[test]
fn test_unregistered_id_fails_closed() {
    let mut dispatcher = default_dispatcher();
    let err = dispatcher.dispatch(&[0x01, 0xff, 0xff], &mut Outbox::new()).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnknownPacket {
            phase: ProtocolPhase::Handshake,
            id: 0x01
        }
    ));
}

#[test]
fn test_second_handshake_is_unknown_in_status() {
    let mut dispatcher = default_dispatcher();
    let payload = handshake_payload(NextState::Status);
    dispatcher.dispatch(&payload, &mut Outbox::new()).unwrap();

    // Packet 0 in the status phase has no handler in the default table
    let err = dispatcher.dispatch(&payload, &mut Outbox::new()).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnknownPacket {
            phase: ProtocolPhase::Status,
            id: 0x00
        }
    ));
    assert_eq!(dispatcher.phase(), ProtocolPhase::Status);
}

#[test]
fn test_empty_payload_is_decode_error() {
    let mut dispatcher = default_dispatcher();
    assert!(matches!(
        dispatcher.dispatch(&[], &mut Outbox::new()),
        Err(ProtocolError::UnexpectedEnd { .. })
    ));
}

#[test]
fn test_registered_extension_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut registry = HandlerRegistry::with_defaults();
    registry.register(ProtocolPhase::Status, 0x00, move |reader, _outbox| {
        assert_eq!(reader.remaining(), 0);
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    });
    assert!(registry.is_registered(ProtocolPhase::Status, 0x00));
    assert!(!registry.is_registered(ProtocolPhase::Login, 0x00));
    assert_eq!(registry.len(), 2);

    let mut dispatcher = Dispatcher::new(Arc::new(registry));
    dispatcher
        .dispatch(&handshake_payload(NextState::Status), &mut Outbox::new())
        .unwrap();
    dispatcher.dispatch(&[0x00], &mut Outbox::new()).unwrap();
    dispatcher.dispatch(&[0x00], &mut Outbox::new()).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(dispatcher.phase(), ProtocolPhase::Status);
}

#[test]
fn test_backward_transition_rejected() {
    let mut registry = HandlerRegistry::with_defaults();
    registry.register(ProtocolPhase::Login, 0x00, |_, _| Ok(Some(ProtocolPhase::Handshake)));

    let mut dispatcher = Dispatcher::new(Arc::new(registry));
    dispatcher
        .dispatch(&handshake_payload(NextState::Login), &mut Outbox::new())
        .unwrap();
    let err = dispatcher.dispatch(&[0x00], &mut Outbox::new()).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::IllegalTransition {
            from: ProtocolPhase::Login,
            to: ProtocolPhase::Handshake
        }
    ));
    assert_eq!(dispatcher.phase(), ProtocolPhase::Login);
}

#[test]
fn test_empty_registry_rejects_everything() {
    let registry = HandlerRegistry::new();
    assert!(registry.is_empty());

    let mut dispatcher = Dispatcher::new(Arc::new(registry));
    assert!(matches!(
        dispatcher.dispatch(&handshake_payload(NextState::Status), &mut Outbox::new()),
        Err(ProtocolError::UnknownPacket { .. })
    ));
}

#[test]
fn test_sessions_share_table_not_phase() {
    let registry = Arc::new(HandlerRegistry::with_defaults());
    let mut first = Dispatcher::new(Arc::clone(&registry));
    let second = Dispatcher::new(registry);

    first
        .dispatch(&handshake_payload(NextState::Login), &mut Outbox::new())
        .unwrap();
    assert_eq!(first.phase(), ProtocolPhase::Login);
    assert_eq!(second.phase(), ProtocolPhase::Handshake);
}

#[test]
fn test_registry_debug_lists_ids() {
    let registry = HandlerRegistry::with_defaults();
    let debug = format!("{registry:?}");
    assert!(debug.contains("Handshake: [0]"));
    assert!(debug.contains("Play: []"));
}

#[test]
fn test_handler_replies_through_outbox() {
    let mut registry = HandlerRegistry::with_defaults();
    registry.register(ProtocolPhase::Status, 0x01, |reader, outbox| {
        // Ping: echo the payload back
        let token = reader.read_exact(8)?;
        let mut writer = PacketWriter::new();
        writer.write_varint(0x01).write_bytes(token);
        outbox.send_raw(writer.into_bytes());
        Ok(None)
    });

    let mut dispatcher = Dispatcher::new(Arc::new(registry));
    let mut outbox = Outbox::new();
    dispatcher
        .dispatch(&handshake_payload(NextState::Status), &mut outbox)
        .unwrap();
    assert!(outbox.is_empty());

    let ping = [0x01, 0, 0, 0, 0, 0, 0, 0x30, 0x39];
    dispatcher.dispatch(&ping, &mut outbox).unwrap();
    let replies: Vec<_> = outbox.drain().collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(&replies[0][..], &ping);
}

#[test]
fn test_failed_dispatch_discards_replies() {
    let mut registry = HandlerRegistry::with_defaults();
    registry.register(ProtocolPhase::Login, 0x00, |_, outbox| {
        outbox.send_raw(bytes::Bytes::from_static(&[0x02]));
        Ok(Some(ProtocolPhase::Status))
    });

    let mut dispatcher = Dispatcher::new(Arc::new(registry));
    let mut outbox = Outbox::new();
    dispatcher
        .dispatch(&handshake_payload(NextState::Login), &mut outbox)
        .unwrap();

    let err = dispatcher.dispatch(&[0x00], &mut outbox).unwrap_err();
    assert!(matches!(err, ProtocolError::IllegalTransition { .. }));
    assert!(outbox.is_empty());
}
