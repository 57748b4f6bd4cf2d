//! # craftwire
//!
//! Server core for the handshake phase of a length-prefixed, VarInt-framed
//! game protocol.
//!
//! The crate accepts TCP connections, reads `[VarInt length][payload]` frames,
//! tracks each connection's protocol phase and decodes the handshake packet
//! that selects the next phase. Status, login and play packets are left to
//! extension handlers registered on a [`HandlerRegistry`].
//!
//! ## Layers
//! - [`core`]: VarInt/VarLong codec, stream and buffered readers, frame codec
//! - [`protocol`]: phases, packet traits, the handshake packet, dispatch
//! - [`transport`]: TCP listener, sessions, client connector
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging, metrics
//!
//! ## Example
//! ```no_run
//! use craftwire::{HandlerRegistry, Server, ServerSettings};
//!
//! # async fn run() -> craftwire::error::Result<()> {
//! let settings = ServerSettings::from_env()?;
//! settings.validate_strict()?;
//! Server::bind(settings, HandlerRegistry::with_defaults())
//!     .await?
//!     .run()
//!     .await
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::ServerSettings;
pub use error::{ProtocolError, Result};
pub use protocol::dispatcher::{Dispatcher, HandlerRegistry};
pub use protocol::handshake::{HandshakePacket, NextState};
pub use protocol::outbox::Outbox;
pub use protocol::phase::ProtocolPhase;
pub use transport::server::Server;
