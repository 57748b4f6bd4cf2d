//! # Error Types
//!
//! Error handling for the wire codec, the phase dispatcher and the server.
//!
//! Every failure a session can hit is a [`ProtocolError`]. All of them are fatal
//! to the session that produced them and to nothing else: the socket is closed,
//! the error is logged, and the listener keeps serving other connections.
//!
//! ## Error Categories
//! - **Framing**: a VarInt/VarLong never cleared its continuation bit
//! - **Connection closed**: the peer went away, possibly mid-frame
//! - **Decode**: truncated payloads, invalid UTF-8, bad enum values
//! - **Unknown packet**: no handler for the current (phase, id) pair
//! - **Oversized frame**: the declared length exceeds the configured cap
//!
//! ## Example Usage
//! ```rust
//! use craftwire::core::buffer::PacketReader;
//! use craftwire::error::{ErrorCategory, ProtocolError};
//!
//! let mut reader = PacketReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80]);
//! let err = reader.read_varint().unwrap_err();
//! assert!(matches!(err, ProtocolError::VarNumTooLong { max_bytes: 5 }));
//! assert_eq!(err.category(), ErrorCategory::Framing);
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

use crate::protocol::phase::ProtocolPhase;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Configuration errors
    pub const ERR_CONFIG_OPEN: &str = "Failed to open config file";
    pub const ERR_CONFIG_READ: &str = "Failed to read config file";
    pub const ERR_CONFIG_PARSE: &str = "Failed to parse TOML";
    pub const ERR_CONFIG_SERIALIZE: &str = "Failed to serialize config";
    pub const ERR_CONFIG_WRITE: &str = "Failed to write config file";

    /// Decode errors
    pub const ERR_UNEXPECTED_NEXT_STATE: &str = "unexpected next state";
}

/// Coarse grouping of [`ProtocolError`] variants, used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Framing,
    ConnectionClosed,
    Decode,
    UnknownPacket,
    OversizedFrame,
    Transport,
    Config,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Framing => "framing",
            ErrorCategory::ConnectionClosed => "connection_closed",
            ErrorCategory::Decode => "decode",
            ErrorCategory::UnknownPacket => "unknown_packet",
            ErrorCategory::OversizedFrame => "oversized_frame",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("variable-length number exceeds {max_bytes} bytes")]
    VarNumTooLong { max_bytes: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("unexpected end of packet: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("string too long: {len} bytes (max {max})")]
    StringTooLong { len: usize, max: usize },

    #[error("unexpected next state: {0}")]
    UnexpectedNextState(i32),

    #[error("no handler for packet {id:#04x} in phase {phase}")]
    UnknownPacket { phase: ProtocolPhase, id: i32 },

    #[error("frame too large: {len} bytes (max {max})")]
    OversizedFrame { len: usize, max: usize },

    #[error("illegal phase transition: {from} -> {to}")]
    IllegalTransition {
        from: ProtocolPhase,
        to: ProtocolPhase,
    },

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Classify this error into one of the categories the server reports on.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProtocolError::VarNumTooLong { .. } => ErrorCategory::Framing,
            ProtocolError::ConnectionClosed => ErrorCategory::ConnectionClosed,
            ProtocolError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                ErrorCategory::ConnectionClosed
            }
            ProtocolError::UnexpectedEnd { .. }
            | ProtocolError::InvalidUtf8(_)
            | ProtocolError::NegativeLength(_)
            | ProtocolError::StringTooLong { .. }
            | ProtocolError::UnexpectedNextState(_)
            | ProtocolError::IllegalTransition { .. } => ErrorCategory::Decode,
            ProtocolError::UnknownPacket { .. } => ErrorCategory::UnknownPacket,
            ProtocolError::OversizedFrame { .. } => ErrorCategory::OversizedFrame,
            ProtocolError::Io(_) | ProtocolError::ConnectionTimeout => ErrorCategory::Transport,
            ProtocolError::ConfigError(_) => ErrorCategory::Config,
        }
    }

    /// True when the peer simply went away rather than sending something invalid.
    pub fn is_clean_disconnect(&self) -> bool {
        match self {
            ProtocolError::ConnectionClosed => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
