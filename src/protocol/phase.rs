//! Connection phases and the transitions allowed between them.

use std::fmt;

/// The sub-dialect a connection is currently speaking.
///
/// Every session starts in [`ProtocolPhase::Handshake`] and only ever moves
/// forward; there is no way back to an earlier phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolPhase {
    #[default]
    Handshake,
    Status,
    Login,
    Play,
}

impl ProtocolPhase {
    pub const ALL: [ProtocolPhase; 4] = [
        ProtocolPhase::Handshake,
        ProtocolPhase::Status,
        ProtocolPhase::Login,
        ProtocolPhase::Play,
    ];

    /// Dense index, used to address per-phase handler tables.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ProtocolPhase::Handshake => 0,
            ProtocolPhase::Status => 1,
            ProtocolPhase::Login => 2,
            ProtocolPhase::Play => 3,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolPhase::Handshake => "handshake",
            ProtocolPhase::Status => "status",
            ProtocolPhase::Login => "login",
            ProtocolPhase::Play => "play",
        }
    }

    /// Whether a session in `self` may move to `next`.
    pub const fn can_transition_to(self, next: ProtocolPhase) -> bool {
        matches!(
            (self, next),
            (ProtocolPhase::Handshake, ProtocolPhase::Status)
                | (ProtocolPhase::Handshake, ProtocolPhase::Login)
        )
    }
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
