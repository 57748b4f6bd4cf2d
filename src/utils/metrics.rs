//! Observability and Metrics
//!
//! Process-wide counters for connections, frames and handshake outcomes.
//!
//! Uses atomic counters for thread-safe metrics collection; sessions never
//! contend on a lock to record activity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

use crate::error::{ErrorCategory, ProtocolError};
use crate::protocol::handshake::NextState;

/// Global metrics collector for server operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open sessions
    pub connections_active: AtomicU64,
    /// Connections refused because the session limit was reached
    pub connections_rejected: AtomicU64,
    /// Frames read and dispatched
    pub frames_received: AtomicU64,
    /// Payload bytes received
    pub bytes_received: AtomicU64,
    /// Handshakes requesting the status phase
    pub handshakes_status: AtomicU64,
    /// Handshakes requesting the login phase
    pub handshakes_login: AtomicU64,
    /// Sessions closed by a framing error
    pub framing_errors: AtomicU64,
    /// Sessions closed by a decode error
    pub decode_errors: AtomicU64,
    /// Sessions closed by an unregistered (phase, id)
    pub unknown_packets: AtomicU64,
    /// Sessions closed by an oversized frame
    pub oversized_frames: AtomicU64,
    /// Sessions closed by transport failures
    pub connection_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            handshakes_status: AtomicU64::new(0),
            handshakes_login: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            unknown_packets: AtomicU64::new(0),
            oversized_frames: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a connection dropped at accept time
    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame received
    pub fn frame_received(&self, byte_count: u64) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a decoded handshake
    pub fn handshake(&self, next_state: NextState) {
        let counter = match next_state {
            NextState::Status => &self.handshakes_status,
            NextState::Login => &self.handshakes_login,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the error that ended a session
    pub fn session_error(&self, error: &ProtocolError) {
        let counter = match error.category() {
            ErrorCategory::Framing => &self.framing_errors,
            ErrorCategory::Decode => &self.decode_errors,
            ErrorCategory::UnknownPacket => &self.unknown_packets,
            ErrorCategory::OversizedFrame => &self.oversized_frames,
            ErrorCategory::ConnectionClosed
            | ErrorCategory::Transport
            | ErrorCategory::Config => &self.connection_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            handshakes_status: self.handshakes_status.load(Ordering::Relaxed),
            handshakes_login: self.handshakes_login.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            unknown_packets: self.unknown_packets.load(Ordering::Relaxed),
            oversized_frames: self.oversized_frames.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connections_rejected = snapshot.connections_rejected,
            frames_received = snapshot.frames_received,
            bytes_received = snapshot.bytes_received,
            handshakes_status = snapshot.handshakes_status,
            handshakes_login = snapshot.handshakes_login,
            framing_errors = snapshot.framing_errors,
            decode_errors = snapshot.decode_errors,
            unknown_packets = snapshot.unknown_packets,
            oversized_frames = snapshot.oversized_frames,
            connection_errors = snapshot.connection_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Server metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    pub handshakes_status: u64,
    pub handshakes_login: u64,
    pub framing_errors: u64,
    pub decode_errors: u64,
    pub unknown_packets: u64,
    pub oversized_frames: u64,
    pub connection_errors: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
