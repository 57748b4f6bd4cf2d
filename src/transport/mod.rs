//! # Transport Layer
//!
//! TCP listener, per-connection sessions and a framed client connector.
//!
//! ## Responsibilities
//! - Accept connections and spawn one isolated session per connection
//! - Drive each session's read → dispatch loop
//! - Orderly shutdown with a bounded drain period

pub mod client;
pub mod server;
pub mod session;
