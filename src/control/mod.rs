//! Control connection
//!
//! Owns the control socket: a background reply loop is the single reader,
//! the `ControlConnection` handle is the single writer, and replies are
//! correlated with the one command in flight.

pub mod connection;
pub mod pending;
pub mod reply_loop;

pub use connection::ControlConnection;
pub use pending::{DeferredReply, PendingRequest};
