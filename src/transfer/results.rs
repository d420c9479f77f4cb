//! Transfer result types
//!
//! Defines the report returned when an operation finishes.

use crate::protocol::Reply;

/// What a finished transfer achieved.
#[derive(Debug, Clone, Default)]
pub struct TransferReport {
    /// Bytes moved over the data channel
    pub bytes: u64,
    /// The server's completion reply, if it arrived
    pub completion: Option<Reply>,
    /// The data stream or the completion reply did not arrive within the
    /// grace period; the data may be incomplete.
    pub stalled: bool,
    /// Accumulated listing text, for directory listings
    pub listing: Option<String>,
}

impl TransferReport {
    /// Completed without a stall and with a success reply.
    pub fn is_complete(&self) -> bool {
        !self.stalled && self.completion.as_ref().is_some_and(|reply| reply.is_success())
    }
}
