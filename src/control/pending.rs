//! Pending request correlation
//!
//! The protocol carries no request identifiers. Replies arrive in command
//! order, so the next final reply belongs to the single outstanding request
//! unless an earlier request was abandoned before its answer came.

use log::debug;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::ControlError;
use crate::protocol::Reply;

pub type ReplyResult = Result<Reply, ControlError>;

/// The command currently awaiting its reply.
#[derive(Debug)]
pub struct PendingRequest {
    command: String,
    expected: Vec<u16>,
    slot: oneshot::Sender<ReplyResult>,
}

impl PendingRequest {
    /// Creates a request together with the future its reply is delivered to.
    pub fn new(command: impl Into<String>, expected: &[u16]) -> (Self, DeferredReply) {
        let (slot, rx) = oneshot::channel();
        let request = Self {
            command: command.into(),
            expected: expected.to_vec(),
            slot,
        };
        (request, DeferredReply::waiting(rx))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn expected(&self) -> &[u16] {
        &self.expected
    }

    /// Whether a reply with `code` completes this request.
    ///
    /// Any final reply (200 and up) does, expected or not; the caller
    /// compares the code. Preliminary replies never do.
    pub fn is_satisfied_by(&self, code: u16) -> bool {
        code >= 200
    }

    /// Resolves the request. Consumes it, so it can only happen once.
    pub fn fulfill(self, result: ReplyResult) {
        if self.slot.send(result).is_err() {
            debug!("Reply to {} arrived after the caller stopped waiting", self.command);
        }
    }
}

/// Correlation state shared between the connection handle and the reply loop.
#[derive(Debug, Default)]
pub struct ReplySlot {
    pub pending: Option<PendingRequest>,
    /// Set once the reply loop has exited; no request may be installed after.
    pub closed: bool,
    /// Expected codes of a request given up on before its reply arrived.
    abandoned: Option<Vec<u16>>,
}

impl ReplySlot {
    /// Installs `request`. An unanswered predecessor is abandoned.
    pub fn install(&mut self, request: PendingRequest) {
        if let Some(stale) = self.pending.replace(request) {
            self.abandon_request(stale);
        }
    }

    /// Gives up on the pending request, if any.
    pub fn abandon(&mut self) {
        if let Some(stale) = self.pending.take() {
            self.abandon_request(stale);
        }
    }

    fn abandon_request(&mut self, stale: PendingRequest) {
        debug!("Abandoning unanswered request {}", stale.command);
        if !stale.expected.is_empty() {
            self.abandoned = Some(stale.expected);
        }
    }

    /// Whether `reply` is the late answer to an abandoned request.
    ///
    /// Only the first final reply after abandoning can be that answer, so
    /// the mark is cleared whatever the outcome.
    pub fn take_late(&mut self, reply: &Reply) -> bool {
        self.abandoned
            .take()
            .is_some_and(|codes| reply.is_one_of(&codes))
    }
}

/// A reply that will arrive later on the control connection.
///
/// Returned by `ControlConnection::send_deferred`; await it to get the reply.
#[derive(Debug)]
pub struct DeferredReply {
    state: DeferredState,
}

#[derive(Debug)]
enum DeferredState {
    Waiting(oneshot::Receiver<ReplyResult>),
    Ready(Option<ReplyResult>),
}

impl DeferredReply {
    fn waiting(rx: oneshot::Receiver<ReplyResult>) -> Self {
        Self {
            state: DeferredState::Waiting(rx),
        }
    }

    /// A deferred reply that has already been received.
    pub fn ready(result: ReplyResult) -> Self {
        Self {
            state: DeferredState::Ready(Some(result)),
        }
    }
}

impl Future for DeferredReply {
    type Output = ReplyResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            DeferredState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(ControlError::ReplyDropped))),
            DeferredState::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(ControlError::ReplyDropped)))
            }
        }
    }
}
