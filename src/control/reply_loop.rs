//! Background reply loop
//!
//! Runs for the lifetime of a control connection as the only reader of its
//! socket. Every complete reply is offered to the pending request; the loop
//! ends on a `421`, a clean close or a read error, and from then on the
//! connection refuses new commands.

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

use crate::control::pending::{ReplyResult, ReplySlot};
use crate::error::ControlError;
use crate::protocol::{Reply, ReplyBuffer, parse_reply_line};

const READ_CHUNK: usize = 4096;

/// Reads replies from `reader` until the connection ends.
pub async fn run_reply_loop<R>(
    mut reader: R,
    slot: Arc<Mutex<ReplySlot>>,
    connected: Arc<AtomicBool>,
    peer: String,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = ReplyBuffer::default();
    let mut block: Option<MultiLineBlock> = None;
    let mut chunk = vec![0u8; READ_CHUNK];

    let exit = 'read: loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                info!("Control connection closed by {}", peer);
                break 'read ControlError::ConnectionClosed;
            }
            Ok(n) => n,
            Err(e) => {
                error!("Failed to read from {}: {}", peer, e);
                break 'read ControlError::Io(e);
            }
        };

        buffer.feed(&chunk[..n]);
        while let Some(line) = buffer.next_line() {
            let Some(item) = assemble(&mut block, &line) else {
                continue;
            };
            if dispatch(&slot, item).await {
                info!("Server {} is closing the control connection", peer);
                break 'read ControlError::ConnectionClosed;
            }
        }
    };

    mark_closed(&slot, &connected, exit).await;
}

/// Marks the connection dead and fails any request still waiting.
pub async fn mark_closed(slot: &Mutex<ReplySlot>, connected: &AtomicBool, reason: ControlError) {
    let mut slot = slot.lock().await;
    slot.closed = true;
    connected.store(false, Ordering::SeqCst);
    if let Some(request) = slot.pending.take() {
        warn!("Abandoning {}: {}", request.command(), reason);
        request.fulfill(Err(reason));
    }
}

/// An open `NNN-` multi-line reply awaiting its `NNN ` closing line.
#[derive(Debug)]
struct MultiLineBlock {
    code: u16,
    lines: Vec<String>,
}

/// Turns one line into a complete reply, or `None` while a multi-line reply
/// is still open.
fn assemble(block: &mut Option<MultiLineBlock>, line: &str) -> Option<ReplyResult> {
    if let Some(open) = block.as_mut() {
        let code = open.code.to_string();
        let closing = line
            .strip_prefix(code.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with(' '));
        match closing {
            Some(rest) => open.lines.push(rest.trim_start().to_string()),
            None => {
                debug!("Received continuation: {}", line);
                open.lines.push(line.to_string());
                return None;
            }
        }
        let done = block.take()?;
        return Some(Ok(Reply::new(done.code, done.lines.join("\n"))));
    }

    match parse_reply_line(line) {
        Ok(parsed) if parsed.continues => {
            info!("Received: {}-{}", parsed.code, parsed.text);
            *block = Some(MultiLineBlock {
                code: parsed.code,
                lines: vec![parsed.text],
            });
            None
        }
        Ok(parsed) => Some(Ok(Reply::new(parsed.code, parsed.text))),
        Err(e) => Some(Err(e)),
    }
}

/// Offers a reply to the pending request. Returns `true` when the server
/// announced it is closing the connection.
async fn dispatch(slot: &Mutex<ReplySlot>, item: ReplyResult) -> bool {
    let mut slot = slot.lock().await;

    let reply = match item {
        Ok(reply) => reply,
        Err(e) => {
            match slot.pending.take() {
                Some(request) => request.fulfill(Err(e)),
                None => error!("{}", e),
            }
            return false;
        }
    };

    info!("Received: {}", reply);

    if reply.is_service_closing() {
        if let Some(request) = slot.pending.take() {
            request.fulfill(Ok(reply));
        }
        return true;
    }

    if reply.is_preliminary() {
        debug!("Preliminary reply {}", reply.code);
        return false;
    }

    if slot.take_late(&reply) {
        info!("Discarding late {} meant for an abandoned request", reply.code);
        return false;
    }

    match slot.pending.take() {
        Some(request) if request.is_satisfied_by(reply.code) => {
            if !reply.is_error() && !request.expected().is_empty() && !reply.is_one_of(request.expected()) {
                warn!(
                    "{} answered with unexpected {} (expected {:?})",
                    request.command(),
                    reply.code,
                    request.expected()
                );
            }
            request.fulfill(Ok(reply));
        }
        Some(request) => slot.pending = Some(request),
        None => debug!("No request waiting for {}", reply.code),
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::pending::PendingRequest;
    use tokio::io::AsyncWriteExt;

    fn shared() -> (Arc<Mutex<ReplySlot>>, Arc<AtomicBool>) {
        (
            Arc::new(Mutex::new(ReplySlot::default())),
            Arc::new(AtomicBool::new(true)),
        )
    }

    #[test]
    fn assembles_multi_line_replies() {
        let mut block = None;
        assert!(assemble(&mut block, "230-Welcome").is_none());
        assert!(assemble(&mut block, " be nice").is_none());
        assert!(assemble(&mut block, "2300 is not the end").is_none());
        let reply = assemble(&mut block, "230 Logged in").unwrap().unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "Welcome\n be nice\n2300 is not the end\nLogged in");
        assert!(block.is_none());
    }

    #[test]
    fn malformed_line_outside_block_is_an_error() {
        let mut block = None;
        assert!(matches!(
            assemble(&mut block, "garbage"),
            Some(Err(ControlError::MalformedReply(_)))
        ));
    }

    #[tokio::test]
    async fn skips_preliminary_replies() {
        let (slot, connected) = shared();
        let (request, reply) = PendingRequest::new("PASV", &[227]);
        slot.lock().await.install(request);

        let (mut server, client) = tokio::io::duplex(256);
        let task = tokio::spawn(run_reply_loop(client, slot.clone(), connected.clone(), "test".into()));

        server
            .write_all(b"150 noise\n227 Entering Passive Mode (127,0,0,1,4,1)\n")
            .await
            .unwrap();
        let reply = reply.await.unwrap();
        assert_eq!(reply.code, 227);

        drop(server);
        task.await.unwrap();
        assert!(!connected.load(Ordering::SeqCst));
        assert!(slot.lock().await.closed);
    }

    #[tokio::test]
    async fn unexpected_final_reply_is_delivered() {
        let (slot, connected) = shared();
        let (request, reply) = PendingRequest::new("PASV", &[227]);
        slot.lock().await.install(request);

        let (mut server, client) = tokio::io::duplex(256);
        let task = tokio::spawn(run_reply_loop(client, slot.clone(), connected, "test".into()));

        server.write_all(b"200 PASV ignored\n").await.unwrap();
        assert_eq!(reply.await.unwrap(), Reply::new(200, "PASV ignored"));

        drop(server);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn late_completion_of_abandoned_transfer_is_dropped() {
        let (slot, connected) = shared();
        let (retr, retr_reply) = PendingRequest::new("RETR a", &[226, 250]);
        slot.lock().await.install(retr);
        drop(retr_reply);
        let (cwd, cwd_reply) = PendingRequest::new("CWD pub", &[250]);
        slot.lock().await.install(cwd);

        let (mut server, client) = tokio::io::duplex(256);
        let task = tokio::spawn(run_reply_loop(client, slot.clone(), connected, "test".into()));

        server
            .write_all(b"226 Transfer complete\n250 Directory changed\n")
            .await
            .unwrap();
        assert_eq!(cwd_reply.await.unwrap().code, 250);

        drop(server);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn service_closing_without_pending_request_ends_loop() {
        let (slot, connected) = shared();
        let (mut server, client) = tokio::io::duplex(256);
        let task = tokio::spawn(run_reply_loop(client, slot.clone(), connected.clone(), "test".into()));

        server.write_all(b"421 Service not available\n").await.unwrap();
        task.await.unwrap();
        assert!(!connected.load(Ordering::SeqCst));
        assert!(slot.lock().await.pending.is_none());
    }

    #[tokio::test]
    async fn clean_close_fails_waiting_request() {
        let (slot, connected) = shared();
        let (request, reply) = PendingRequest::new("NOOP", &[200]);
        slot.lock().await.pending = Some(request);

        let (server, client) = tokio::io::duplex(256);
        let task = tokio::spawn(run_reply_loop(client, slot.clone(), connected.clone(), "test".into()));
        drop(server);

        assert!(matches!(reply.await, Err(ControlError::ConnectionClosed)));
        task.await.unwrap();
        assert!(!connected.load(Ordering::SeqCst));
    }
}
