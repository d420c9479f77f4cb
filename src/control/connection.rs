//! Module `connection`
//!
//! The control connection handle. Commands are written here; replies are
//! read by the background reply loop and handed back through the pending
//! request slot.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::ConnectionConfig;
use crate::control::pending::{DeferredReply, PendingRequest, ReplySlot};
use crate::control::reply_loop::{mark_closed, run_reply_loop};
use crate::error::ControlError;
use crate::protocol::parser::LINE_TERMINATOR;
use crate::protocol::responses::SERVICE_READY;
use crate::protocol::{Command, Reply};
use crate::utils::validation::is_valid_command_text;

/// An open control connection to an FTP server.
///
/// Only one command may be in flight at a time; the `&mut self` receivers
/// of the send methods enforce that for a single owner.
pub struct ControlConnection {
    writer: OwnedWriteHalf,
    slot: Arc<Mutex<ReplySlot>>,
    connected: Arc<AtomicBool>,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    greeting: Reply,
    reply_timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl ControlConnection {
    /// Connects to the configured server and waits for its `220` greeting.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ControlError> {
        let address = config.control_address();
        info!("Connecting to {}", address);

        let stream = match timeout(config.connect_timeout(), TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ControlError::ConnectFailed(address, e)),
            Err(_) => return Err(ControlError::ConnectTimeout(address)),
        };

        Self::from_stream(stream, config.reply_timeout()).await
    }

    /// Takes over an already connected socket and waits for the greeting.
    pub async fn from_stream(stream: TcpStream, reply_timeout: Duration) -> Result<Self, ControlError> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, writer) = stream.into_split();

        // Installed before the loop starts so the greeting cannot be missed.
        let (request, greeting) = PendingRequest::new("greeting", &[SERVICE_READY]);
        let mut initial = ReplySlot::default();
        initial.install(request);
        let slot = Arc::new(Mutex::new(initial));
        let connected = Arc::new(AtomicBool::new(true));

        let reader_task = tokio::spawn(run_reply_loop(
            read_half,
            Arc::clone(&slot),
            Arc::clone(&connected),
            peer_addr.to_string(),
        ));

        let greeting = match timeout(reply_timeout, greeting).await {
            Ok(Ok(reply)) if reply.code == SERVICE_READY => reply,
            Ok(Ok(reply)) => {
                reader_task.abort();
                return Err(ControlError::GreetingRefused(reply));
            }
            Ok(Err(e)) => {
                reader_task.abort();
                return Err(e);
            }
            Err(_) => {
                reader_task.abort();
                return Err(ControlError::ReplyTimeout("greeting".into(), reply_timeout));
            }
        };

        info!("Connected to {} from {}: {}", peer_addr, local_addr, greeting);

        Ok(Self {
            writer,
            slot,
            connected,
            local_addr,
            peer_addr,
            greeting,
            reply_timeout,
            reader_task,
        })
    }

    /// Sends `command` and waits for the reply that completes it.
    ///
    /// The returned reply may carry an error code (400 and up); it is up to
    /// the caller to check it against what it expected.
    pub async fn send_and_wait(
        &mut self,
        command: &Command,
        expected: &[u16],
    ) -> Result<Reply, ControlError> {
        let reply = self.submit(command, expected).await?;

        match timeout(self.reply_timeout, reply).await {
            Ok(result) => result,
            Err(_) => {
                self.slot.lock().await.abandon();
                warn!("No reply to {} within {:?}", command.log_form(), self.reply_timeout);
                Err(ControlError::ReplyTimeout(command.log_form(), self.reply_timeout))
            }
        }
    }

    /// Sends `command` and returns immediately with a future for its reply.
    ///
    /// No other command may be sent until that future has resolved.
    pub async fn send_deferred(
        &mut self,
        command: &Command,
        expected: &[u16],
    ) -> Result<DeferredReply, ControlError> {
        self.submit(command, expected).await
    }

    async fn submit(&mut self, command: &Command, expected: &[u16]) -> Result<DeferredReply, ControlError> {
        let text = command.to_string();
        if !is_valid_command_text(&text) {
            return Err(ControlError::InvalidCommand(command.log_form()));
        }

        let (request, reply) = PendingRequest::new(command.log_form(), expected);
        {
            let mut slot = self.slot.lock().await;
            if slot.closed {
                return Err(ControlError::NotConnected);
            }
            slot.install(request);
        }

        info!("Sending: {}", command.log_form());
        let mut line = text.into_bytes();
        line.push(LINE_TERMINATOR);
        if let Err(e) = self.writer.write_all(&line).await {
            self.slot.lock().await.pending = None;
            return Err(ControlError::Io(e));
        }

        Ok(reply)
    }

    /// `false` once the reply loop has exited.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn greeting(&self) -> &Reply {
        &self.greeting
    }

    /// Shuts the connection down. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Control socket shutdown: {}", e);
        }
        self.reader_task.abort();
        mark_closed(&self.slot, &self.connected, ControlError::ConnectionClosed).await;
        info!("Closed control connection to {}", self.peer_addr);
    }
}

impl Drop for ControlConnection {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
