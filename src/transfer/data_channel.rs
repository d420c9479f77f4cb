//! Module `data_channel`
//!
//! The data socket of a single transfer. It is owned by the operation that
//! opened it and released exactly once, when the operation finishes.

use log::{debug, info};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Which way the bytes flow, seen from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// An established data connection.
#[derive(Debug)]
pub struct DataChannel {
    stream: Option<TcpStream>,
    direction: Direction,
    peer: Option<SocketAddr>,
}

impl DataChannel {
    pub fn new(stream: TcpStream, direction: Direction) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            stream: Some(stream),
            direction,
            peer,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The socket, while the channel is still open.
    pub fn stream_mut(&mut self) -> Option<&mut TcpStream> {
        self.stream.as_mut()
    }

    /// Shuts the socket down and drops it. Later calls do nothing.
    pub async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        if let Err(e) = stream.shutdown().await {
            debug!("Data socket shutdown: {}", e);
        }
        match self.peer {
            Some(peer) => info!("Closed data connection with {}", peer),
            None => info!("Closed data connection"),
        }
    }
}
