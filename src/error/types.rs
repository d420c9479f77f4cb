//! Error types
//!
//! Defines domain-specific error types for each layer of the FTP client.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::Reply;

/// Control connection errors
#[derive(Debug)]
pub enum ControlError {
    ConnectFailed(String, io::Error),
    ConnectTimeout(String),
    /// The server answered the connection with something other than `220`.
    GreetingRefused(Reply),
    /// The reply loop has exited; no further commands can be sent.
    NotConnected,
    InvalidCommand(String),
    MalformedReply(String),
    ConnectionClosed,
    Io(io::Error),
    ReplyTimeout(String, Duration),
    /// The pending request was discarded before a reply arrived.
    ReplyDropped,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::ConnectFailed(host, e) => {
                write!(f, "Could not connect to {}: {}", host, e)
            }
            ControlError::ConnectTimeout(host) => write!(f, "Timed out connecting to {}", host),
            ControlError::GreetingRefused(reply) => write!(f, "Server refused session: {}", reply),
            ControlError::NotConnected => write!(f, "Not connected"),
            ControlError::InvalidCommand(cmd) => {
                write!(f, "Command contains a line terminator: {:?}", cmd)
            }
            ControlError::MalformedReply(line) => write!(f, "Malformed reply line: {:?}", line),
            ControlError::ConnectionClosed => write!(f, "Control connection closed"),
            ControlError::Io(e) => write!(f, "Control connection I/O error: {}", e),
            ControlError::ReplyTimeout(cmd, after) => {
                write!(f, "No reply to {} within {:?}", cmd, after)
            }
            ControlError::ReplyDropped => write!(f, "Reply was abandoned before it arrived"),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<io::Error> for ControlError {
    fn from(error: io::Error) -> Self {
        ControlError::Io(error)
    }
}

/// Data channel negotiation and transfer errors
#[derive(Debug)]
pub enum TransferError {
    Control(ControlError),
    PassiveRejected(Reply),
    PortRejected(Reply),
    /// The server refused the transfer command itself (LIST/RETR/STOR).
    Rejected(Reply),
    MalformedPassiveReply(String),
    UnsupportedAddressFamily(SocketAddr),
    ListenerSetupFailed(io::Error),
    AcceptFailed(io::Error),
    AcceptTimeout(Duration),
    DataConnectFailed(SocketAddr, io::Error),
    DataIo(io::Error),
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Control(e) => write!(f, "{}", e),
            TransferError::PassiveRejected(reply) => {
                write!(f, "Passive mode refused: {}", reply)
            }
            TransferError::PortRejected(reply) => write!(f, "PORT command refused: {}", reply),
            TransferError::Rejected(reply) => write!(f, "Transfer refused: {}", reply),
            TransferError::MalformedPassiveReply(text) => {
                write!(f, "No address found in passive reply: {}", text)
            }
            TransferError::UnsupportedAddressFamily(addr) => {
                write!(f, "Active mode needs an IPv4 control connection, local address is {}", addr)
            }
            TransferError::ListenerSetupFailed(e) => {
                write!(f, "Failed to open data listener: {}", e)
            }
            TransferError::AcceptFailed(e) => write!(f, "Failed to accept data connection: {}", e),
            TransferError::AcceptTimeout(after) => {
                write!(f, "Server did not open the data connection within {:?}", after)
            }
            TransferError::DataConnectFailed(addr, e) => {
                write!(f, "Failed to connect data channel to {}: {}", addr, e)
            }
            TransferError::DataIo(e) => write!(f, "Data channel I/O error: {}", e),
            TransferError::InvalidState { expected, actual } => {
                write!(f, "Operation is {}, expected {}", actual, expected)
            }
        }
    }
}

impl std::error::Error for TransferError {}

impl From<ControlError> for TransferError {
    fn from(error: ControlError) -> Self {
        TransferError::Control(error)
    }
}

/// Local resource errors, raised before any network activity
#[derive(Debug)]
pub enum LocalError {
    DestinationExists(String),
    SourceMissing(String),
    SourceNotAFile(String),
    Io(String, io::Error),
}

impl fmt::Display for LocalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalError::DestinationExists(name) => write!(f, "{} already exists", name),
            LocalError::SourceMissing(name) => write!(f, "{} does not exist", name),
            LocalError::SourceNotAFile(name) => write!(f, "{} is not a regular file", name),
            LocalError::Io(name, e) => write!(f, "Local file {}: {}", name, e),
        }
    }
}

impl std::error::Error for LocalError {}

/// General FTP client error that encompasses all error types
#[derive(Debug)]
pub enum FtpClientError {
    Control(ControlError),
    Transfer(TransferError),
    Local(LocalError),
    Login(Reply),
    Config(config::ConfigError),
}

impl fmt::Display for FtpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpClientError::Control(e) => write!(f, "Control error: {}", e),
            FtpClientError::Transfer(e) => write!(f, "Transfer error: {}", e),
            FtpClientError::Local(e) => write!(f, "Local error: {}", e),
            FtpClientError::Login(reply) => write!(f, "Login failed: {}", reply),
            FtpClientError::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for FtpClientError {}

impl From<ControlError> for FtpClientError {
    fn from(error: ControlError) -> Self {
        FtpClientError::Control(error)
    }
}

impl From<TransferError> for FtpClientError {
    fn from(error: TransferError) -> Self {
        match error {
            TransferError::Control(e) => FtpClientError::Control(e),
            other => FtpClientError::Transfer(other),
        }
    }
}

impl From<LocalError> for FtpClientError {
    fn from(error: LocalError) -> Self {
        FtpClientError::Local(error)
    }
}

impl From<config::ConfigError> for FtpClientError {
    fn from(error: config::ConfigError) -> Self {
        FtpClientError::Config(error)
    }
}
