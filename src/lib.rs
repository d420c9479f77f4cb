//! RAX FTP client
//!
//! Control connection with a background reply loop, active/passive data
//! channel negotiation and listing/download/upload transfer operations.

pub mod client;
pub mod config;
pub mod control;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use client::FtpSession;
pub use config::{ClientConfig, ConnectionConfig, TransferConfig};
pub use control::{ControlConnection, DeferredReply};
pub use error::FtpClientError;
pub use protocol::{Command, Reply};
pub use transfer::{TransferMode, TransferOperation, TransferReport};
