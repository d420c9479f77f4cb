//! FTP Transfer modes
//!
//! Which side opens the data connection.

use serde::Deserialize;
use std::fmt;

/// FTP transfer modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// The client listens and announces its address with `PORT`.
    Active,
    /// The client connects to the address the server returns from `PASV`.
    Passive,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Active => write!(f, "ACTIVE"),
            TransferMode::Passive => write!(f, "PASSIVE"),
        }
    }
}
