//! Error handling
//!
//! Defines error types and handling for the FTP client.

pub mod handlers;
pub mod types;

pub use handlers::{error_reply_code, report_error};
pub use types::*;
