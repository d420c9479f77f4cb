//! Client session layer
//!
//! `FtpSession` ties a control connection to a local store and a transfer
//! mode; `shell` is the line-oriented front end over it.

pub mod session;
pub mod shell;

pub use session::FtpSession;
pub use shell::{ShellCommand, parse_input, run_shell};
