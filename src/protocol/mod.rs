//! FTP control protocol
//!
//! Outgoing command rendering, reply line parsing and reply codes.

pub mod commands;
pub mod parser;
pub mod responses;

pub use commands::Command;
pub use parser::{ReplyBuffer, ReplyLine, next_line, parse_reply_line};
pub use responses::Reply;
