//! Transfer module for the FTP client
//!
//! Negotiates data channels in active or passive mode and drives listing,
//! download and upload operations over them.

pub mod data_channel;
pub mod modes;
pub mod negotiator;
pub mod operations;
pub mod pump;
pub mod results;

pub use data_channel::{DataChannel, Direction};
pub use modes::TransferMode;
pub use negotiator::{parse_passive_address, prepare};
pub use operations::{OperationState, TransferKind, TransferOperation};
pub use results::TransferReport;
