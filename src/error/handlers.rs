//! Error handlers
//!
//! Reporting helpers shared by the session layer and the shell.

use crate::error::types::{ControlError, FtpClientError, TransferError};
use log::error;

/// Log an FTP client error
pub fn report_error(err: &FtpClientError) {
    error!("FTP Client Error: {}", err);
}

/// The server reply code behind an error, when the server caused it
pub fn error_reply_code(err: &FtpClientError) -> Option<u16> {
    match err {
        FtpClientError::Login(reply) => Some(reply.code),
        FtpClientError::Control(ControlError::GreetingRefused(reply)) => Some(reply.code),
        FtpClientError::Transfer(
            TransferError::PassiveRejected(reply)
            | TransferError::PortRejected(reply)
            | TransferError::Rejected(reply),
        ) => Some(reply.code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LocalError;
    use crate::protocol::Reply;

    #[test]
    fn maps_server_caused_errors_to_codes() {
        let err = FtpClientError::Transfer(TransferError::Rejected(Reply::new(550, "No such file")));
        assert_eq!(error_reply_code(&err), Some(550));

        let err = FtpClientError::Login(Reply::new(530, "Login incorrect"));
        assert_eq!(error_reply_code(&err), Some(530));

        let err = FtpClientError::Local(LocalError::SourceMissing("a.txt".into()));
        assert_eq!(error_reply_code(&err), None);
    }
}
