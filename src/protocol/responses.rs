//! FTP reply handling
//!
//! Defines reply codes and the `Reply` record delivered to callers.

use std::fmt;

pub const COMMAND_OK: u16 = 200;
pub const COMMAND_SUPERFLUOUS: u16 = 202;
pub const SERVICE_READY: u16 = 220;
pub const SERVICE_CLOSING: u16 = 221;
pub const CLOSING_DATA_CONNECTION: u16 = 226;
pub const ENTERING_PASSIVE_MODE: u16 = 227;
pub const LOGGED_IN: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;

pub const NEED_PASSWORD: u16 = 331;
pub const NEED_ACCOUNT: u16 = 332;

pub const SERVICE_NOT_AVAILABLE: u16 = 421;

/// Codes that confirm a data transfer finished on the server side.
pub const TRANSFER_DONE: &[u16] = &[CLOSING_DATA_CONNECTION, FILE_ACTION_OK];

/// A complete reply from the server: three-digit status code plus message text.
///
/// For multi-line replies the text holds every line joined with `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// 1xx: preliminary reply, another one follows.
    pub fn is_preliminary(&self) -> bool {
        self.code < 200
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx: the server expects a follow-up command.
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// 4xx and 5xx
    pub fn is_error(&self) -> bool {
        self.code >= 400
    }

    /// 421: the server is shutting the control connection down.
    pub fn is_service_closing(&self) -> bool {
        self.code == SERVICE_NOT_AVAILABLE
    }

    /// Whether the code is in `codes`.
    pub fn is_one_of(&self, codes: &[u16]) -> bool {
        codes.contains(&self.code)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}
