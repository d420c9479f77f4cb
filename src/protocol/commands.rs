//! Module `commands`
//!
//! Outgoing FTP commands and the replies each one is expected to produce.

use std::fmt;
use std::net::SocketAddrV4;

use crate::protocol::responses::*;

/// An FTP command sent on the control connection.
///
/// Each variant renders to its wire text through `Display`; the line
/// terminator is appended by the control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    USER(String),
    PASS(String),
    /// `TYPE I`; the client always transfers in binary
    TYPE,
    PORT(SocketAddrV4),
    PASV,
    LIST(Option<String>),
    RETR(String),
    STOR(String),
    DELE(String),
    MKD(String),
    RMD(String),
    CWD(String),
    CDUP,
    SITE(String),
    QUIT,
    /// Arbitrary command text, sent verbatim
    Raw(String),
}

impl Command {
    /// Reply codes that complete this command successfully.
    ///
    /// An empty set means any final reply (code 200 and above) completes it.
    /// For transfer commands these are the codes of the deferred completion
    /// reply, not of the preliminary `150`.
    pub fn expected_replies(&self) -> &'static [u16] {
        match self {
            Command::USER(_) => &[LOGGED_IN, NEED_PASSWORD, NEED_ACCOUNT],
            Command::PASS(_) => &[LOGGED_IN, COMMAND_SUPERFLUOUS, NEED_ACCOUNT],
            Command::TYPE | Command::PORT(_) => &[COMMAND_OK],
            Command::PASV => &[ENTERING_PASSIVE_MODE],
            Command::LIST(_) | Command::RETR(_) | Command::STOR(_) => TRANSFER_DONE,
            Command::DELE(_) | Command::RMD(_) | Command::CWD(_) => &[FILE_ACTION_OK],
            Command::MKD(_) => &[PATH_CREATED],
            Command::CDUP => &[COMMAND_OK, FILE_ACTION_OK],
            Command::QUIT => &[SERVICE_CLOSING],
            Command::SITE(_) | Command::Raw(_) => &[],
        }
    }

    /// Text safe to write to logs: the password is masked.
    pub fn log_form(&self) -> String {
        match self {
            Command::PASS(_) => "PASS ****".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::USER(name) => write!(f, "USER {name}"),
            Command::PASS(password) => write!(f, "PASS {password}"),
            Command::TYPE => write!(f, "TYPE I"),
            Command::PORT(addr) => {
                let [h1, h2, h3, h4] = addr.ip().octets();
                let port = addr.port();
                write!(f, "PORT {h1},{h2},{h3},{h4},{},{}", port >> 8, port & 0xff)
            }
            Command::PASV => write!(f, "PASV"),
            Command::LIST(None) => write!(f, "LIST"),
            Command::LIST(Some(target)) => write!(f, "LIST {target}"),
            Command::RETR(name) => write!(f, "RETR {name}"),
            Command::STOR(name) => write!(f, "STOR {name}"),
            Command::DELE(name) => write!(f, "DELE {name}"),
            Command::MKD(name) => write!(f, "MKD {name}"),
            Command::RMD(name) => write!(f, "RMD {name}"),
            Command::CWD(path) => write!(f, "CWD {path}"),
            Command::CDUP => write!(f, "CDUP"),
            Command::SITE(args) => write!(f, "SITE {args}"),
            Command::QUIT => write!(f, "QUIT"),
            Command::Raw(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn renders_port_announcement() {
        let addr = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 51210);
        assert_eq!(Command::PORT(addr).to_string(), "PORT 192,168,1,20,200,10");
    }

    #[test]
    fn renders_listing_with_and_without_target() {
        assert_eq!(Command::LIST(None).to_string(), "LIST");
        assert_eq!(Command::LIST(Some("docs".into())).to_string(), "LIST docs");
    }

    #[test]
    fn masks_password_in_logs() {
        let pass = Command::PASS("hunter2".into());
        assert_eq!(pass.to_string(), "PASS hunter2");
        assert_eq!(pass.log_form(), "PASS ****");
        assert_eq!(Command::USER("bob".into()).log_form(), "USER bob");
    }

    #[test]
    fn transfer_commands_expect_completion_codes() {
        assert_eq!(Command::RETR("a".into()).expected_replies(), &[226, 250]);
        assert_eq!(Command::PASV.expected_replies(), &[227]);
        assert!(Command::SITE("CHMOD 644 a".into()).expected_replies().is_empty());
    }
}
