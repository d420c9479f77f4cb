//! Configuration management for the RAX FTP client
//!
//! Separates connection settings (where and how to log in) from transfer
//! settings (how data channels behave). Both are read from an optional
//! `client.toml` and overridden by `RAX_FTP_CLIENT_*` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::transfer::TransferMode;

/// Complete client configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,

    #[serde(flatten)]
    pub transfer: TransferConfig,
}

/// Control connection settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server host name or address
    /// Environment: RAX_FTP_CLIENT_HOST
    pub host: String,

    /// Server control port
    pub port: u16,

    pub username: String,
    pub password: String,

    pub connect_timeout_secs: u64,

    /// Upper bound on waiting for a reply to a synchronous command
    pub reply_timeout_secs: u64,
}

/// Data channel settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TransferConfig {
    /// `passive` or `active`
    /// Environment: RAX_FTP_CLIENT_TRANSFER_MODE
    pub transfer_mode: TransferMode,

    /// Chunk size for data channel reads and writes
    pub buffer_size: usize,

    /// How long a data connection may take to establish, in either mode
    pub data_timeout_secs: u64,

    /// How long to wait for the completion reply once the data stream has
    /// ended (or for the data stream once the completion reply has arrived)
    pub grace_period_ms: u64,

    /// Directory local file names are resolved against
    pub local_root: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21,
            username: "anonymous".to_string(),
            password: String::new(),
            connect_timeout_secs: 10,
            reply_timeout_secs: 60,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            transfer_mode: TransferMode::Passive,
            buffer_size: 8192,
            data_timeout_secs: 30,
            grace_period_ms: 1000,
            local_root: ".".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from client.toml (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("client")
    }

    /// Load configuration from the named file (extension optional, file optional)
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("RAX_FTP_CLIENT").try_parsing(true))
            .build()?;

        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.connection.host.trim().is_empty() {
            return Err(config::ConfigError::Message("host cannot be empty".into()));
        }

        if self.connection.port == 0 {
            return Err(config::ConfigError::Message("port cannot be 0".into()));
        }

        if self.connection.connect_timeout_secs == 0 || self.connection.reply_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "connection timeouts must be greater than 0".into(),
            ));
        }

        if self.transfer.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.transfer.data_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "data_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl ConnectionConfig {
    /// Host and port as a connectable address string
    pub fn control_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    /// Overrides settings from a `user:password@host[:port]` target.
    /// The credentials and the port are optional.
    pub fn apply_target(&mut self, target: &str) -> Result<(), config::ConfigError> {
        let (credentials, address) = match target.rsplit_once('@') {
            Some((credentials, address)) => (Some(credentials), address),
            None => (None, target),
        };

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| config::ConfigError::Message(format!("invalid port in '{}'", address)))?;
                (host, Some(port))
            }
            None => (address, None),
        };

        if host.is_empty() {
            return Err(config::ConfigError::Message(format!(
                "missing host in '{}'",
                address
            )));
        }

        if let Some(credentials) = credentials {
            match credentials.split_once(':') {
                Some((user, password)) => {
                    self.username = user.to_string();
                    self.password = password.to_string();
                }
                None => self.username = credentials.to_string(),
            }
        }

        self.host = host.to_string();
        if let Some(port) = port {
            self.port = port;
        }
        Ok(())
    }
}

impl TransferConfig {
    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn local_root_path(&self) -> PathBuf {
        PathBuf::from(&self.local_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.port, 21);
        assert_eq!(config.transfer.transfer_mode, TransferMode::Passive);
        assert_eq!(config.transfer.grace_period(), Duration::from_millis(1000));
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "host = \"ftp.example.com\"").unwrap();
        writeln!(file, "transfer_mode = \"active\"").unwrap();
        writeln!(file, "grace_period_ms = 250").unwrap();
        drop(file);

        let config = ClientConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.connection.host, "ftp.example.com");
        assert_eq!(config.connection.port, 21);
        assert_eq!(config.transfer.transfer_mode, TransferMode::Active);
        assert_eq!(config.transfer.grace_period_ms, 250);
        assert_eq!(config.transfer.buffer_size, 8192);
    }

    #[test]
    fn applies_command_line_target() {
        let mut connection = ConnectionConfig::default();
        connection.apply_target("alice:s3cret@files.local:2121").unwrap();
        assert_eq!(connection.username, "alice");
        assert_eq!(connection.password, "s3cret");
        assert_eq!(connection.control_address(), "files.local:2121");

        let mut connection = ConnectionConfig::default();
        connection.apply_target("10.0.0.5").unwrap();
        assert_eq!(connection.username, "anonymous");
        assert_eq!(connection.control_address(), "10.0.0.5:21");

        assert!(connection.apply_target("bob@host:port").is_err());
        assert!(connection.apply_target("bob@").is_err());
    }

    #[test]
    fn rejects_zero_port_and_buffer() {
        let mut config = ClientConfig::default();
        config.connection.port = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.transfer.buffer_size = 0;
        assert!(config.validate().is_err());
    }
}
