//! Client session management
//!
//! Connects, logs in and runs one operation at a time over the control
//! connection.

use log::{info, warn};
use std::sync::Arc;

use crate::config::{ClientConfig, ConnectionConfig, TransferConfig};
use crate::control::ControlConnection;
use crate::error::{FtpClientError, TransferError};
use crate::protocol::Command;
use crate::protocol::Reply;
use crate::protocol::responses::{COMMAND_OK, COMMAND_SUPERFLUOUS, LOGGED_IN, NEED_PASSWORD};
use crate::storage::{LocalFilesystem, LocalStore};
use crate::transfer::{TransferMode, TransferOperation, TransferReport};

/// A logged-in FTP session
pub struct FtpSession {
    control: ControlConnection,
    store: Arc<dyn LocalStore>,
    settings: TransferConfig,
    mode: TransferMode,
}

impl FtpSession {
    /// Connects, logs in and switches to binary type. Local files live
    /// under the configured `local_root`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, FtpClientError> {
        let store = Arc::new(LocalFilesystem::new(config.transfer.local_root_path()));
        info!("Local files under {}", store.root().display());
        Self::connect_with_store(config, store).await
    }

    pub async fn connect_with_store(
        config: &ClientConfig,
        store: Arc<dyn LocalStore>,
    ) -> Result<Self, FtpClientError> {
        let control = ControlConnection::connect(&config.connection).await?;
        let mut session = Self {
            control,
            store,
            settings: config.transfer.clone(),
            mode: config.transfer.transfer_mode,
        };

        if let Err(e) = session.login(&config.connection).await {
            session.control.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn login(&mut self, connection: &ConnectionConfig) -> Result<(), FtpClientError> {
        let user = Command::USER(connection.username.clone());
        let mut reply = self.control.send_and_wait(&user, user.expected_replies()).await?;

        if reply.code == NEED_PASSWORD {
            let pass = Command::PASS(connection.password.clone());
            reply = self.control.send_and_wait(&pass, pass.expected_replies()).await?;
        }

        if reply.code != LOGGED_IN && reply.code != COMMAND_SUPERFLUOUS {
            return Err(FtpClientError::Login(reply));
        }
        info!("Logged in as {}", connection.username);

        let binary = self
            .control
            .send_and_wait(&Command::TYPE, &[COMMAND_OK])
            .await?;
        if binary.code != COMMAND_OK {
            return Err(TransferError::Rejected(binary).into());
        }
        Ok(())
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TransferMode) {
        info!("Transfer mode set to {}", mode);
        self.mode = mode;
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_connected()
    }

    pub fn control(&mut self) -> &mut ControlConnection {
        &mut self.control
    }

    /// Directory listing of `target`, or of the current directory.
    pub async fn list(&mut self, target: Option<String>) -> Result<TransferReport, FtpClientError> {
        let operation = TransferOperation::listing(target);
        self.run(operation).await
    }

    pub async fn download(
        &mut self,
        remote: &str,
        local: Option<String>,
    ) -> Result<TransferReport, FtpClientError> {
        let operation = TransferOperation::download(Arc::clone(&self.store), remote, local);
        self.run(operation).await
    }

    pub async fn upload(
        &mut self,
        local: &str,
        remote: Option<String>,
    ) -> Result<TransferReport, FtpClientError> {
        let operation = TransferOperation::upload(Arc::clone(&self.store), local, remote);
        self.run(operation).await
    }

    async fn run(&mut self, operation: TransferOperation) -> Result<TransferReport, FtpClientError> {
        let settings = self.settings.clone();
        operation.run(&mut self.control, self.mode, &settings).await
    }

    pub async fn delete(&mut self, name: &str) -> Result<Reply, FtpClientError> {
        self.simple(Command::DELE(name.to_string())).await
    }

    pub async fn make_dir(&mut self, name: &str) -> Result<Reply, FtpClientError> {
        self.simple(Command::MKD(name.to_string())).await
    }

    pub async fn remove_dir(&mut self, name: &str) -> Result<Reply, FtpClientError> {
        self.simple(Command::RMD(name.to_string())).await
    }

    pub async fn change_dir(&mut self, name: &str) -> Result<Reply, FtpClientError> {
        self.simple(Command::CWD(name.to_string())).await
    }

    pub async fn change_dir_up(&mut self) -> Result<Reply, FtpClientError> {
        self.simple(Command::CDUP).await
    }

    pub async fn site(&mut self, args: &str) -> Result<Reply, FtpClientError> {
        self.simple(Command::SITE(args.to_string())).await
    }

    /// Error replies come back as `Ok` so the caller can show them.
    async fn simple(&mut self, command: Command) -> Result<Reply, FtpClientError> {
        let reply = self
            .control
            .send_and_wait(&command, command.expected_replies())
            .await?;
        if reply.is_error() {
            warn!("{} refused: {}", command.log_form(), reply);
        }
        Ok(reply)
    }

    /// Says goodbye and closes the control connection.
    pub async fn quit(&mut self) -> Option<Reply> {
        let reply = if self.control.is_connected() {
            match self.control.send_and_wait(&Command::QUIT, Command::QUIT.expected_replies()).await {
                Ok(reply) => Some(reply),
                Err(e) => {
                    warn!("QUIT failed: {}", e);
                    None
                }
            }
        } else {
            None
        };
        self.control.close().await;
        reply
    }
}
