//! Transfer operations
//!
//! A single listing, download or upload, driven through
//! Created → Initialized → Processing → Finished. `finish` always releases
//! the data channel and the local resource, whatever happened before it.

use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;

use crate::config::TransferConfig;
use crate::control::{ControlConnection, DeferredReply};
use crate::error::{FtpClientError, LocalError, TransferError};
use crate::protocol::{Command, Reply};
use crate::storage::{DataSink, DataSource, LocalStore};
use crate::transfer::pump::{pump_inbound, pump_outbound};
use crate::transfer::{DataChannel, Direction, TransferMode, TransferReport, prepare};

/// Lifecycle of a transfer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Initialized,
    Processing,
    Finished,
}

impl OperationState {
    fn name(self) -> &'static str {
        match self {
            OperationState::Created => "created",
            OperationState::Initialized => "initialized",
            OperationState::Processing => "processing",
            OperationState::Finished => "finished",
        }
    }
}

/// The three kinds of transfer and their local state.
pub enum TransferKind {
    Listing {
        target: Option<String>,
        text: Vec<u8>,
    },
    Download {
        remote: String,
        local: String,
        store: Arc<dyn LocalStore>,
        /// Created on the first received chunk
        destination: Option<Box<dyn DataSink>>,
    },
    Upload {
        local: String,
        remote: String,
        store: Arc<dyn LocalStore>,
        source: Option<Box<dyn DataSource>>,
    },
}

impl TransferKind {
    pub fn command(&self) -> Command {
        match self {
            TransferKind::Listing { target, .. } => Command::LIST(target.clone()),
            TransferKind::Download { remote, .. } => Command::RETR(remote.clone()),
            TransferKind::Upload { remote, .. } => Command::STOR(remote.clone()),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TransferKind::Upload { .. } => Direction::Upload,
            _ => Direction::Download,
        }
    }

    /// Local preconditions, checked before any socket is opened.
    fn check_local(&self) -> Result<(), LocalError> {
        match self {
            TransferKind::Listing { .. } => Ok(()),
            TransferKind::Download { local, store, .. } if store.exists(local) => {
                Err(LocalError::DestinationExists(store.display_name(local)))
            }
            TransferKind::Upload { local, store, .. } if !store.exists(local) => {
                Err(LocalError::SourceMissing(store.display_name(local)))
            }
            TransferKind::Upload { local, store, .. } if !store.is_file(local) => {
                Err(LocalError::SourceNotAFile(store.display_name(local)))
            }
            _ => Ok(()),
        }
    }

    /// Opens the upload source, so an unreadable file fails before `STOR`.
    fn open_source(&mut self) -> Result<(), LocalError> {
        if let TransferKind::Upload {
            local,
            store,
            source,
            ..
        } = self
        {
            let opened = store
                .open(local.as_str())
                .map_err(|e| LocalError::Io(store.display_name(local), e))?;
            *source = Some(opened);
        }
        Ok(())
    }

    /// Consumes one chunk received on the data channel.
    fn accept_chunk(&mut self, chunk: &[u8]) -> Result<(), FtpClientError> {
        match self {
            TransferKind::Listing { text, .. } => text.extend_from_slice(chunk),
            TransferKind::Download {
                local,
                store,
                destination,
                ..
            } => {
                let sink = match destination {
                    Some(sink) => sink,
                    None => {
                        let created = store
                            .create(local)
                            .map_err(|e| LocalError::Io(local.clone(), e))?;
                        destination.insert(created)
                    }
                };
                sink.write_chunk(chunk)
                    .map_err(|e| LocalError::Io(local.clone(), e))?;
            }
            TransferKind::Upload { .. } => {}
        }
        Ok(())
    }
}

/// One data transfer on a control connection.
pub struct TransferOperation {
    kind: TransferKind,
    state: OperationState,
    mode: Option<TransferMode>,
    data_channel: Option<DataChannel>,
    deferred: Option<DeferredReply>,
    buffer_size: usize,
    grace: Duration,
    bytes: u64,
    completion: Option<Reply>,
    stalled: bool,
    /// The server refused the transfer after it started.
    rejected: bool,
}

impl TransferOperation {
    fn new(kind: TransferKind) -> Self {
        let defaults = TransferConfig::default();
        Self {
            kind,
            state: OperationState::Created,
            mode: None,
            data_channel: None,
            deferred: None,
            buffer_size: defaults.buffer_size,
            grace: defaults.grace_period(),
            bytes: 0,
            completion: None,
            stalled: false,
            rejected: false,
        }
    }

    /// Lists `target`, or the current remote directory.
    pub fn listing(target: Option<String>) -> Self {
        Self::new(TransferKind::Listing {
            target,
            text: Vec::new(),
        })
    }

    /// Downloads `remote` into `local`, which defaults to the last path
    /// segment of `remote`.
    pub fn download(store: Arc<dyn LocalStore>, remote: impl Into<String>, local: Option<String>) -> Self {
        let remote = remote.into();
        let local = local.unwrap_or_else(|| {
            remote
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or(remote.as_str())
                .to_string()
        });
        Self::new(TransferKind::Download {
            remote,
            local,
            store,
            destination: None,
        })
    }

    /// Uploads `local` as `remote`, which defaults to `local`.
    pub fn upload(store: Arc<dyn LocalStore>, local: impl Into<String>, remote: Option<String>) -> Self {
        let local = local.into();
        let remote = remote.unwrap_or_else(|| local.clone());
        Self::new(TransferKind::Upload {
            local,
            remote,
            store,
            source: None,
        })
    }

    pub fn kind(&self) -> &TransferKind {
        &self.kind
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    /// The mode negotiated in `init`.
    pub fn mode(&self) -> Option<TransferMode> {
        self.mode
    }

    pub fn has_data_channel(&self) -> bool {
        self.data_channel.is_some()
    }

    fn expect_state(&self, expected: OperationState) -> Result<(), TransferError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransferError::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            })
        }
    }

    /// Checks local preconditions, opens the data channel and sends the
    /// transfer command.
    pub async fn init(
        &mut self,
        control: &mut ControlConnection,
        mode: TransferMode,
        settings: &TransferConfig,
    ) -> Result<(), FtpClientError> {
        self.expect_state(OperationState::Created)?;
        self.kind.check_local()?;
        self.kind.open_source()?;

        let command = self.kind.command();
        info!("Starting {} in {} mode", command.log_form(), mode);

        let (channel, deferred) =
            prepare(control, mode, &command, self.kind.direction(), settings).await?;

        self.mode = Some(mode);
        self.buffer_size = settings.buffer_size;
        self.grace = settings.grace_period();
        self.data_channel = Some(channel);
        self.deferred = Some(deferred);
        self.state = OperationState::Initialized;
        Ok(())
    }

    /// Pumps the data while waiting for the server's completion reply.
    pub async fn process(&mut self) -> Result<(), FtpClientError> {
        self.expect_state(OperationState::Initialized)?;
        self.state = OperationState::Processing;

        let missing = TransferError::InvalidState {
            expected: "negotiated",
            actual: "without data channel",
        };
        let Some(mut deferred) = self.deferred.take() else {
            return Err(missing.into());
        };
        let Some(stream) = self.data_channel.as_mut().and_then(DataChannel::stream_mut) else {
            return Err(missing.into());
        };

        let moved = AtomicU64::new(0);
        let buffer_size = self.buffer_size;
        let grace = self.grace;
        let expected = self.kind.command().expected_replies();

        let reconciled = match &mut self.kind {
            TransferKind::Upload { local, source, .. } => {
                let Some(source) = source.as_mut() else {
                    return Err(TransferError::InvalidState {
                        expected: "opened source",
                        actual: "without source",
                    }
                    .into());
                };
                let pump = pump_outbound(stream, &mut **source, buffer_size, &moved, local.as_str());
                reconcile(pump, &mut deferred, expected, grace).await
            }
            kind => {
                let pump = pump_inbound(stream, buffer_size, &moved, |chunk| kind.accept_chunk(chunk));
                reconcile(pump, &mut deferred, expected, grace).await
            }
        };

        self.bytes = moved.load(Ordering::SeqCst);
        self.rejected = matches!(
            reconciled,
            Err(FtpClientError::Transfer(TransferError::Rejected(_)))
        );
        let reconciled = reconciled?;
        self.completion = reconciled.completion;
        self.stalled = reconciled.stalled;

        match &self.completion {
            Some(reply) if !self.stalled => {
                info!("Transfer finished: {} bytes, {}", self.bytes, reply)
            }
            _ => warn!(
                "Transfer stalled after {} bytes; the data may be incomplete",
                self.bytes
            ),
        }
        Ok(())
    }

    /// Releases the data channel and the local resource. Always safe to call.
    pub async fn finish(&mut self) -> Result<TransferReport, FtpClientError> {
        if let Some(mut channel) = self.data_channel.take() {
            channel.close().await;
        }
        self.deferred = None;

        let first = self.state != OperationState::Finished;
        let rejected = self.rejected;
        let completed = !self.stalled && self.completion.as_ref().is_some_and(Reply::is_success);
        let mut listing = None;
        let mut released = Ok(());

        match &mut self.kind {
            TransferKind::Listing { text, .. } => {
                listing = Some(String::from_utf8_lossy(&std::mem::take(text)).into_owned());
            }
            TransferKind::Download {
                local,
                store,
                destination,
                ..
            } if first => {
                let result = match destination.take() {
                    // Whatever arrived before the refusal is not the file.
                    Some(sink) if rejected => {
                        drop(sink);
                        warn!("Removing partial download {}", store.display_name(local));
                        store.remove(local)
                    }
                    Some(mut sink) => sink.finish(),
                    // An empty file still needs to exist locally.
                    None if completed => store.create(local).and_then(|mut sink| sink.finish()),
                    None => Ok(()),
                };
                if let Err(e) = result {
                    released = Err(LocalError::Io(local.clone(), e));
                }
            }
            TransferKind::Upload { source, .. } => {
                source.take();
            }
            TransferKind::Download { .. } => {}
        }

        self.state = OperationState::Finished;
        released?;
        debug!("Released resources of {}", self.kind.command().log_form());

        Ok(TransferReport {
            bytes: self.bytes,
            completion: self.completion.clone(),
            stalled: self.stalled,
            listing,
        })
    }

    /// Runs the whole lifecycle; `finish` runs even when an earlier step fails.
    pub async fn run(
        mut self,
        control: &mut ControlConnection,
        mode: TransferMode,
        settings: &TransferConfig,
    ) -> Result<TransferReport, FtpClientError> {
        let processed = match self.init(control, mode, settings).await {
            Ok(()) => self.process().await,
            Err(e) => Err(e),
        };
        let finished = self.finish().await;

        match processed {
            Ok(()) => finished,
            Err(e) => {
                if let Err(release) = finished {
                    warn!("Cleanup after failed transfer: {}", release);
                }
                Err(e)
            }
        }
    }
}

struct Reconciled {
    completion: Option<Reply>,
    stalled: bool,
}

/// Joins the byte pump with the deferred completion reply.
///
/// Whichever finishes first, the other gets at most `grace` more. A reply
/// outside `expected` cancels the pump at once.
async fn reconcile<P>(
    pump: P,
    deferred: &mut DeferredReply,
    expected: &[u16],
    grace: Duration,
) -> Result<Reconciled, FtpClientError>
where
    P: Future<Output = Result<(), FtpClientError>>,
{
    tokio::pin!(pump);

    tokio::select! {
        pumped = &mut pump => {
            if let Err(e) = pumped {
                // Consume the completion reply so it cannot answer a later command.
                let _ = timeout(grace, &mut *deferred).await;
                return Err(e);
            }
            match timeout(grace, &mut *deferred).await {
                Ok(reply) => {
                    let reply = reply?;
                    if !reply.is_one_of(expected) {
                        return Err(TransferError::Rejected(reply).into());
                    }
                    Ok(Reconciled { completion: Some(reply), stalled: false })
                }
                Err(_) => {
                    warn!("No completion reply within {:?} of the data stream ending", grace);
                    Ok(Reconciled { completion: None, stalled: true })
                }
            }
        }
        reply = &mut *deferred => {
            let reply = reply?;
            if !reply.is_one_of(expected) {
                debug!("Cancelling data pump after {}", reply);
                return Err(TransferError::Rejected(reply).into());
            }
            match timeout(grace, &mut pump).await {
                Ok(pumped) => {
                    pumped?;
                    Ok(Reconciled { completion: Some(reply), stalled: false })
                }
                Err(_) => {
                    warn!("Data stream still open {:?} after {}; cancelling it", grace, reply);
                    Ok(Reconciled { completion: Some(reply), stalled: true })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::responses::TRANSFER_DONE;
    use crate::storage::LocalFilesystem;

    #[test]
    fn builds_commands_for_each_kind() {
        let store: Arc<dyn LocalStore> = Arc::new(LocalFilesystem::new("."));
        assert_eq!(TransferOperation::listing(None).kind().command(), Command::LIST(None));
        assert_eq!(
            TransferOperation::download(store.clone(), "pub/readme.txt", None).kind().command(),
            Command::RETR("pub/readme.txt".into())
        );
        assert_eq!(
            TransferOperation::upload(store, "notes.txt", Some("backup.txt".into())).kind().command(),
            Command::STOR("backup.txt".into())
        );
    }

    #[test]
    fn download_defaults_local_name_to_last_segment() {
        let store: Arc<dyn LocalStore> = Arc::new(LocalFilesystem::new("."));
        let op = TransferOperation::download(store, "/pub/readme.txt", None);
        match op.kind() {
            TransferKind::Download { local, .. } => assert_eq!(local, "readme.txt"),
            _ => panic!("expected download"),
        }
    }

    #[tokio::test]
    async fn finish_without_init_is_safe() {
        let mut op = TransferOperation::listing(Some("docs".into()));
        let report = op.finish().await.unwrap();
        assert_eq!(op.state(), OperationState::Finished);
        assert!(!op.has_data_channel());
        assert_eq!(report.listing.as_deref(), Some(""));
        assert!(op.finish().await.is_ok());
    }

    #[tokio::test]
    async fn process_requires_init() {
        let mut op = TransferOperation::listing(None);
        match op.process().await {
            Err(FtpClientError::Transfer(TransferError::InvalidState { expected, actual })) => {
                assert_eq!(expected, "initialized");
                assert_eq!(actual, "created");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn reply_first_lets_pump_drain() {
        let mut deferred = DeferredReply::ready(Ok(Reply::new(226, "Transfer complete")));
        let pump = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        };
        let reconciled = reconcile(pump, &mut deferred, TRANSFER_DONE, Duration::from_secs(1)).await.unwrap();
        assert_eq!(reconciled.completion.unwrap().code, 226);
        assert!(!reconciled.stalled);
    }

    #[tokio::test]
    async fn reply_first_cancels_stuck_pump() {
        let mut deferred = DeferredReply::ready(Ok(Reply::new(226, "Transfer complete")));
        let pump = std::future::pending::<Result<(), FtpClientError>>();
        let reconciled = reconcile(pump, &mut deferred, TRANSFER_DONE, Duration::from_millis(50)).await.unwrap();
        assert!(reconciled.stalled);
        assert_eq!(reconciled.completion.unwrap().code, 226);
    }

    #[tokio::test]
    async fn unexpected_success_reply_is_a_rejection() {
        let mut deferred = DeferredReply::ready(Ok(Reply::new(200, "Command okay")));
        let pump = std::future::pending::<Result<(), FtpClientError>>();
        let result = reconcile(pump, &mut deferred, TRANSFER_DONE, Duration::from_secs(5)).await;
        assert!(matches!(
            result,
            Err(FtpClientError::Transfer(TransferError::Rejected(reply))) if reply.code == 200
        ));
    }

    #[test]
    fn directory_upload_fails_local_check() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let store: Arc<dyn LocalStore> = Arc::new(LocalFilesystem::new(dir.path()));

        let op = TransferOperation::upload(store, "folder", None);
        assert!(matches!(
            op.kind().check_local(),
            Err(LocalError::SourceNotAFile(_))
        ));
    }

    #[tokio::test]
    async fn error_reply_cancels_pump() {
        let mut deferred = DeferredReply::ready(Ok(Reply::new(550, "No such file")));
        let pump = std::future::pending::<Result<(), FtpClientError>>();
        let result = reconcile(pump, &mut deferred, TRANSFER_DONE, Duration::from_secs(5)).await;
        assert!(matches!(
            result,
            Err(FtpClientError::Transfer(TransferError::Rejected(reply))) if reply.code == 550
        ));
    }
}
