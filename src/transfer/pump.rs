//! Module `pump`
//!
//! Moves bytes across an open data socket until end of stream. Byte counts
//! are published through an `AtomicU64` so they stay readable when a pump is
//! cancelled part way.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FtpClientError, LocalError, TransferError};
use crate::storage::DataSource;

/// Reads `stream` to its end, handing every chunk to `on_chunk`.
pub async fn pump_inbound<S, F>(
    stream: &mut S,
    buffer_size: usize,
    moved: &AtomicU64,
    mut on_chunk: F,
) -> Result<(), FtpClientError>
where
    S: AsyncRead + Unpin,
    F: FnMut(&[u8]) -> Result<(), FtpClientError>,
{
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let n = stream
            .read(&mut buffer)
            .await
            .map_err(TransferError::DataIo)?;
        if n == 0 {
            debug!("Data stream ended after {} bytes", moved.load(Ordering::SeqCst));
            return Ok(());
        }
        on_chunk(&buffer[..n])?;
        moved.fetch_add(n as u64, Ordering::SeqCst);
    }
}

/// Writes everything `source` produces to `stream`, then shuts down the
/// write side so the server sees end of file.
pub async fn pump_outbound<S>(
    stream: &mut S,
    source: &mut dyn DataSource,
    buffer_size: usize,
    moved: &AtomicU64,
    source_name: &str,
) -> Result<(), FtpClientError>
where
    S: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];
    loop {
        let n = source
            .read_chunk(&mut buffer)
            .map_err(|e| LocalError::Io(source_name.to_string(), e))?;
        if n == 0 {
            break;
        }
        stream
            .write_all(&buffer[..n])
            .await
            .map_err(TransferError::DataIo)?;
        moved.fetch_add(n as u64, Ordering::SeqCst);
    }

    stream.flush().await.map_err(TransferError::DataIo)?;
    stream.shutdown().await.map_err(TransferError::DataIo)?;
    debug!("Sent {} bytes", moved.load(Ordering::SeqCst));
    Ok(())
}
