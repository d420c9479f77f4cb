//! Local storage collaborator
//!
//! Where downloaded bytes go and uploaded bytes come from. Transfers only
//! see these traits; `LocalFilesystem` is the implementation backed by a
//! directory on disk.

pub mod filesystem;

pub use filesystem::LocalFilesystem;

use std::io::{self, Read};

/// Receives the bytes of a download or listing, chunk by chunk.
pub trait DataSink: Send {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Flushes anything buffered. Called once, when the transfer finishes.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<F> DataSink for F
where
    F: FnMut(&[u8]) -> io::Result<()> + Send,
{
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self(chunk)
    }
}

/// Produces the bytes of an upload; a zero-length read ends it.
pub trait DataSource: Send {
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R> DataSource for R
where
    R: Read + Send,
{
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

/// Named local resources: existence checks plus create/open primitives.
pub trait LocalStore: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    /// Whether `name` holds plain data that can be uploaded.
    fn is_file(&self, name: &str) -> bool {
        self.exists(name)
    }

    /// Creates a new resource to download into. Fails if it already exists.
    fn create(&self, name: &str) -> io::Result<Box<dyn DataSink>>;

    /// Opens an existing resource to upload from.
    fn open(&self, name: &str) -> io::Result<Box<dyn DataSource>>;

    /// Deletes a resource created by `create`.
    fn remove(&self, name: &str) -> io::Result<()>;

    /// How the resource is shown in messages.
    fn display_name(&self, name: &str) -> String {
        name.to_string()
    }
}
