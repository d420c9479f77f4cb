//! File system operations
//!
//! `LocalStore` over a local directory.

use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::storage::{DataSink, DataSource, LocalStore};

/// Resolves names relative to a root directory.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` under the root
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl LocalStore for LocalFilesystem {
    fn exists(&self, name: &str) -> bool {
        self.resolve(name).exists()
    }

    fn is_file(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn create(&self, name: &str) -> io::Result<Box<dyn DataSink>> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        debug!("Created {}", path.display());
        Ok(Box::new(FileSink {
            writer: BufWriter::new(file),
        }))
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn DataSource>> {
        let path = self.resolve(name);
        let file = File::open(&path)?;
        debug!("Opened {}", path.display());
        Ok(Box::new(file))
    }

    fn remove(&self, name: &str) -> io::Result<()> {
        let path = self.resolve(name);
        fs::remove_file(&path)?;
        debug!("Removed {}", path.display());
        Ok(())
    }

    fn display_name(&self, name: &str) -> String {
        self.resolve(name).display().to_string()
    }
}

/// Buffered file writer for downloads.
struct FileSink {
    writer: BufWriter<File>,
}

impl DataSink for FileSink {
    fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_writes_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFilesystem::new(dir.path());
        assert!(!store.exists("nested/out.bin"));

        let mut sink = store.create("nested/out.bin").unwrap();
        sink.write_chunk(b"hello ").unwrap();
        sink.write_chunk(b"world").unwrap();
        sink.finish().unwrap();
        drop(sink);

        assert!(store.exists("nested/out.bin"));
        let mut source = store.open("nested/out.bin").unwrap();
        let mut buf = [0u8; 32];
        let n = source.read_chunk(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");
    }

    #[test]
    fn create_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("taken.txt"), b"x").unwrap();
        let store = LocalFilesystem::new(dir.path());
        let err = store.create("taken.txt").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn directories_are_not_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("folder")).unwrap();
        fs::write(dir.path().join("plain.txt"), b"x").unwrap();
        let store = LocalFilesystem::new(dir.path());

        assert!(store.exists("folder"));
        assert!(!store.is_file("folder"));
        assert!(store.is_file("plain.txt"));
    }

    #[test]
    fn removes_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFilesystem::new(dir.path());
        drop(store.create("partial.bin").unwrap());

        store.remove("partial.bin").unwrap();
        assert!(!store.exists("partial.bin"));
        assert_eq!(store.root(), dir.path());
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFilesystem::new(dir.path());
        assert!(store.open("missing.txt").is_err());
    }
}
