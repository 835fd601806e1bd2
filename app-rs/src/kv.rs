//! A flat key-value store (no subdirs) for small persisted blobs, suitable
//! for mocking. Session credentials and settings live here, inside the
//! sandboxed app data directory.

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use anyhow::Context;

/// Abstraction over a flat key-value store backed by files.
///
/// NOTE: Use [`io::ErrorKind::NotFound`] to detect if a key is missing.
pub trait KvStore {
    fn read(&self, key: &str) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_into(key, &mut buf)?;
        Ok(buf)
    }
    fn read_into(&self, key: &str, buf: &mut Vec<u8>) -> io::Result<()>;

    fn write(&self, key: &str, data: &[u8]) -> io::Result<()>;

    /// Delete one key. Returns [`io::ErrorKind::NotFound`] if it's missing.
    fn delete(&self, key: &str) -> io::Result<()>;

    /// Delete everything in the store.
    fn delete_all(&self) -> io::Result<()>;
}

impl<K: KvStore + ?Sized> KvStore for &K {
    fn read_into(&self, key: &str, buf: &mut Vec<u8>) -> io::Result<()> {
        (**self).read_into(key, buf)
    }
    fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        (**self).write(key, data)
    }
    fn delete(&self, key: &str) -> io::Result<()> {
        (**self).delete(key)
    }
    fn delete_all(&self) -> io::Result<()> {
        (**self).delete_all()
    }
}

/// [`KvStore`] impl that does real IO, one file per key.
#[derive(Clone)]
pub struct FileKvStore {
    base_dir: PathBuf,
}

impl FileKvStore {
    /// Create a new [`FileKvStore`] without ensuring the directory exists.
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Create a new [`FileKvStore`] ready for use.
    ///
    /// Normally, it's expected that this directory already exists. In case
    /// that directory doesn't exist, this fn will create `base_dir` and any
    /// parent directories.
    pub fn create_dir_all(base_dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&base_dir).with_context(|| {
            format!("Failed to create directory ({})", base_dir.display())
        })?;
        Ok(Self::new(base_dir))
    }
}

impl KvStore for FileKvStore {
    fn read_into(&self, key: &str, buf: &mut Vec<u8>) -> io::Result<()> {
        let mut file = fs::File::open(self.base_dir.join(key))?;
        file.read_to_end(buf)?;
        Ok(())
    }

    fn write(&self, key: &str, data: &[u8]) -> io::Result<()> {
        // NOTE: could use `atomicwrites` crate to make this a little safer
        // against random crashes. definitely not free though; costs at
        // least 5 ms per write on Linux.
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);

        // The store holds the session token; rw------- (owner r/w only).
        #[cfg(unix)]
        opts.mode(0o600);

        let mut file = opts.open(self.base_dir.join(key))?;
        file.write_all(data)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        fs::remove_file(self.base_dir.join(key))?;
        Ok(())
    }

    fn delete_all(&self) -> io::Result<()> {
        fs::remove_dir_all(&self.base_dir)?;
        fs::create_dir(&self.base_dir)?;
        Ok(())
    }
}
