//! # File Handle Cache
//!
//! Owns the backing random-access file. In cached mode one handle stays
//! open across operations and [`FileCache::acquire`] lends it out; in
//! uncached mode every acquisition opens a fresh handle that the returned
//! guard closes on drop. Either way the guard is the scope of one
//! operation's file access.
//!
//! The sync access modes (`ReadWriteSync` / `ReadWriteData`) reach their
//! durability point through [`FileGuard::sync`], called by the array after
//! each write batch.

use std::fs::File;
use std::io::{BufReader, BufWriter};

use eyre::{Result, WrapErr};

use crate::config::{AccessMode, FileOptions};
use crate::error::ArrayError;

pub(crate) struct FileCache {
    options: FileOptions,
    handle: Option<File>,
}

impl FileCache {
    pub fn new(options: FileOptions) -> Self {
        Self {
            options,
            handle: None,
        }
    }

    pub fn options(&self) -> &FileOptions {
        &self.options
    }

    /// Opens or lends the handle for the scope of one operation.
    pub fn acquire(&mut self) -> Result<FileGuard<'_>> {
        if !self.options.cached {
            return Ok(FileGuard {
                handle: Handle::Scoped(self.open()?),
                mode: self.options.mode,
            });
        }

        let file = match self.handle.take() {
            Some(open) => self.handle.insert(open),
            None => self.handle.insert(self.open()?),
        };
        Ok(FileGuard {
            handle: Handle::Cached(file),
            mode: self.options.mode,
        })
    }

    /// Closes the persistent handle if one is open, bringing the file to
    /// the durability point of the configured mode first. Idempotent.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(file) = self.handle.take() {
            self.options.mode.sync(&file)?;
        }
        Ok(())
    }

    fn open(&self) -> Result<File> {
        self.options
            .mode
            .open_options()
            .open(&self.options.path)
            .map_err(ArrayError::Io)
            .wrap_err_with(|| format!("failed to open {}", self.options.path.display()))
    }
}

enum Handle<'a> {
    Cached(&'a File),
    Scoped(File),
}

/// Scoped access to the backing file. Dropping a scoped (uncached) guard
/// closes the handle; releasing a cached guard is a no-op.
pub(crate) struct FileGuard<'a> {
    handle: Handle<'a>,
    mode: AccessMode,
}

impl std::fmt::Debug for FileGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileGuard").field("mode", &self.mode).finish_non_exhaustive()
    }
}

impl FileGuard<'_> {
    pub fn file(&self) -> &File {
        match &self.handle {
            Handle::Cached(file) => file,
            Handle::Scoped(file) => file,
        }
    }

    /// Buffered sequential read view over the handle.
    pub fn reader(&self, capacity: usize) -> BufReader<&File> {
        BufReader::with_capacity(capacity, self.file())
    }

    /// Buffered sequential write view over the handle.
    pub fn writer(&self, capacity: usize) -> BufWriter<&File> {
        BufWriter::with_capacity(capacity, self.file())
    }

    /// Brings the file to the durability point of the configured mode.
    pub fn sync(&self) -> Result<()> {
        self.mode.sync(self.file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};
    use tempfile::tempdir;

    fn cache(dir: &std::path::Path, cached: bool) -> FileCache {
        FileCache::new(FileOptions::at(dir.join("handle.da")).cached(cached))
    }

    #[test]
    fn cached_mode_reuses_one_handle() {
        let dir = tempdir().unwrap();
        let mut cache = cache(dir.path(), true);

        {
            let guard = cache.acquire().unwrap();
            let mut file = guard.file();
            file.write_all(b"abc").unwrap();
        }
        assert!(cache.handle.is_some());

        let guard = cache.acquire().unwrap();
        let mut file = guard.file();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut read = String::new();
        file.read_to_string(&mut read).unwrap();
        assert_eq!(read, "abc");
    }

    #[test]
    fn uncached_mode_opens_per_acquisition() {
        let dir = tempdir().unwrap();
        let mut cache = cache(dir.path(), false);

        {
            let guard = cache.acquire().unwrap();
            let mut file = guard.file();
            file.write_all(b"xyz").unwrap();
        }
        assert!(cache.handle.is_none());

        let guard = cache.acquire().unwrap();
        let mut read = String::new();
        guard.file().take(3).read_to_string(&mut read).unwrap();
        assert_eq!(read, "xyz");
    }

    #[test]
    fn shutdown_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut cache = cache(dir.path(), true);
        cache.acquire().unwrap();

        cache.shutdown().unwrap();
        cache.shutdown().unwrap();
        assert!(cache.handle.is_none());
    }

    #[test]
    fn missing_read_only_file_fails_with_io() {
        let dir = tempdir().unwrap();
        let mut cache = FileCache::new(
            FileOptions::at(dir.path().join("absent.da")).mode(AccessMode::ReadOnly),
        );
        let err = cache.acquire().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::Io(_))
        ));
    }
}
