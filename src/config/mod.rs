//! # Array Configuration
//!
//! Recognized options, mirroring the on-disk and in-memory knobs of the
//! array:
//!
//! | Option                 | Meaning                                          | Default |
//! |------------------------|--------------------------------------------------|---------|
//! | `file.path`            | Backing file path                                | (none)  |
//! | `file.mode`            | Access mode (`ReadOnly`/`ReadWrite`/sync modes)  | `ReadWrite` |
//! | `file.buffer`          | Buffered-I/O capacity in bytes                   | 8192    |
//! | `file.cached`          | Keep the handle open across operations           | `true`  |
//! | `read.chunked`/`size`  | Prefetch up to `size` records on a miss          | linear (1) |
//! | `read.force_reload`    | Every `get` reloads from disk                    | `false` |
//! | `read.break_on_loaded` | Prefetch stops at the first resident index       | `false` |
//! | `write.chunked`/`size` | Coalesce up to `size` dirty indices              | linear  |
//! | `write.force_flush`    | Collisions flush the whole queue                 | `false` |
//! | `memory`               | Window capacity `W`                              | —       |
//! | `subscribers`          | Ordered observer list                            | empty   |
//!
//! `build()` enforces `W >= read.size` and `W >= write.size`; violating
//! either fails with `ReadChunkLimitExceeded` / `WriteChunkLimitExceeded`.
//!
//! ## Example
//!
//! ```ignore
//! let config = Configuration::builder(FileOptions::at(path))
//!     .memory(128)
//!     .read(ReadOptions::chunked(16))
//!     .write(WriteOptions::chunked(32))
//!     .build()?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use eyre::Result;
use smallvec::SmallVec;

use crate::error::ArrayError;
use crate::subscriber::Subscriber;

/// Default buffered-I/O capacity in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// How the backing file is opened, and which durability point each write
/// batch reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessMode {
    /// Open for reading only; writes fail at the filesystem layer.
    ReadOnly,
    /// Open for reading and writing, creating the file when absent.
    #[default]
    ReadWrite,
    /// Like `ReadWrite`, with content and metadata synced after each write
    /// batch.
    ReadWriteSync,
    /// Like `ReadWrite`, with content synced after each write batch.
    ReadWriteData,
}

impl AccessMode {
    pub(crate) fn open_options(&self) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        match self {
            AccessMode::ReadOnly => {
                options.read(true);
            }
            _ => {
                options.read(true).write(true).create(true);
            }
        }
        options
    }

    pub(crate) fn sync(&self, file: &std::fs::File) -> Result<()> {
        match self {
            AccessMode::ReadWriteSync => file.sync_all().map_err(ArrayError::Io)?,
            AccessMode::ReadWriteData => file.sync_data().map_err(ArrayError::Io)?,
            _ => {}
        }
        Ok(())
    }
}

/// Backing-file options.
#[derive(Debug, Clone)]
pub struct FileOptions {
    pub path: PathBuf,
    pub mode: AccessMode,
    pub buffer: usize,
    pub cached: bool,
}

impl FileOptions {
    /// Options for the file at `path` with the defaults above.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mode: AccessMode::ReadWrite,
            buffer: DEFAULT_BUFFER_SIZE,
            cached: true,
        }
    }

    pub fn mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn buffer(mut self, bytes: usize) -> Self {
        self.buffer = bytes;
        self
    }

    /// Keep one handle open across operations (`true`) or reopen per
    /// operation (`false`).
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }
}

/// Demand-load behavior of `get`.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub chunked: bool,
    pub size: usize,
    pub force_reload: bool,
    pub break_on_loaded: bool,
}

impl ReadOptions {
    /// One record per load.
    pub fn linear() -> Self {
        Self {
            chunked: false,
            size: 1,
            force_reload: false,
            break_on_loaded: false,
        }
    }

    /// Prefetch up to `size` contiguous records on a miss. A size of zero
    /// falls back to linear.
    pub fn chunked(size: usize) -> Self {
        if size == 0 {
            return Self::linear();
        }
        Self {
            chunked: true,
            size,
            force_reload: false,
            break_on_loaded: false,
        }
    }

    /// Reload from disk on every `get`, resident or not.
    pub fn force_reload(mut self, force: bool) -> Self {
        self.force_reload = force;
        self
    }

    /// Stop a prefetch run at the first already-resident index.
    pub fn break_on_loaded(mut self, stop: bool) -> Self {
        self.break_on_loaded = stop;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::linear()
    }
}

/// Write coalescing behavior of `set`.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub chunked: bool,
    pub size: usize,
    pub force_flush: bool,
}

impl WriteOptions {
    /// Every `set` writes through immediately.
    pub fn linear() -> Self {
        Self {
            chunked: false,
            size: 0,
            force_flush: false,
        }
    }

    /// Coalesce up to `size` dirty indices before flushing. A size of zero
    /// falls back to linear.
    pub fn chunked(size: usize) -> Self {
        if size == 0 {
            return Self::linear();
        }
        Self {
            chunked: true,
            size,
            force_flush: false,
        }
    }

    /// On a write collision, flush the entire queue instead of writing only
    /// the displaced record.
    pub fn force_flush(mut self, force: bool) -> Self {
        self.force_flush = force;
        self
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::linear()
    }
}

pub(crate) type Subscribers = SmallVec<[Arc<dyn Subscriber>; 4]>;

/// Complete array configuration. Construct through [`Configuration::builder`].
impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("file", &self.file)
            .field("read", &self.read)
            .field("write", &self.write)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

pub struct Configuration {
    pub file: FileOptions,
    pub read: ReadOptions,
    pub write: WriteOptions,
    /// Window capacity `W` in slots.
    pub memory: usize,
    pub(crate) subscribers: Subscribers,
}

impl Configuration {
    pub fn builder(file: FileOptions) -> ConfigurationBuilder {
        ConfigurationBuilder {
            file,
            read: ReadOptions::linear(),
            write: WriteOptions::linear(),
            memory: 1,
            subscribers: SmallVec::new(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_window(self.read.size, self.write.size, self.memory)
    }
}

/// The window must be able to hold a full read chunk and a full write chunk.
pub(crate) fn check_window(read: usize, write: usize, memory: usize) -> Result<()> {
    if memory < read {
        return Err(ArrayError::ReadChunkLimitExceeded { read, memory }.into());
    }
    if memory < write {
        return Err(ArrayError::WriteChunkLimitExceeded { write, memory }.into());
    }
    Ok(())
}

/// Fluent builder for [`Configuration`].
pub struct ConfigurationBuilder {
    file: FileOptions,
    read: ReadOptions,
    write: WriteOptions,
    memory: usize,
    subscribers: Subscribers,
}

impl ConfigurationBuilder {
    /// Sets the window capacity `W`.
    pub fn memory(mut self, slots: usize) -> Self {
        self.memory = slots;
        self
    }

    pub fn read(mut self, read: ReadOptions) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: WriteOptions) -> Self {
        self.write = write;
        self
    }

    /// Appends a subscriber; notification order is registration order.
    pub fn subscribe(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn build(self) -> Result<Configuration> {
        let config = Configuration {
            file: self.file,
            read: self.read,
            write: self.write,
            memory: self.memory,
            subscribers: self.subscribers,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> FileOptions {
        FileOptions::at("/tmp/array.da")
    }

    #[test]
    fn defaults_are_linear_cached_8k() {
        let config = Configuration::builder(options()).memory(4).build().unwrap();
        assert!(!config.read.chunked);
        assert_eq!(config.read.size, 1);
        assert!(!config.write.chunked);
        assert!(config.file.cached);
        assert_eq!(config.file.buffer, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.file.mode, AccessMode::ReadWrite);
    }

    #[test]
    fn zero_chunk_sizes_fall_back_to_linear() {
        assert!(!ReadOptions::chunked(0).chunked);
        assert_eq!(ReadOptions::chunked(0).size, 1);
        assert!(!WriteOptions::chunked(0).chunked);
    }

    #[test]
    fn window_smaller_than_read_chunk_is_rejected() {
        let err = Configuration::builder(options())
            .memory(2)
            .read(ReadOptions::chunked(4))
            .build()
            .unwrap_err();
        let kind = err.downcast_ref::<ArrayError>();
        assert!(matches!(
            kind,
            Some(ArrayError::ReadChunkLimitExceeded { read: 4, memory: 2 })
        ));
    }

    #[test]
    fn window_smaller_than_write_chunk_is_rejected() {
        let err = Configuration::builder(options())
            .memory(3)
            .write(WriteOptions::chunked(8))
            .build()
            .unwrap_err();
        let kind = err.downcast_ref::<ArrayError>();
        assert!(matches!(
            kind,
            Some(ArrayError::WriteChunkLimitExceeded { write: 8, memory: 3 })
        ));
    }

    #[test]
    fn window_equal_to_chunk_sizes_is_accepted() {
        let config = Configuration::builder(options())
            .memory(4)
            .read(ReadOptions::chunked(4))
            .write(WriteOptions::chunked(4))
            .build();
        assert!(config.is_ok());
    }
}
