//! # Persistent Array
//!
//! The core type: an indexable sequence of fixed-size records whose
//! authoritative copy lives in one file and whose working set lives in the
//! bounded in-memory window. Reads load records on demand (optionally
//! prefetching a contiguous run), writes either go straight to disk or
//! coalesce in the chunk queue until it fills, and a chunk flush emits
//! records in ascending index order with one seek per gap.
//!
//! ## Operation Flow
//!
//! ```text
//!              get(i)                         set(i, v)
//!                │                                │
//!        resident in window? ──no──┐     slot owner dirty? ──yes── write or
//!                │                 │              │                flush the
//!               yes          CacheMiss +          │                evictee
//!                │            demand load    associate(i, v)
//!                │                 │              │
//!          window value ◄──────────┘      chunked? queue.add : write through
//! ```
//!
//! ## Per-Index State
//!
//! ```text
//! Unseen ──set──► Resident-Dirty ──flush──► Resident-Clean
//!    │                                           ▲
//!    └───────────────────get─────────────────────┘
//!
//! Resident-* ──slot collision──► Unseen   (persisted copy stays authoritative)
//! ```
//!
//! ## Thread Safety
//!
//! None, by contract: every operation takes `&mut self`, subscribers must
//! not reenter the array, and the backing file assumes no concurrent
//! external writers. The sync access modes plus external serialization are
//! the sanctioned route to advisory durability.

use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use eyre::{ensure, Result, WrapErr};
use tracing::{debug, trace};
use zerocopy::IntoBytes;

use crate::codec::{self, Codec};
use crate::config::{check_window, Configuration, ReadOptions, Subscribers, WriteOptions};
use crate::error::ArrayError;
use crate::storage::{
    ArrayHeader, ChunkQueue, FileCache, FixedLayout, RecordLayout, Window, HEADER_SIZE,
};
use crate::subscriber::ChunkKind;

/// Persistent fixed-record array over a codec `C`.
///
/// Values are `Option<C::Value>`: `None` is the null record, distinct from
/// "not resident". See the module docs for the operation flow.
impl<C: Codec> std::fmt::Debug for PersistentArray<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentArray")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

pub struct PersistentArray<C: Codec> {
    length: usize,
    codec: C,
    layout: FixedLayout,
    storage: FileCache,
    window: Window<C::Value>,
    queue: ChunkQueue,
    read: ReadOptions,
    write: WriteOptions,
    read_size: usize,
    subscribers: Subscribers,
}

impl<C: Codec> PersistentArray<C> {
    /// Creates the backing file and seeds it with `length` null records.
    ///
    /// The window is sized `min(length, memory)`. Fails with
    /// `ReadChunkLimitExceeded` / `WriteChunkLimitExceeded` when the window
    /// cannot hold a configured chunk, and with `Io` when the file cannot
    /// be created.
    pub fn create(length: usize, codec: C, config: Configuration) -> Result<Self> {
        config.validate()?;
        ensure!(
            length <= i32::MAX as usize,
            "length {length} exceeds the format's signed 32-bit record count"
        );
        let descriptor = codec.descriptor();
        ensure!(
            descriptor.size >= 2,
            "record size {} of tag '{}' leaves no room for the marker byte",
            descriptor.size,
            descriptor.tag
        );
        codec::check_conflict(&descriptor)?;

        let window_len = length.min(config.memory);
        let Configuration {
            file,
            read,
            write,
            subscribers,
            ..
        } = config;

        let mut array = Self {
            length,
            layout: FixedLayout::new(descriptor.size),
            codec,
            storage: FileCache::new(file),
            window: Window::new(window_len),
            queue: ChunkQueue::new(write.size),
            read_size: read.size,
            read,
            write,
            subscribers,
        };
        array.write_empty_file()?;
        debug!(
            length,
            record_size = descriptor.size,
            path = %array.storage.options().path.display(),
            "created persistent array"
        );
        Ok(array)
    }

    /// Opens an existing file, validating magic, version word, layout, and
    /// record size, then pre-populates the window with up to
    /// `min(memory, |preload|)` indices from the ordered preload set.
    pub fn open(codec: C, config: Configuration, preload: &BTreeSet<usize>) -> Result<Self> {
        config.validate()?;
        let descriptor = codec.descriptor();
        ensure!(
            descriptor.size >= 2,
            "record size {} of tag '{}' leaves no room for the marker byte",
            descriptor.size,
            descriptor.tag
        );
        codec::verify(&descriptor)?;

        let mut header_bytes = [0u8; HEADER_SIZE];
        let mut file = fs::File::open(&config.file.path)
            .map_err(ArrayError::Io)
            .wrap_err_with(|| format!("failed to open {}", config.file.path.display()))?;
        if let Err(e) = file.read_exact(&mut header_bytes) {
            return Err(if e.kind() == ErrorKind::UnexpectedEof {
                ArrayError::BadHeader {
                    detail: "truncated header".into(),
                }
                .into()
            } else {
                ArrayError::Io(e).into()
            });
        }
        drop(file);

        let header = ArrayHeader::from_bytes(&header_bytes)?;
        match header.layout()? {
            RecordLayout::Fixed => {}
            RecordLayout::Variable => {
                return Err(ArrayError::UnsupportedLayout { layout: 0 }.into());
            }
        }
        if header.record_size() as usize != descriptor.size {
            return Err(ArrayError::BadHeader {
                detail: format!(
                    "file stores {}-byte records, codec '{}' declares {}",
                    header.record_size(),
                    descriptor.tag,
                    descriptor.size
                ),
            }
            .into());
        }

        let length = header.length() as usize;
        let boundary = config.memory;
        let window_len = length.min(config.memory);
        let Configuration {
            file,
            read,
            write,
            subscribers,
            ..
        } = config;

        let mut array = Self {
            length,
            layout: FixedLayout::new(descriptor.size),
            codec,
            storage: FileCache::new(file),
            window: Window::new(window_len),
            queue: ChunkQueue::new(write.size),
            read_size: read.size,
            read,
            write,
            subscribers,
        };
        debug!(
            length,
            preload = preload.len().min(boundary),
            path = %array.storage.options().path.display(),
            "opened persistent array"
        );
        for index in preload.iter().take(boundary) {
            array.get(*index)?;
        }
        Ok(array)
    }

    /// Number of records in the array.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Dirty indices currently awaiting flush.
    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    /// Returns the record at `index`, loading it (and, when read-chunking
    /// is on, its successors) from disk unless it is already resident.
    ///
    /// The returned value is the most recent one observed for `index` at
    /// the time of the call; `None` is the null record.
    pub fn get(&mut self, index: usize) -> Result<Option<&C::Value>> {
        self.check_bounds(index)?;

        if self.read.force_reload {
            self.load(index)?;
        } else if !self.window.contains(index) {
            for subscriber in &self.subscribers {
                subscriber.on_cache_miss(index);
            }
            self.load(index)?;
        }

        Ok(self.window.value(index).as_ref())
    }

    /// Stores `value` at `index`, visible to every subsequent `get(index)`.
    ///
    /// If the target slot holds a different index that is still queued, the
    /// evictee reaches disk first: either a single in-place write, or a
    /// whole-queue flush under `write.force_flush`. With write-chunking on,
    /// the index joins the queue and a full queue flushes; otherwise the
    /// record is written through immediately.
    pub fn set(&mut self, index: usize, value: Option<C::Value>) -> Result<()> {
        self.check_bounds(index)?;

        if let Some(prior) = self.window.owner(index) {
            if prior != index && self.queue.contains(prior as u32) {
                if self.write.force_flush {
                    self.flush()?;
                } else {
                    self.write_record(prior)?;
                    self.queue.remove(prior as u32);
                }
                for subscriber in &self.subscribers {
                    subscriber.on_write_collision(prior, index);
                }
            }
        }

        self.window.associate(index, value);
        if self.write.chunked {
            if self.queue.add(index as u32) {
                self.flush()?;
            }
        } else {
            self.write_record(index)?;
        }
        Ok(())
    }

    /// Sets every index to `value`, at the configured maximum write
    /// coalescing regardless of the current write-chunk capacity.
    pub fn fill(&mut self, value: Option<C::Value>) -> Result<()>
    where
        C::Value: Clone,
    {
        let prior = self.queue.capacity();
        self.resize_write_chunk(self.write.size)?;
        for index in 0..self.length {
            self.set(index, value.clone())?;
        }
        self.resize_write_chunk(prior)?;
        Ok(())
    }

    /// Writes all queued records to disk in ascending index order and
    /// clears the queue. No-op unless write-chunking is on.
    pub fn flush(&mut self) -> Result<()> {
        if !self.write.chunked {
            return Ok(());
        }
        self.write_chunk()?;
        self.queue.clear();
        Ok(())
    }

    /// Changes the prefetch span of demand loads.
    pub fn resize_read_chunk(&mut self, size: usize) -> Result<()> {
        check_window(size, self.queue.capacity(), self.window.capacity())?;

        let prior = self.read_size;
        self.read_size = size;
        for subscriber in &self.subscribers {
            subscriber.on_chunk_resized(ChunkKind::Read, prior, size);
        }
        Ok(())
    }

    /// Changes the write-queue capacity, flushing queued writes first.
    pub fn resize_write_chunk(&mut self, size: usize) -> Result<()> {
        check_window(self.read_size, size, self.window.capacity())?;

        self.flush()?;
        let prior = self.queue.capacity();
        self.queue.set_capacity(size);
        for subscriber in &self.subscribers {
            subscriber.on_chunk_resized(ChunkKind::Write, prior, size);
        }
        Ok(())
    }

    /// Reallocates the window at `size` slots, flushing queued writes
    /// first. Every slot comes back empty.
    pub fn resize_memory_chunk(&mut self, size: usize) -> Result<()> {
        check_window(self.read_size, self.queue.capacity(), size)?;

        self.flush()?;
        let prior = self.window.capacity();
        self.window = Window::new(size);
        for subscriber in &self.subscribers {
            subscriber.on_chunk_resized(ChunkKind::Memory, prior, size);
        }
        Ok(())
    }

    /// Closes the array and deletes the backing file; the in-memory window
    /// and queue come back empty.
    pub fn clear(&mut self) -> Result<()> {
        self.close()?;
        let path = self.storage.options().path.clone();
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(ArrayError::Io(e)).wrap_err("failed to delete backing file"),
        }
        self.window.reset();
        self.queue.clear();
        Ok(())
    }

    /// Flushes queued writes and releases the file handle. Idempotent;
    /// attempts both steps and surfaces the first error afterwards.
    pub fn close(&mut self) -> Result<()> {
        trace!(pending = self.queue.len(), "closing persistent array");
        let flushed = self.flush();
        let released = self.storage.shutdown();
        flushed?;
        released
    }

    /// Copies `count` records element by element between two arrays.
    pub fn arraycopy(
        src: &mut Self,
        src_pos: usize,
        dst: &mut Self,
        dst_pos: usize,
        count: usize,
    ) -> Result<()>
    where
        C::Value: Clone,
    {
        for step in 0..count {
            let value = src.get(src_pos + step)?.cloned();
            dst.set(dst_pos + step, value)?;
        }
        Ok(())
    }

    fn check_bounds(&self, index: usize) -> Result<()> {
        if index >= self.length {
            return Err(ArrayError::IndexOutOfRange {
                index,
                length: self.length,
            }
            .into());
        }
        Ok(())
    }

    fn load(&mut self, index: usize) -> Result<()> {
        let record_size = self.layout.record_size();
        let buffer = self.storage.options().buffer;
        let span = if self.read.chunked { self.read_size } else { 1 };
        let end = self.length.min(index + span);
        let mut record = vec![0u8; record_size];

        let guard = self.storage.acquire()?;
        let mut reader = guard.reader(buffer);
        self.layout.seek(&mut reader, index)?;
        let mut should_seek = false;

        for offset in index..end {
            if !self.read.force_reload && self.window.contains(offset) {
                should_seek = true;
                if self.read.break_on_loaded {
                    break;
                }
                continue;
            }
            if should_seek {
                // BufReader::seek drops its buffer, so the stale prefetch
                // bytes spanning the resident gap are discarded with it.
                self.layout.seek(&mut reader, offset)?;
                should_seek = false;
            }
            reader.read_exact(&mut record).map_err(ArrayError::Io)?;
            let value = self.codec.decode(&record)?;
            self.window.associate(offset, value);
            for subscriber in &self.subscribers {
                subscriber.on_record_deserialized(offset);
            }
        }

        drop(reader);
        drop(guard);
        for subscriber in &self.subscribers {
            subscriber.on_chunk_deserialized();
        }
        Ok(())
    }

    fn write_record(&mut self, index: usize) -> Result<()> {
        if !self.window.contains(index) {
            return Ok(());
        }
        let mut record = vec![0u8; self.layout.record_size()];
        self.codec
            .encode(self.window.value(index).as_ref(), &mut record)?;

        let guard = self.storage.acquire()?;
        let mut file = guard.file();
        self.layout.seek(&mut file, index)?;
        file.write_all(&record).map_err(ArrayError::Io)?;
        guard.sync()?;
        drop(guard);

        for subscriber in &self.subscribers {
            subscriber.on_record_serialized(index);
        }
        Ok(())
    }

    fn write_chunk(&mut self) -> Result<()> {
        let Some(first) = self.queue.first() else {
            return Ok(());
        };
        let buffer = self.storage.options().buffer;
        let mut record = vec![0u8; self.layout.record_size()];
        trace!(count = self.queue.len(), first, "flushing write chunk");

        let guard = self.storage.acquire()?;
        let mut writer = guard.writer(buffer);
        self.layout.seek(&mut writer, first as usize)?;
        let mut prev = first;

        for cur in self.queue.iter() {
            if cur != first && cur != prev + 1 {
                // BufWriter::seek flushes the buffered run before moving,
                // so each maximal run of consecutive indices lands as one
                // contiguous write.
                self.layout.seek(&mut writer, cur as usize)?;
            }
            if self.window.contains(cur as usize) {
                self.codec
                    .encode(self.window.value(cur as usize).as_ref(), &mut record)?;
                writer.write_all(&record).map_err(ArrayError::Io)?;
                for subscriber in &self.subscribers {
                    subscriber.on_record_serialized(cur as usize);
                }
            }
            prev = cur;
        }

        writer.flush().map_err(ArrayError::Io)?;
        drop(writer);
        guard.sync()?;
        drop(guard);

        for subscriber in &self.subscribers {
            subscriber.on_chunk_serialized();
        }
        Ok(())
    }

    fn write_empty_file(&mut self) -> Result<()> {
        let record_size = self.layout.record_size();
        let buffer = self.storage.options().buffer;
        let mut record = vec![0u8; record_size];
        self.codec.encode(None, &mut record)?;
        let header = ArrayHeader::new(self.length as i32, record_size as i32);

        let guard = self.storage.acquire()?;
        let mut writer = guard.writer(buffer);
        writer
            .seek(SeekFrom::Start(0))
            .map_err(ArrayError::Io)?;
        writer.write_all(header.as_bytes()).map_err(ArrayError::Io)?;
        for _ in 0..self.length {
            writer.write_all(&record).map_err(ArrayError::Io)?;
        }
        writer.flush().map_err(ArrayError::Io)?;
        drop(writer);

        let size = (HEADER_SIZE + self.length * record_size) as u64;
        guard.file().set_len(size).map_err(ArrayError::Io)?;
        guard.sync()?;
        drop(guard);

        for subscriber in &self.subscribers {
            subscriber.on_file_created();
        }
        Ok(())
    }
}

impl<C: Codec> Drop for PersistentArray<C> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Int32Codec;
    use crate::config::{FileOptions, WriteOptions};
    use tempfile::tempdir;

    fn linear_config(dir: &std::path::Path, memory: usize) -> Configuration {
        Configuration::builder(FileOptions::at(dir.join("unit.da")))
            .memory(memory)
            .build()
            .unwrap()
    }

    #[test]
    fn set_then_get_returns_the_value() {
        let dir = tempdir().unwrap();
        let mut array =
            PersistentArray::create(8, Int32Codec, linear_config(dir.path(), 4)).unwrap();

        array.set(3, Some(33)).unwrap();
        assert_eq!(array.get(3).unwrap(), Some(&33));

        array.set(3, None).unwrap();
        assert_eq!(array.get(3).unwrap(), None);
    }

    #[test]
    fn fresh_records_read_as_null() {
        let dir = tempdir().unwrap();
        let mut array =
            PersistentArray::create(4, Int32Codec, linear_config(dir.path(), 4)).unwrap();
        for index in 0..4 {
            assert_eq!(array.get(index).unwrap(), None);
        }
    }

    #[test]
    fn out_of_range_index_is_rejected_at_entry() {
        let dir = tempdir().unwrap();
        let mut array =
            PersistentArray::create(4, Int32Codec, linear_config(dir.path(), 4)).unwrap();

        let err = array.get(4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::IndexOutOfRange { index: 4, length: 4 })
        ));

        let err = array.set(17, Some(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::IndexOutOfRange { index: 17, length: 4 })
        ));
    }

    #[test]
    fn slot_collision_evicts_to_disk_first() {
        let dir = tempdir().unwrap();
        let config = Configuration::builder(FileOptions::at(dir.path().join("unit.da")))
            .memory(2)
            .write(WriteOptions::chunked(4))
            .build()
            .unwrap();
        let mut array = PersistentArray::create(6, Int32Codec, config).unwrap();

        array.set(0, Some(100)).unwrap();
        array.set(2, Some(200)).unwrap();

        assert_eq!(array.pending_writes(), 1);
        assert_eq!(array.get(2).unwrap(), Some(&200));
        // index 0 was displaced; re-reading it must come back from disk
        assert_eq!(array.get(0).unwrap(), Some(&100));
    }

    #[test]
    fn window_is_bounded_by_length() {
        let dir = tempdir().unwrap();
        let array =
            PersistentArray::create(2, Int32Codec, linear_config(dir.path(), 16)).unwrap();
        assert_eq!(array.window.capacity(), 2);
    }

    #[test]
    fn resize_memory_chunk_empties_the_window() {
        let dir = tempdir().unwrap();
        let mut array =
            PersistentArray::create(8, Int32Codec, linear_config(dir.path(), 4)).unwrap();
        array.set(1, Some(11)).unwrap();

        array.resize_memory_chunk(8).unwrap();
        assert!(!array.window.contains(1));
        assert_eq!(array.get(1).unwrap(), Some(&11));
    }

    #[test]
    fn resize_below_chunk_sizes_is_rejected() {
        let dir = tempdir().unwrap();
        let config = Configuration::builder(FileOptions::at(dir.path().join("unit.da")))
            .memory(8)
            .write(WriteOptions::chunked(8))
            .build()
            .unwrap();
        let mut array = PersistentArray::create(16, Int32Codec, config).unwrap();

        let err = array.resize_memory_chunk(4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::WriteChunkLimitExceeded { write: 8, memory: 4 })
        ));

        let err = array.resize_read_chunk(9).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::ReadChunkLimitExceeded { read: 9, memory: 8 })
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut array =
            PersistentArray::create(4, Int32Codec, linear_config(dir.path(), 4)).unwrap();
        array.set(0, Some(1)).unwrap();
        array.close().unwrap();
        array.close().unwrap();
    }

    #[test]
    fn clear_deletes_the_backing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("unit.da");
        let config = Configuration::builder(FileOptions::at(&path))
            .memory(4)
            .build()
            .unwrap();
        let mut array = PersistentArray::create(4, Int32Codec, config).unwrap();
        array.set(0, Some(7)).unwrap();

        array.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(array.pending_writes(), 0);

        // a second clear finds nothing to delete and still succeeds
        array.clear().unwrap();
    }
}
