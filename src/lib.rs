//! # DiskArray - Persistent Fixed-Record Array
//!
//! An indexable sequence of records of one declared type whose
//! authoritative copy lives in a single file and whose working set lives in
//! a bounded in-memory window. Elements are addressed by zero-based index;
//! the array loads records on read, coalesces writes into chunks, and
//! serves a bounded cache, so arrays much larger than memory behave like
//! ordinary random-access arrays at the cost of extra I/O.
//!
//! ## Quick Start
//!
//! ```ignore
//! use diskarray::{Configuration, FileOptions, Int32Codec, PersistentArray, WriteOptions};
//!
//! let config = Configuration::builder(FileOptions::at("./values.da"))
//!     .memory(1024)
//!     .write(WriteOptions::chunked(256))
//!     .build()?;
//!
//! let mut array = PersistentArray::create(1_000_000, Int32Codec, config)?;
//! array.set(42, Some(7))?;
//! assert_eq!(array.get(42)?, Some(&7));
//! array.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │     Public API (PersistentArray)      │
//! ├───────────────────────────────────────┤
//! │  Window (ring cache) │ Chunk queue    │
//! ├──────────────────────┴────────────────┤
//! │       Record codecs + registry        │
//! ├───────────────────────────────────────┤
//! │   Fixed layout (index → offset)       │
//! ├───────────────────────────────────────┤
//! │   File handle cache + buffered I/O    │
//! └───────────────────────────────────────┘
//! ```
//!
//! Reads that miss the window emit `CacheMiss` and demand-load up to
//! `read.size` contiguous records. Writes either go straight to disk
//! (linear) or join a bounded queue that flushes in ascending index order,
//! concatenating consecutive records and seeking only across gaps. A
//! synchronous [`Subscriber`] bus reports cache and I/O events.
//!
//! ## Persistence Model
//!
//! The file is self-describing: a 20-byte header (magic, version word with
//! layout flags, length, record size) followed by `length` fixed-size
//! records, each prefixed by a one-byte null marker. There is no journal
//! and no fsync protocol; durability is "modulo the filesystem", with the
//! sync access modes (`ReadWriteSync`/`ReadWriteData`) as the advisory
//! stronger option.
//!
//! ## Thread Safety
//!
//! None. Every operation takes `&mut self`, blocks on synchronous
//! filesystem I/O, and must not be reentered from a subscriber. Callers
//! wanting cross-thread use must serialize access externally.

mod array;
pub mod codec;
pub mod config;
mod error;
pub mod storage;
mod subscriber;

pub use array::PersistentArray;
pub use codec::{Codec, Int32Codec, Int64Codec, TypeDescriptor};
pub use config::{
    AccessMode, Configuration, ConfigurationBuilder, FileOptions, ReadOptions, WriteOptions,
    DEFAULT_BUFFER_SIZE,
};
pub use error::ArrayError;
pub use storage::{ArrayHeader, FixedLayout, RecordLayout, HEADER_SIZE, MAGIC};
pub use subscriber::{ChunkKind, Subscriber};
