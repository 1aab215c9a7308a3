//! # Subscriber Bus
//!
//! Synchronous observer fan-out for cache and I/O events. The array holds
//! an ordered list of shared subscribers and invokes each hook in
//! registration order, ignoring return values. Hooks fire *after* the
//! corresponding state change.
//!
//! ## Contract
//!
//! Subscribers must not call back into the array (no operation is
//! reentrant) and must not mutate it. A panicking subscriber aborts the
//! surrounding operation; the array's in-memory state remains consistent
//! because the state change has already been applied.
//!
//! ## Example
//!
//! ```ignore
//! struct Stats { misses: AtomicUsize }
//!
//! impl Subscriber for Stats {
//!     fn on_cache_miss(&self, _index: usize) {
//!         self.misses.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let config = Configuration::builder(file)
//!     .memory(64)
//!     .subscribe(Arc::new(Stats::default()))
//!     .build()?;
//! ```

/// Which tunable a [`Subscriber::on_chunk_resized`] event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Prefetch span used on a cache miss.
    Read,
    /// Dirty-index capacity of the write queue.
    Write,
    /// Slot count of the in-memory window.
    Memory,
}

/// Observer of array cache and I/O events. Every hook defaults to a no-op;
/// implementors override only what they care about.
pub trait Subscriber {
    /// The backing file was created and seeded with null records.
    fn on_file_created(&self) {}

    /// A `get` found its index not resident in the window.
    fn on_cache_miss(&self, index: usize) {
        let _ = index;
    }

    /// One record's bytes were written to the file.
    fn on_record_serialized(&self, index: usize) {
        let _ = index;
    }

    /// One record's bytes were read from the file and decoded.
    fn on_record_deserialized(&self, index: usize) {
        let _ = index;
    }

    /// A chunk flush completed.
    fn on_chunk_serialized(&self) {}

    /// A demand-load pass completed.
    fn on_chunk_deserialized(&self) {}

    /// An incoming write displaced a dirty-but-unflushed slot owner.
    fn on_write_collision(&self, prior: usize, incoming: usize) {
        let _ = (prior, incoming);
    }

    /// A read, write, or memory chunk was resized.
    fn on_chunk_resized(&self, kind: ChunkKind, prior: usize, next: usize) {
        let _ = (kind, prior, next);
    }
}
