//! # Write Chunk Queue
//!
//! Bounded ordered set of dirty record indices awaiting flush. Adding an
//! index that is already queued is a no-op; adding a new one signals
//! "flush now" once the queue holds `capacity` indices. Iteration walks
//! set indices in ascending order, which is what lets the chunk flush
//! concatenate consecutive records and seek only across gaps.
//!
//! Backed by a `RoaringBitmap`: membership, the maintained minimum, and
//! ascending iteration come from the bitmap directly.

use roaring::RoaringBitmap;

pub(crate) struct ChunkQueue {
    set: RoaringBitmap,
    capacity: usize,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: RoaringBitmap::new(),
            capacity,
        }
    }

    /// Queues `index`; returns true once the queue has reached capacity.
    pub fn add(&mut self, index: u32) -> bool {
        self.set.insert(index);
        self.set.len() as usize >= self.capacity
    }

    pub fn remove(&mut self, index: u32) {
        self.set.remove(index);
    }

    pub fn contains(&self, index: u32) -> bool {
        self.set.contains(index)
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    /// Lowest queued index, if any.
    pub fn first(&self) -> Option<u32> {
        self.set.min()
    }

    pub fn len(&self) -> usize {
        self.set.len() as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    /// Queued indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.set.iter()
    }
}
