//! # In-Memory Window
//!
//! Ring-shaped mapping from record index to cached record, pure state with
//! no I/O. Index `i` lives in slot `i mod W`; at most one index per residue
//! class is resident at a time, so inserting a different index into an
//! occupied slot displaces the previous owner. Each slot pairs a decoded
//! record (`None` is the null record) with the index currently owning the
//! slot (`None` marks an empty slot).
//!
//! Occupancy and dirtiness are independent: the window knows who is
//! resident, the write queue knows who is dirty.

pub(crate) struct Window<T> {
    values: Box<[Option<T>]>,
    owners: Box<[Option<usize>]>,
}

impl<T> Window<T> {
    pub fn new(capacity: usize) -> Self {
        let mut values = Vec::with_capacity(capacity);
        let mut owners = Vec::with_capacity(capacity);
        values.resize_with(capacity, || None);
        owners.resize(capacity, None);
        Self {
            values: values.into_boxed_slice(),
            owners: owners.into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    fn slot(&self, index: usize) -> usize {
        index % self.owners.len()
    }

    /// Whether `index` itself is resident in its slot.
    pub fn contains(&self, index: usize) -> bool {
        self.owners[self.slot(index)] == Some(index)
    }

    /// Current owner of the slot `index` maps to.
    pub fn owner(&self, index: usize) -> Option<usize> {
        self.owners[self.slot(index)]
    }

    /// Installs `index -> value`, displacing the slot's previous owner.
    pub fn associate(&mut self, index: usize, value: Option<T>) {
        let slot = self.slot(index);
        self.values[slot] = value;
        self.owners[slot] = Some(index);
    }

    /// The record in `index`'s slot, whoever owns it.
    pub fn value(&self, index: usize) -> &Option<T> {
        &self.values[self.slot(index)]
    }

    /// Empties `index`'s slot if `index` owns it.
    pub fn evict(&mut self, index: usize) {
        let slot = self.slot(index);
        if self.owners[slot] == Some(index) {
            self.owners[slot] = None;
            self.values[slot] = None;
        }
    }

    /// Evicts every resident index.
    pub fn reset(&mut self) {
        for slot in 0..self.owners.len() {
            if let Some(index) = self.owners[slot] {
                self.evict(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associate_makes_index_resident() {
        let mut window: Window<i32> = Window::new(4);
        assert!(!window.contains(2));

        window.associate(2, Some(20));
        assert!(window.contains(2));
        assert_eq!(window.owner(2), Some(2));
        assert_eq!(*window.value(2), Some(20));
    }

    #[test]
    fn null_record_is_resident_but_none() {
        let mut window: Window<i32> = Window::new(4);
        window.associate(1, None);
        assert!(window.contains(1));
        assert_eq!(*window.value(1), None);
    }

    #[test]
    fn same_residue_class_shares_a_slot() {
        let mut window: Window<i32> = Window::new(4);
        window.associate(1, Some(10));
        window.associate(5, Some(50));

        assert!(window.contains(5));
        assert!(!window.contains(1));
        assert_eq!(window.owner(1), Some(5));
        assert_eq!(*window.value(5), Some(50));
    }

    #[test]
    fn evict_only_removes_the_owner() {
        let mut window: Window<i32> = Window::new(2);
        window.associate(3, Some(30));

        window.evict(1);
        assert!(window.contains(3));

        window.evict(3);
        assert!(!window.contains(3));
        assert_eq!(window.owner(3), None);
        assert_eq!(*window.value(3), None);
    }

    #[test]
    fn reset_empties_every_slot() {
        let mut window: Window<i32> = Window::new(3);
        for index in 0..3 {
            window.associate(index, Some(index as i32));
        }
        window.reset();
        for index in 0..3 {
            assert!(!window.contains(index));
        }
    }
}
