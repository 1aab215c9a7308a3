//! # Record Addressing
//!
//! Translates a record index into an absolute byte offset. The format
//! reserves two layouts in the header's `DD` flag group; only the fixed
//! layout is implemented. The variable layout (keys and offsets in a
//! sidecar file) is parsed and rejected at open with `UnsupportedLayout`.

use std::io::{Seek, SeekFrom};

use eyre::Result;

use super::HEADER_SIZE;
use crate::error::ArrayError;

/// Record layout declared in the header's `DD` flag group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// Offsets stored out of band. Declared in the format, not implemented.
    Variable,
    /// Every record padded to one fixed size; offsets are arithmetic.
    Fixed,
}

impl RecordLayout {
    pub(crate) fn from_flags(dd: u8) -> Result<Self> {
        match dd {
            0 => Ok(RecordLayout::Variable),
            1 => Ok(RecordLayout::Fixed),
            other => Err(ArrayError::UnsupportedLayout { layout: other }.into()),
        }
    }
}

/// Fixed-size record addressing: `offset(i) = HEADER_SIZE + i * record_size`.
#[derive(Debug, Clone, Copy)]
pub struct FixedLayout {
    record_size: usize,
}

impl FixedLayout {
    pub fn new(record_size: usize) -> Self {
        Self { record_size }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn offset_of(&self, index: usize) -> u64 {
        (HEADER_SIZE + index * self.record_size) as u64
    }

    /// Positions `seekable` at the start of record `index`.
    pub fn seek<S: Seek>(&self, seekable: &mut S, index: usize) -> Result<u64> {
        let position = seekable
            .seek(SeekFrom::Start(self.offset_of(index)))
            .map_err(ArrayError::Io)?;
        Ok(position)
    }
}
