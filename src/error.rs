//! # Error Types
//!
//! Domain error kinds for the persistent array. Operations return
//! `eyre::Result`; failures that callers are expected to branch on are
//! raised as [`ArrayError`] variants and can be recovered from an
//! `eyre::Report` with `downcast_ref::<ArrayError>()`.
//!
//! ## Policy
//!
//! Every error is surfaced to the caller; nothing is retried internally.
//! `close()` is best-effort: it attempts both the flush and the handle
//! release and surfaces the first error after doing so. Subscriber panics
//! propagate and abort the current operation, but fire only after the
//! corresponding state change, so in-memory invariants stay consistent.

use thiserror::Error;

/// Domain failures of the persistent array.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// Index outside `[0, length)`. Signaled at operation entry.
    #[error("index {index} out of range for array of length {length}")]
    IndexOutOfRange { index: usize, length: usize },

    /// Stored critical version differs, or the stored major version is
    /// newer than this writer understands.
    #[error(
        "incompatible version: stored {stored_critical}.{stored_major}.{stored_minor}, \
         supported {supported_critical}.{supported_major}.{supported_minor}"
    )]
    IncompatibleVersion {
        stored_critical: u8,
        stored_major: u8,
        stored_minor: u8,
        supported_critical: u8,
        supported_major: u8,
        supported_minor: u8,
    },

    /// Magic mismatch, truncated header, or a header field that cannot be
    /// reconciled with the declared codec.
    #[error("bad header: {detail}")]
    BadHeader { detail: String },

    /// A record's leading marker byte is neither the null sentinel nor the
    /// value-present sentinel.
    #[error("bad record: unknown marker byte {marker:#04x}")]
    BadRecord { marker: u8 },

    /// `read.size` exceeds the in-memory window capacity.
    #[error("read chunk size {read} exceeds memory window of {memory} slots")]
    ReadChunkLimitExceeded { read: usize, memory: usize },

    /// `write.size` exceeds the in-memory window capacity.
    #[error("write chunk size {write} exceeds memory window of {memory} slots")]
    WriteChunkLimitExceeded { write: usize, memory: usize },

    /// The header declares a record layout this implementation does not
    /// support (anything but the fixed layout).
    #[error("unsupported record layout {layout:#04b}")]
    UnsupportedLayout { layout: u8 },

    /// Underlying filesystem failure.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_out_of_range_names_both_bounds() {
        let err = ArrayError::IndexOutOfRange { index: 7, length: 4 };
        assert_eq!(
            err.to_string(),
            "index 7 out of range for array of length 4"
        );
    }

    #[test]
    fn io_failure_wraps_platform_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ArrayError::from(io);
        assert!(matches!(err, ArrayError::Io(_)));
    }

    #[test]
    fn array_error_downcasts_from_eyre_report() {
        let report = eyre::Report::new(ArrayError::BadRecord { marker: 0x42 });
        let kind = report.downcast_ref::<ArrayError>();
        assert!(matches!(kind, Some(ArrayError::BadRecord { marker: 0x42 })));
    }
}
