//! # File Header
//!
//! The first 20 bytes of every array file describe the file itself:
//!
//! ```text
//! Offset  Size  Description
//! 0       6     Magic: DE CA DA FA CA DA
//! 6       1     Critical version (equality required)
//! 7       1     Major version (reader must be >= stored)
//! 8       1     Minor version (informational)
//! 9       1     Layout flags: AA BB CC DD, 2 bits each
//! 10      5     length: marker byte + big-endian i32
//! 15      5     record_size: marker byte + big-endian i32
//! ```
//!
//! Layout flag groups, low bits first:
//!
//! | Group | Bits | Meaning                                       |
//! |-------|------|-----------------------------------------------|
//! | `DD`  | 0-1  | Record layout: 0 variable, 1 fixed            |
//! | `CC`  | 2-3  | Chunking: 0 linear, 1 chunked, 2-3 reserved   |
//! | `BB`  | 4-5  | Ordering: 0 sequential, 1 reserved            |
//! | `AA`  | 6-7  | Reserved                                      |
//!
//! The current writer emits version `(1, 1, 0)` with `DD = 1`. All
//! multi-byte fields are big-endian; the zerocopy `I32<BigEndian>` wrapper
//! handles conversion, and the whole struct is `Unaligned` so it can be
//! parsed from any byte offset.

use eyre::Result;
use zerocopy::big_endian::I32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::layout::RecordLayout;
use super::HEADER_SIZE;
use crate::codec::VALUE_MARKER;
use crate::error::ArrayError;

/// Six magic bytes opening every array file ("DECADAFACADA").
pub const MAGIC: [u8; 6] = [0xDE, 0xCA, 0xDA, 0xFA, 0xCA, 0xDA];

/// No compatibility across critical versions.
pub const CRITICAL_VERSION: u8 = 1;
/// Forward-compatible; a reader must be at least the stored major version.
pub const MAJOR_VERSION: u8 = 1;
/// Fully compatible both ways.
pub const MINOR_VERSION: u8 = 0;

/// Layout flags as emitted by the current writer: fixed record layout,
/// linear chunking, sequential ordering.
pub const FLAGS_FIXED_LAYOUT: u8 = 0b0000_0001;

const LAYOUT_MASK: u8 = 0b0000_0011;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ArrayHeader {
    magic: [u8; 6],
    critical: u8,
    major: u8,
    minor: u8,
    flags: u8,
    length_marker: u8,
    length: I32,
    record_size_marker: u8,
    record_size: I32,
}

const _: () = assert!(std::mem::size_of::<ArrayHeader>() == HEADER_SIZE);

impl ArrayHeader {
    /// Header for a freshly created fixed-layout file.
    pub fn new(length: i32, record_size: i32) -> Self {
        Self {
            magic: MAGIC,
            critical: CRITICAL_VERSION,
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            flags: FLAGS_FIXED_LAYOUT,
            length_marker: VALUE_MARKER,
            length: I32::new(length),
            record_size_marker: VALUE_MARKER,
            record_size: I32::new(record_size),
        }
    }

    /// Parses and validates a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(ArrayError::BadHeader {
                detail: format!("truncated header: {} of {HEADER_SIZE} bytes", bytes.len()),
            }
            .into());
        }

        let header = Self::ref_from_bytes(&bytes[..HEADER_SIZE]).map_err(|e| {
            ArrayError::BadHeader {
                detail: format!("unparseable header: {e:?}"),
            }
        })?;

        if header.magic != MAGIC {
            return Err(ArrayError::BadHeader {
                detail: format!("magic mismatch: {:02X?}", header.magic),
            }
            .into());
        }

        if header.critical != CRITICAL_VERSION || MAJOR_VERSION < header.major {
            return Err(ArrayError::IncompatibleVersion {
                stored_critical: header.critical,
                stored_major: header.major,
                stored_minor: header.minor,
                supported_critical: CRITICAL_VERSION,
                supported_major: MAJOR_VERSION,
                supported_minor: MINOR_VERSION,
            }
            .into());
        }

        if header.length_marker != VALUE_MARKER || header.record_size_marker != VALUE_MARKER {
            return Err(ArrayError::BadHeader {
                detail: format!(
                    "unexpected field markers {:#04x}/{:#04x}",
                    header.length_marker, header.record_size_marker
                ),
            }
            .into());
        }

        if header.length.get() < 0 || header.record_size.get() < 2 {
            return Err(ArrayError::BadHeader {
                detail: format!(
                    "implausible dimensions: length {}, record size {}",
                    header.length.get(),
                    header.record_size.get()
                ),
            }
            .into());
        }

        Ok(header)
    }

    pub fn length(&self) -> i32 {
        self.length.get()
    }

    pub fn record_size(&self) -> i32 {
        self.record_size.get()
    }

    pub fn version(&self) -> (u8, u8, u8) {
        (self.critical, self.major, self.minor)
    }

    /// The `DD` record-layout group of the flags word.
    pub fn layout(&self) -> Result<RecordLayout> {
        RecordLayout::from_flags(self.flags & LAYOUT_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_is_20() {
        assert_eq!(std::mem::size_of::<ArrayHeader>(), HEADER_SIZE);
    }

    #[test]
    fn header_roundtrip() {
        let header = ArrayHeader::new(1024, 5);
        let bytes = header.as_bytes();

        let parsed = ArrayHeader::from_bytes(bytes).unwrap();
        assert_eq!(parsed.length(), 1024);
        assert_eq!(parsed.record_size(), 5);
        assert_eq!(parsed.version(), (1, 1, 0));
        assert_eq!(parsed.layout().unwrap(), RecordLayout::Fixed);
    }

    #[test]
    fn wire_bytes_are_exact() {
        let header = ArrayHeader::new(4, 5);
        let expected: [u8; HEADER_SIZE] = [
            0xDE, 0xCA, 0xDA, 0xFA, 0xCA, 0xDA, // magic
            0x01, 0x01, 0x00, 0b0000_0001, // version word
            0x00, 0x00, 0x00, 0x00, 0x04, // length = 4
            0x00, 0x00, 0x00, 0x00, 0x05, // record_size = 5
        ];
        assert_eq!(header.as_bytes(), expected);
    }

    #[test]
    fn magic_mismatch_is_bad_header() {
        let mut bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        bytes[0] = 0x00;
        let err = ArrayHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::BadHeader { .. })
        ));
    }

    #[test]
    fn truncated_header_is_bad_header() {
        let bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        let err = ArrayHeader::from_bytes(&bytes[..HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::BadHeader { .. })
        ));
    }

    #[test]
    fn differing_critical_version_is_incompatible() {
        let mut bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        bytes[6] = CRITICAL_VERSION + 1;
        let err = ArrayHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::IncompatibleVersion { stored_critical: 2, .. })
        ));
    }

    #[test]
    fn newer_stored_major_is_incompatible() {
        let mut bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        bytes[7] = MAJOR_VERSION + 1;
        let err = ArrayHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn older_stored_major_is_accepted() {
        let mut bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        bytes[7] = 0;
        assert!(ArrayHeader::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn minor_version_is_informational() {
        let mut bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        bytes[8] = 9;
        assert!(ArrayHeader::from_bytes(&bytes).is_ok());
    }

    #[test]
    fn negative_length_is_bad_header() {
        let mut bytes = ArrayHeader::new(1, 5).as_bytes().to_vec();
        bytes[11] = 0xFF;
        let err = ArrayHeader::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArrayError>(),
            Some(ArrayError::BadHeader { .. })
        ));
    }
}
