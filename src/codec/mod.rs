//! # Record Codecs and the Type Registry
//!
//! Every array stores records of exactly one declared type. A [`Codec`]
//! turns a value (or the null marker) into exactly `record_size` bytes and
//! back; a [`TypeDescriptor`] names the type (`tag`) and its fixed encoded
//! size. The array itself is generic over its codec; the process-wide
//! registry exists for open-time discovery: it remembers which descriptor
//! belongs to which tag so that a file's stored record size can be checked
//! against the codec the caller supplies.
//!
//! ## Record Binary Layout
//!
//! ```text
//! +--------------+----------------------------+
//! | Marker (u8)  | Payload (record_size - 1)  |
//! +--------------+----------------------------+
//! ```
//!
//! | Marker  | Meaning                                   |
//! |---------|-------------------------------------------|
//! | `0x0F`  | Null record; payload bytes are irrelevant |
//! | `0x00`  | Value present; payload is the encoding    |
//! | other   | Rejected with `BadRecord`                 |
//!
//! The marker byte is counted in `record_size`, so `record_size >= 2`.
//!
//! ## Preregistered Codecs
//!
//! | Tag     | Size | Payload                  |
//! |---------|------|--------------------------|
//! | `int32` | 5    | big-endian `i32`         |
//! | `int64` | 9    | big-endian `i64`         |
//!
//! Custom codecs are registered once per process; re-registering the same
//! tag with a different size is rejected, since two arrays disagreeing on
//! a tag's record size could silently mis-address each other's files.

mod primitives;

pub use primitives::{Int32Codec, Int64Codec};

use std::any::Any;
use std::sync::{Arc, LazyLock};

use eyre::{bail, ensure, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::error::ArrayError;

/// Leading byte of a null record.
pub const NULL_MARKER: u8 = 0x0F;
/// Leading byte of a value-bearing record.
pub const VALUE_MARKER: u8 = 0x00;

/// Identifies a record type: a tag and its fixed encoded size in bytes
/// (marker byte included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub tag: &'static str,
    pub size: usize,
}

impl TypeDescriptor {
    pub const fn new(tag: &'static str, size: usize) -> Self {
        Self { tag, size }
    }
}

/// Byte codec for one record type.
///
/// `encode` must fill exactly `descriptor().size` bytes; `decode` reads the
/// same span back. `None` stands for the null record on both sides.
pub trait Codec {
    type Value;

    fn descriptor(&self) -> TypeDescriptor;

    fn encode(&self, value: Option<&Self::Value>, out: &mut [u8]) -> Result<()>;

    fn decode(&self, bytes: &[u8]) -> Result<Option<Self::Value>>;
}

struct Entry {
    descriptor: TypeDescriptor,
    codec: Arc<dyn Any + Send + Sync>,
}

static REGISTRY: LazyLock<RwLock<HashMap<&'static str, Entry>>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    seed(&mut map, Int32Codec);
    seed(&mut map, Int64Codec);
    RwLock::new(map)
});

fn seed<C>(map: &mut HashMap<&'static str, Entry>, codec: C)
where
    C: Codec + Send + Sync + 'static,
{
    let descriptor = codec.descriptor();
    map.insert(
        descriptor.tag,
        Entry {
            descriptor,
            codec: Arc::new(codec),
        },
    );
}

/// Registers a codec under its descriptor's tag.
///
/// Registering the same tag again with an equal size replaces the codec;
/// an equal tag with a different size is rejected.
pub fn register<C>(codec: C) -> Result<()>
where
    C: Codec + Send + Sync + 'static,
{
    let descriptor = codec.descriptor();
    ensure!(
        descriptor.size >= 2,
        "record size {} for tag '{}' leaves no room for the marker byte",
        descriptor.size,
        descriptor.tag
    );

    let mut registry = REGISTRY.write();
    if let Some(existing) = registry.get(descriptor.tag) {
        if existing.descriptor.size != descriptor.size {
            bail!(
                "tag '{}' already registered with record size {}, refusing size {}",
                descriptor.tag,
                existing.descriptor.size,
                descriptor.size
            );
        }
    }
    registry.insert(
        descriptor.tag,
        Entry {
            descriptor,
            codec: Arc::new(codec),
        },
    );
    Ok(())
}

/// Looks up a registered codec by descriptor, typed as `C`.
///
/// Returns `None` when the tag is unknown, the sizes disagree, or the
/// registered codec is of a different concrete type.
pub fn lookup<C>(descriptor: &TypeDescriptor) -> Option<Arc<C>>
where
    C: Codec + Send + Sync + 'static,
{
    let registry = REGISTRY.read();
    let entry = registry.get(descriptor.tag)?;
    if entry.descriptor.size != descriptor.size {
        return None;
    }
    entry.codec.clone().downcast::<C>().ok()
}

/// Returns the registered descriptor for a tag, if any.
pub fn descriptor_for(tag: &str) -> Option<TypeDescriptor> {
    REGISTRY.read().get(tag).map(|entry| entry.descriptor)
}

/// Checks that `descriptor` does not contradict a registered tag. Unknown
/// tags pass; only an equal tag with a different size is rejected.
pub(crate) fn check_conflict(descriptor: &TypeDescriptor) -> Result<()> {
    match descriptor_for(descriptor.tag) {
        Some(known) if known.size != descriptor.size => bail!(
            "tag '{}' is registered with record size {}, codec declares {}",
            descriptor.tag,
            known.size,
            descriptor.size
        ),
        _ => Ok(()),
    }
}

/// Checks that `descriptor` matches what the registry knows about its tag.
pub(crate) fn verify(descriptor: &TypeDescriptor) -> Result<()> {
    match descriptor_for(descriptor.tag) {
        Some(known) if known.size == descriptor.size => Ok(()),
        Some(known) => bail!(
            "tag '{}' is registered with record size {}, codec declares {}",
            descriptor.tag,
            known.size,
            descriptor.size
        ),
        None => bail!("no codec registered for tag '{}'", descriptor.tag),
    }
}

/// Decodes a marker byte, rejecting anything but the two sentinels.
pub(crate) fn check_marker(marker: u8) -> Result<bool> {
    match marker {
        NULL_MARKER => Ok(false),
        VALUE_MARKER => Ok(true),
        other => Err(ArrayError::BadRecord { marker: other }.into()),
    }
}
