//! # Storage Layer
//!
//! Everything between the array's public operations and the bytes on disk:
//!
//! - `headers`: the self-describing file header (magic, version word,
//!   length, record size)
//! - `file`: the handle cache over the backing random-access file
//! - `layout`: record index → absolute byte offset addressing
//! - `queue`: the bounded dirty-index queue behind write coalescing
//! - `window`: the ring-shaped in-memory record window
//!
//! ## File Layout
//!
//! ```text
//! +--------------------+
//! | Header (20 bytes)  |  magic + version word + length + record_size
//! +--------------------+
//! | Record 0           |  record_size bytes, marker byte first
//! +--------------------+
//! | Record 1           |
//! +--------------------+
//! | ...                |
//! +--------------------+
//! | Record length - 1  |
//! +--------------------+
//! ```
//!
//! Record `i` occupies bytes
//! `[HEADER_SIZE + i * record_size, HEADER_SIZE + (i + 1) * record_size)`.
//! The file size after creation is exactly
//! `HEADER_SIZE + length * record_size` and never changes afterwards.
//!
//! ## Access Model
//!
//! One process, one thread, one shared file cursor. Every read and write
//! path seeks before touching the file, so the cursor position between
//! operations carries no meaning. Buffered sequential views
//! (`BufReader`/`BufWriter`) wrap the acquired handle per operation; their
//! seek implementations discard or flush the buffer, which is exactly the
//! invalidation the prefetch loop and the gap-aware chunk flush rely on.

mod file;
mod headers;
mod layout;
mod queue;
mod window;

pub use headers::{
    ArrayHeader, CRITICAL_VERSION, FLAGS_FIXED_LAYOUT, MAGIC, MAJOR_VERSION, MINOR_VERSION,
};
pub use layout::{FixedLayout, RecordLayout};

pub(crate) use file::FileCache;
pub(crate) use queue::ChunkQueue;
pub(crate) use window::Window;

/// Total header size in bytes: 6-byte magic, 4-byte version word, and two
/// marker-prefixed big-endian `i32` fields.
pub const HEADER_SIZE: usize = 6 + 4 + 2 * 5;
