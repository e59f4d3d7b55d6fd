//! Binary clip format definitions for Clipforge
//!
//! POD types, enums, and constants describing the compiled animation-clip
//! blob. Shared between the offline compiler (`clipforge-compiler`) and the
//! runtime player, which only ever reads this layout.
//!
//! All multi-byte fields are little-endian. The format is not portable to
//! big-endian consumers by design.

mod channel;
mod commands;
mod compression;
mod header;

pub use channel::*;
pub use commands::*;
pub use compression::*;
pub use header::*;

/// Magic bytes at offset 0 of every compiled clip ("CFRG" little-endian)
pub const CLIP_MAGIC: u32 = u32::from_le_bytes(*b"CFRG");

/// Current clip format version
pub const CLIP_VERSION: u32 = 1;

/// Size of the runtime key cache, in bytes. Every decompression batch the
/// compiler schedules must stage its keys within this budget.
pub const KEY_CACHE_SIZE: u32 = 16 * 1024;

/// Cache slot size for vector and quaternion channels (bytes per key per item)
pub const VECTOR_SLOT_BYTES: u16 = 32;

/// Cache slot size for scalar float channels (bytes per key per item)
pub const SCALAR_SLOT_BYTES: u16 = 8;

/// Alignment required when an unshared-scheme output command switches channel
/// kind: the runtime's tween-factor table starts on a 128-byte boundary.
pub const TWEEN_ALIGN: u32 = 128;

/// Number of frames covered by one unshared-scheme frame block. Intra-block
/// key offsets are stored as u8 deltas from the block's first frame.
pub const BLOCK_FRAMES: u16 = 64;

/// Major section alignment inside a compiled clip
pub const SECTION_ALIGN: usize = 16;

/// Sub-record alignment inside a section
pub const RECORD_ALIGN: usize = 4;
