//! Clip and group header records
//!
//! # Layout
//! ```text
//! ClipHeader (32 bytes):
//! 0x00: magic u32              - CLIP_MAGIC ("CFRG")
//! 0x04: version u32            - CLIP_VERSION
//! 0x08: total_size u32         - total blob size, patched after writing
//! 0x0C: hierarchy_id u32       - id of the hierarchy this clip binds to
//! 0x10: group_count u16        - number of processing groups
//! 0x12: frame_count u16        - source frame count
//! 0x14: flags u16              - scheme + looping/additive/root-motion bits
//! 0x16: reserved u16           - always 0
//! 0x18: frame_rate f32         - frames per second
//! 0x1C: root_motion_offset u32 - patched link to the extension record, 0 = none
//!
//! GroupHeader (32 bytes):
//! 0x00: first_joint u16        0x08: command_count u16
//! 0x02: joint_count u16        0x0A: const_count u16
//! 0x04: first_float u16        0x0C: batch_count u16
//! 0x06: float_count u16        0x0E: cache_bytes u16
//! 0x10: mask_offset u32        0x18: const_offset u32
//! 0x14: command_offset u32     0x1C: key_data_offset u32
//! ```
//! All four group offsets are forward-declared links patched once the target
//! section's position is known.

use crate::{KeySchemeKind, CLIP_MAGIC, CLIP_VERSION};

/// Flag bits in `ClipHeader::flags`
pub mod clip_flags {
    /// Keyframe scheme occupies the low 3 bits
    pub const SCHEME_MASK: u16 = 0x0007;
    /// Clip loops; the last key of uniform channels duplicates frame 0
    pub const LOOPING: u16 = 0x0008;
    /// Clip samples are additive deltas over a base pose
    pub const ADDITIVE: u16 = 0x0010;
    /// A root-motion extension record trails the group data
    pub const ROOT_MOTION: u16 = 0x0020;
}

/// Compiled clip header (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipHeader {
    pub magic: u32,
    pub version: u32,
    pub total_size: u32,
    pub hierarchy_id: u32,
    pub group_count: u16,
    pub frame_count: u16,
    pub flags: u16,
    pub frame_rate: f32,
    pub root_motion_offset: u32,
}

impl ClipHeader {
    pub const SIZE: usize = 32;

    /// Byte offset of the `total_size` field (patched after writing)
    pub const TOTAL_SIZE_OFFSET: usize = 0x08;

    /// Byte offset of the `root_motion_offset` field
    pub const ROOT_MOTION_OFFSET: usize = 0x1C;

    pub fn new(hierarchy_id: u32, group_count: u16, frame_count: u16, frame_rate: f32) -> Self {
        Self {
            magic: CLIP_MAGIC,
            version: CLIP_VERSION,
            total_size: 0,
            hierarchy_id,
            group_count,
            frame_count,
            flags: 0,
            frame_rate,
            root_motion_offset: 0,
        }
    }

    /// Keyframe scheme encoded in the flags
    pub fn scheme(&self) -> Option<KeySchemeKind> {
        KeySchemeKind::try_from((self.flags & clip_flags::SCHEME_MASK) as u8).ok()
    }

    pub fn set_scheme(&mut self, scheme: KeySchemeKind) {
        self.flags = (self.flags & !clip_flags::SCHEME_MASK) | scheme as u16;
    }

    pub fn is_looping(&self) -> bool {
        self.flags & clip_flags::LOOPING != 0
    }

    pub fn is_additive(&self) -> bool {
        self.flags & clip_flags::ADDITIVE != 0
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0x00..0x04].copy_from_slice(&self.magic.to_le_bytes());
        bytes[0x04..0x08].copy_from_slice(&self.version.to_le_bytes());
        bytes[0x08..0x0C].copy_from_slice(&self.total_size.to_le_bytes());
        bytes[0x0C..0x10].copy_from_slice(&self.hierarchy_id.to_le_bytes());
        bytes[0x10..0x12].copy_from_slice(&self.group_count.to_le_bytes());
        bytes[0x12..0x14].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes[0x14..0x16].copy_from_slice(&self.flags.to_le_bytes());
        // 0x16..0x18 reserved
        bytes[0x18..0x1C].copy_from_slice(&self.frame_rate.to_le_bytes());
        bytes[0x1C..0x20].copy_from_slice(&self.root_motion_offset.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let u32_at = |o: usize| u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());
        let u16_at = |o: usize| u16::from_le_bytes(bytes[o..o + 2].try_into().unwrap());
        Some(Self {
            magic: u32_at(0x00),
            version: u32_at(0x04),
            total_size: u32_at(0x08),
            hierarchy_id: u32_at(0x0C),
            group_count: u16_at(0x10),
            frame_count: u16_at(0x12),
            flags: u16_at(0x14),
            frame_rate: f32::from_le_bytes(bytes[0x18..0x1C].try_into().unwrap()),
            root_motion_offset: u32_at(0x1C),
        })
    }

    pub fn validate(&self) -> bool {
        self.magic == CLIP_MAGIC
            && self.version == CLIP_VERSION
            && self.frame_count > 0
            && self.frame_rate > 0.0
            // Spline clips carry no processing groups
            && match self.scheme() {
                Some(KeySchemeKind::Spline) => true,
                Some(_) => self.group_count > 0,
                None => false,
            }
    }
}

/// Per-processing-group header record (32 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupHeader {
    pub first_joint: u16,
    pub joint_count: u16,
    pub first_float: u16,
    pub float_count: u16,
    pub command_count: u16,
    pub const_count: u16,
    pub batch_count: u16,
    pub cache_bytes: u16,
    pub mask_offset: u32,
    pub command_offset: u32,
    pub const_offset: u32,
    pub key_data_offset: u32,
}

impl GroupHeader {
    pub const SIZE: usize = 32;

    /// Byte offsets of the four patched links within the record
    pub const MASK_LINK: usize = 0x10;
    pub const COMMAND_LINK: usize = 0x14;
    pub const CONST_LINK: usize = 0x18;
    pub const KEY_DATA_LINK: usize = 0x1C;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0x00..0x02].copy_from_slice(&self.first_joint.to_le_bytes());
        bytes[0x02..0x04].copy_from_slice(&self.joint_count.to_le_bytes());
        bytes[0x04..0x06].copy_from_slice(&self.first_float.to_le_bytes());
        bytes[0x06..0x08].copy_from_slice(&self.float_count.to_le_bytes());
        bytes[0x08..0x0A].copy_from_slice(&self.command_count.to_le_bytes());
        bytes[0x0A..0x0C].copy_from_slice(&self.const_count.to_le_bytes());
        bytes[0x0C..0x0E].copy_from_slice(&self.batch_count.to_le_bytes());
        bytes[0x0E..0x10].copy_from_slice(&self.cache_bytes.to_le_bytes());
        bytes[0x10..0x14].copy_from_slice(&self.mask_offset.to_le_bytes());
        bytes[0x14..0x18].copy_from_slice(&self.command_offset.to_le_bytes());
        bytes[0x18..0x1C].copy_from_slice(&self.const_offset.to_le_bytes());
        bytes[0x1C..0x20].copy_from_slice(&self.key_data_offset.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let u32_at = |o: usize| u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());
        let u16_at = |o: usize| u16::from_le_bytes(bytes[o..o + 2].try_into().unwrap());
        Some(Self {
            first_joint: u16_at(0x00),
            joint_count: u16_at(0x02),
            first_float: u16_at(0x04),
            float_count: u16_at(0x06),
            command_count: u16_at(0x08),
            const_count: u16_at(0x0A),
            batch_count: u16_at(0x0C),
            cache_bytes: u16_at(0x0E),
            mask_offset: u32_at(0x10),
            command_offset: u32_at(0x14),
            const_offset: u32_at(0x18),
            key_data_offset: u32_at(0x1C),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_header_roundtrip() {
        let mut header = ClipHeader::new(0xC0FFEE, 3, 120, 30.0);
        header.set_scheme(KeySchemeKind::SharedNonUniform);
        header.flags |= clip_flags::LOOPING;
        header.total_size = 4096;

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), ClipHeader::SIZE);

        let parsed = ClipHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.scheme(), Some(KeySchemeKind::SharedNonUniform));
        assert!(parsed.is_looping());
        assert!(!parsed.is_additive());
        assert!(parsed.validate());
    }

    #[test]
    fn test_clip_header_rejects_bad_magic() {
        let mut header = ClipHeader::new(1, 1, 1, 30.0);
        header.magic = 0xDEAD;
        assert!(!header.validate());
    }

    #[test]
    fn test_clip_header_from_short_bytes() {
        assert!(ClipHeader::from_bytes(&[0u8; 16]).is_none());
    }

    #[test]
    fn test_group_header_roundtrip() {
        let header = GroupHeader {
            first_joint: 8,
            joint_count: 12,
            first_float: 2,
            float_count: 5,
            command_count: 7,
            const_count: 2,
            batch_count: 1,
            cache_bytes: 4096,
            mask_offset: 0x40,
            command_offset: 0x80,
            const_offset: 0x200,
            key_data_offset: 0x400,
        };
        let parsed = GroupHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_link_field_offsets() {
        // The writer patches these fields in place; the offsets must match
        // the serialized layout exactly.
        let mut header = GroupHeader::default();
        header.mask_offset = 0xAABBCCDD;
        let bytes = header.to_bytes();
        assert_eq!(
            u32::from_le_bytes(
                bytes[GroupHeader::MASK_LINK..GroupHeader::MASK_LINK + 4]
                    .try_into()
                    .unwrap()
            ),
            0xAABBCCDD
        );
    }
}
