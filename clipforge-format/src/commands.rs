//! Runtime command kinds
//!
//! A compiled clip's command block is an ordered list of primitive
//! operations the runtime replays per pose: copy raw keys into the key
//! cache, decompress them in place, then blend/interpolate into the pose
//! buffer. Command kinds are grouped by opcode range:
//!
//! ```text
//! 0x00..0x10  key copy
//! 0x10..0x20  decompress
//! 0x20..0x30  output
//! ```

use serde::{Deserialize, Serialize};

/// Role an animation command plays in the cache pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CmdRole {
    KeyCopy,
    Decompress,
    Output,
}

/// Animation command kind (serialized opcode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnimCmd {
    // ------------------------------------------------------------------
    // Key copy (0x00..0x10)
    // ------------------------------------------------------------------
    /// Copy keys into 8-byte scalar cache slots
    CopyKeys8 = 0x00,
    /// Copy keys into 32-byte vector/quaternion cache slots
    CopyKeys32 = 0x01,
    /// Block-keyed copy into 8-byte slots (unshared scheme)
    CopyKeysBlock8 = 0x02,
    /// Block-keyed copy into 32-byte slots (unshared scheme)
    CopyKeysBlock32 = 0x03,

    // ------------------------------------------------------------------
    // Decompress (0x10..0x20)
    // ------------------------------------------------------------------
    /// Expand f16 samples to f32 in place
    DecompressFloat16 = 0x10,
    /// Unpack range-quantized component bits
    UnpackRangeBits = 0x11,
    /// Apply scale/bias range expansion to unpacked components
    ExpandRange = 0x12,
    /// Reconstruct a smallest-three quaternion
    DecompressQuatSmallestThree = 0x13,
    /// Range-decompress a quantized quaternion log vector (sub-step 0)
    DecompressQuatLogRange = 0x14,
    /// Rebuild quaternions from log vectors and the mean orientation
    /// (sub-step 1)
    ReconstructQuatLog = 0x15,
    /// Rebuild quaternions from log vectors with pre/post orientations
    /// (sub-step 1, oriented variant)
    ReconstructQuatLogOriented = 0x16,

    // ------------------------------------------------------------------
    // Output (0x20..0x30)
    // ------------------------------------------------------------------
    /// Lerp vector cache slots into the pose buffer (uniform keys)
    OutputLerp = 0x20,
    /// Slerp quaternion cache slots into the pose buffer (uniform keys)
    OutputSlerp = 0x21,
    /// Lerp scalar cache slots into the pose buffer (uniform keys)
    OutputScalarLerp = 0x22,
    /// Lerp vectors using per-item tween factors (block keys)
    OutputBlockLerp = 0x23,
    /// Slerp quaternions using per-item tween factors (block keys)
    OutputBlockSlerp = 0x24,
    /// Lerp scalars using per-item tween factors (block keys)
    OutputBlockScalarLerp = 0x25,
}

impl AnimCmd {
    /// Pipeline role of this command
    pub fn role(&self) -> CmdRole {
        match *self as u8 {
            0x00..=0x0F => CmdRole::KeyCopy,
            0x10..=0x1F => CmdRole::Decompress,
            _ => CmdRole::Output,
        }
    }
}

impl TryFrom<u8> for AnimCmd {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(AnimCmd::CopyKeys8),
            0x01 => Ok(AnimCmd::CopyKeys32),
            0x02 => Ok(AnimCmd::CopyKeysBlock8),
            0x03 => Ok(AnimCmd::CopyKeysBlock32),
            0x10 => Ok(AnimCmd::DecompressFloat16),
            0x11 => Ok(AnimCmd::UnpackRangeBits),
            0x12 => Ok(AnimCmd::ExpandRange),
            0x13 => Ok(AnimCmd::DecompressQuatSmallestThree),
            0x14 => Ok(AnimCmd::DecompressQuatLogRange),
            0x15 => Ok(AnimCmd::ReconstructQuatLog),
            0x16 => Ok(AnimCmd::ReconstructQuatLogOriented),
            0x20 => Ok(AnimCmd::OutputLerp),
            0x21 => Ok(AnimCmd::OutputSlerp),
            0x22 => Ok(AnimCmd::OutputScalarLerp),
            0x23 => Ok(AnimCmd::OutputBlockLerp),
            0x24 => Ok(AnimCmd::OutputBlockSlerp),
            0x25 => Ok(AnimCmd::OutputBlockScalarLerp),
            other => Err(other),
        }
    }
}

/// Serialized command record header size (before per-source operands)
///
/// ```text
/// 0x00: cmd u8
/// 0x01: alignment u8
/// 0x02: source_count u16
/// 0x04: item_count u16
/// 0x06: cache_offset u16
/// 0x08: cache_bytes u16
/// 0x0A: reserved u16
/// ```
pub const COMMAND_RECORD_SIZE: usize = 12;

/// Serialized operand size
///
/// ```text
/// 0x00: data_offset u32   (patched link into the key data section)
/// 0x04: first_channel u16
/// 0x06: channel_count u16
/// ```
pub const COMMAND_SOURCE_SIZE: usize = 8;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_by_opcode_range() {
        assert_eq!(AnimCmd::CopyKeys32.role(), CmdRole::KeyCopy);
        assert_eq!(AnimCmd::CopyKeysBlock8.role(), CmdRole::KeyCopy);
        assert_eq!(AnimCmd::ReconstructQuatLog.role(), CmdRole::Decompress);
        assert_eq!(AnimCmd::OutputSlerp.role(), CmdRole::Output);
        assert_eq!(AnimCmd::OutputBlockScalarLerp.role(), CmdRole::Output);
    }

    #[test]
    fn test_opcode_roundtrip() {
        for v in 0..=0xFFu8 {
            if let Ok(cmd) = AnimCmd::try_from(v) {
                assert_eq!(cmd as u8, v);
            }
        }
        assert!(AnimCmd::try_from(0x0F).is_err());
        assert!(AnimCmd::try_from(0xFF).is_err());
    }
}
