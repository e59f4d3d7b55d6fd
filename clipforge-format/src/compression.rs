//! Compression kinds and keyframe schemes
//!
//! Only concrete compression kinds are ever serialized. "Auto" selection
//! happens in the compiler before any bytes are written.

use serde::{Deserialize, Serialize};

use crate::ChannelKind;

/// Concrete per-channel compression kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionKind {
    /// Raw f32 samples (4×f32 vector, 1×f32 scalar)
    Uncompressed = 0,
    /// Half-float samples (4×f16 vector, 1×f16 scalar)
    Float16 = 1,
    /// Range-quantized vector: per-component bit widths with scale/bias
    /// range data. The bit layout is stored per instance.
    RangeVector = 2,
    /// 32-bit smallest-three quaternion (10/10/10 + 2-bit dropped index)
    QuatSmallestThree = 3,
    /// Quaternion log vector, 3×16-bit range-quantized, with a shared mean
    /// orientation in range data
    QuatLog = 4,
    /// Quaternion log vector with pre/post orientations in range data
    QuatLogOriented = 5,
    /// Constant-only 48-bit vector (3×f16)
    ConstVec48 = 6,
    /// Constant-only 48-bit quaternion (15/15/15 + 2-bit dropped index)
    ConstQuat48 = 7,
}

impl CompressionKind {
    /// Payload bits per sample, excluding range data
    ///
    /// `RangeVector` has a per-instance bit layout; this returns its default.
    pub fn bits_per_sample(&self, channel_kind: ChannelKind) -> u16 {
        let scalar = channel_kind == ChannelKind::Float;
        match self {
            CompressionKind::Uncompressed => {
                if scalar {
                    32
                } else {
                    128
                }
            }
            CompressionKind::Float16 => {
                if scalar {
                    16
                } else {
                    64
                }
            }
            CompressionKind::RangeVector => 33,
            CompressionKind::QuatSmallestThree => 32,
            CompressionKind::QuatLog | CompressionKind::QuatLogOriented => 48,
            CompressionKind::ConstVec48 | CompressionKind::ConstQuat48 => 48,
        }
    }

    /// Number of in-cache decompression sub-steps the runtime applies
    ///
    /// Constant kinds never pass through the key cache and report 0.
    pub fn decompress_steps(&self) -> usize {
        match self {
            CompressionKind::Uncompressed => 0,
            CompressionKind::Float16 | CompressionKind::QuatSmallestThree => 1,
            CompressionKind::RangeVector
            | CompressionKind::QuatLog
            | CompressionKind::QuatLogOriented => 2,
            CompressionKind::ConstVec48 | CompressionKind::ConstQuat48 => 0,
        }
    }

    /// Item alignment (in cache slots) required by this kind's decompression
    /// pass. Batches are padded to a multiple of this so one pass cannot
    /// clobber a neighboring batch.
    pub fn decompress_alignment(&self) -> u8 {
        match self {
            CompressionKind::Float16 => 2,
            CompressionKind::RangeVector => 4,
            _ => 1,
        }
    }

    /// Whether this kind is restricted to constant channels
    pub fn is_const_only(&self) -> bool {
        matches!(
            self,
            CompressionKind::ConstVec48 | CompressionKind::ConstQuat48
        )
    }

    /// Whether this kind's bit-packing layout must be stored per instance
    pub fn has_instance_format(&self) -> bool {
        matches!(self, CompressionKind::RangeVector)
    }
}

impl TryFrom<u8> for CompressionKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionKind::Uncompressed),
            1 => Ok(CompressionKind::Float16),
            2 => Ok(CompressionKind::RangeVector),
            3 => Ok(CompressionKind::QuatSmallestThree),
            4 => Ok(CompressionKind::QuatLog),
            5 => Ok(CompressionKind::QuatLogOriented),
            6 => Ok(CompressionKind::ConstVec48),
            7 => Ok(CompressionKind::ConstQuat48),
            other => Err(other),
        }
    }
}

/// Keyframe scheme, stored in the clip header flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeySchemeKind {
    /// Every source frame is a key; embedded command block
    #[default]
    Uniform = 0,
    /// Uniform keys in the shared layout without an embedded command block
    Uniform2 = 1,
    /// One clip-wide non-uniform key set applied to every channel
    SharedNonUniform = 2,
    /// Independent per-channel keys grouped into fixed-size frame blocks
    UnsharedNonUniform = 3,
    /// Hermite-spline float channels; bypasses the command machinery
    Spline = 4,
}

impl KeySchemeKind {
    /// Whether this scheme writes an embedded command block
    pub fn has_command_block(&self) -> bool {
        matches!(
            self,
            KeySchemeKind::Uniform
                | KeySchemeKind::SharedNonUniform
                | KeySchemeKind::UnsharedNonUniform
        )
    }

    /// Whether scalar cache slots are padded up to vector size (the runtime
    /// sizes its per-item tween-factor slots for vectors under block keys)
    pub fn pads_scalar_slots(&self) -> bool {
        matches!(self, KeySchemeKind::UnsharedNonUniform)
    }
}

impl TryFrom<u8> for KeySchemeKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeySchemeKind::Uniform),
            1 => Ok(KeySchemeKind::Uniform2),
            2 => Ok(KeySchemeKind::SharedNonUniform),
            3 => Ok(KeySchemeKind::UnsharedNonUniform),
            4 => Ok(KeySchemeKind::Spline),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for v in 0..=7u8 {
            let kind = CompressionKind::try_from(v).unwrap();
            assert_eq!(kind as u8, v);
        }
        assert!(CompressionKind::try_from(8).is_err());
    }

    #[test]
    fn test_const_kinds_have_no_cache_steps() {
        assert_eq!(CompressionKind::ConstVec48.decompress_steps(), 0);
        assert_eq!(CompressionKind::ConstQuat48.decompress_steps(), 0);
        assert!(CompressionKind::ConstVec48.is_const_only());
    }

    #[test]
    fn test_two_step_kinds() {
        assert_eq!(CompressionKind::QuatLog.decompress_steps(), 2);
        assert_eq!(CompressionKind::QuatLogOriented.decompress_steps(), 2);
        assert_eq!(CompressionKind::RangeVector.decompress_steps(), 2);
        assert_eq!(CompressionKind::QuatSmallestThree.decompress_steps(), 1);
    }

    #[test]
    fn test_scheme_flags() {
        assert!(KeySchemeKind::Uniform.has_command_block());
        assert!(!KeySchemeKind::Uniform2.has_command_block());
        assert!(!KeySchemeKind::Spline.has_command_block());
        assert!(KeySchemeKind::UnsharedNonUniform.pads_scalar_slots());
        assert!(!KeySchemeKind::SharedNonUniform.pads_scalar_slots());
    }
}
