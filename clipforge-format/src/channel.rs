//! Channel identity and pose-buffer layout
//!
//! A channel is one animated or constant attribute of one joint (scale,
//! rotation, translation) or one float parameter. The runtime pose buffer
//! lays joints out as three 16-byte slots per joint, with float parameters
//! packed after the last joint:
//!
//! ```text
//! joint j: [scale vec4][rotation quat][translation vec4]   (48 bytes)
//! float f: [f32]                                           (4 bytes)
//! ```

use serde::{Deserialize, Serialize};

/// Bytes occupied by one joint in the runtime pose buffer
pub const JOINT_POSE_BYTES: u32 = 48;

/// Bytes occupied by one float parameter in the runtime pose buffer
pub const FLOAT_POSE_BYTES: u32 = 4;

/// Kind of animated attribute a channel carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelKind {
    /// Joint scale (vec3, stored in a vec4 slot)
    Scale = 0,
    /// Joint rotation (quaternion)
    Rotation = 1,
    /// Joint translation (vec3, stored in a vec4 slot)
    Translation = 2,
    /// Auxiliary float parameter
    Float = 3,
}

impl ChannelKind {
    /// All kinds in classification order
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Scale,
        ChannelKind::Rotation,
        ChannelKind::Translation,
        ChannelKind::Float,
    ];

    /// Whether this kind stores a vec4/quat sample (as opposed to a scalar)
    pub fn is_vector(&self) -> bool {
        !matches!(self, ChannelKind::Float)
    }

    /// Byte offset of this kind's slot within one joint's pose block
    pub fn joint_slot_offset(&self) -> u32 {
        match self {
            ChannelKind::Scale => 0,
            ChannelKind::Rotation => 16,
            ChannelKind::Translation => 32,
            ChannelKind::Float => 0,
        }
    }
}

impl TryFrom<u8> for ChannelKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelKind::Scale),
            1 => Ok(ChannelKind::Rotation),
            2 => Ok(ChannelKind::Translation),
            3 => Ok(ChannelKind::Float),
            other => Err(other),
        }
    }
}

/// Compute the pose-buffer byte offset for a channel
///
/// `local_index` is the joint or float index relative to the processing
/// group's first joint/float. Joint kinds address one of the three 16-byte
/// slots; floats pack after `joint_count` joints.
pub fn pose_offset(kind: ChannelKind, local_index: u16, joint_count: u16) -> u32 {
    match kind {
        ChannelKind::Float => {
            joint_count as u32 * JOINT_POSE_BYTES + local_index as u32 * FLOAT_POSE_BYTES
        }
        _ => local_index as u32 * JOINT_POSE_BYTES + kind.joint_slot_offset(),
    }
}

/// Offset of the "safe" scratch slot: one full joint slot past the live pose
/// data. Output and key-copy operations padded beyond the real channel count
/// land here without corrupting neighboring data.
pub fn safe_pose_offset(joint_count: u16, float_count: u16) -> u32 {
    joint_count as u32 * JOINT_POSE_BYTES + float_count as u32 * FLOAT_POSE_BYTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joint_slot_offsets() {
        assert_eq!(pose_offset(ChannelKind::Scale, 0, 4), 0);
        assert_eq!(pose_offset(ChannelKind::Rotation, 0, 4), 16);
        assert_eq!(pose_offset(ChannelKind::Translation, 0, 4), 32);
        assert_eq!(pose_offset(ChannelKind::Rotation, 2, 4), 2 * 48 + 16);
    }

    #[test]
    fn test_float_offsets_follow_joints() {
        assert_eq!(pose_offset(ChannelKind::Float, 0, 4), 4 * 48);
        assert_eq!(pose_offset(ChannelKind::Float, 3, 4), 4 * 48 + 12);
    }

    #[test]
    fn test_safe_offset_past_live_data() {
        let safe = safe_pose_offset(4, 3);
        assert_eq!(safe, 4 * 48 + 3 * 4);
        // Strictly past every live channel offset
        assert!(safe > pose_offset(ChannelKind::Float, 2, 4));
        assert!(safe > pose_offset(ChannelKind::Translation, 3, 4));
    }

    #[test]
    fn test_kind_from_u8() {
        for kind in ChannelKind::ALL {
            assert_eq!(ChannelKind::try_from(kind as u8), Ok(kind));
        }
        assert!(ChannelKind::try_from(4).is_err());
    }
}
