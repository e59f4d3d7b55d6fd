//! Source data model
//!
//! Read-only inputs supplied by external collaborators: the hierarchy
//! descriptor (processing-group boundaries), the binding (curve index to
//! joint/float index), and raw per-frame samples per animation curve.
//! The compiler never mutates these.

use clipforge_format::ChannelKind;

use crate::error::ClipError;

/// Joint/float index ranges of one processing group
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GroupRange {
    pub first_joint: u16,
    pub joint_count: u16,
    pub first_float: u16,
    pub float_count: u16,
}

/// Ordered processing-group boundaries for one hierarchy
///
/// Groups must partition the hierarchy's joints and floats exactly: no gaps,
/// no overlaps.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HierarchyDescriptor {
    pub hierarchy_id: u32,
    pub joint_count: u16,
    pub float_count: u16,
    pub groups: Vec<GroupRange>,
}

impl HierarchyDescriptor {
    /// Validate that the groups partition the joint and float ranges exactly
    pub fn validate(&self) -> Result<(), ClipError> {
        let mut next_joint = 0u16;
        let mut next_float = 0u16;
        for (i, group) in self.groups.iter().enumerate() {
            if group.first_joint != next_joint {
                return Err(ClipError::contract(format!(
                    "group {i} starts at joint {} but {} expected",
                    group.first_joint, next_joint
                )));
            }
            if group.first_float != next_float {
                return Err(ClipError::contract(format!(
                    "group {i} starts at float {} but {} expected",
                    group.first_float, next_float
                )));
            }
            next_joint += group.joint_count;
            next_float += group.float_count;
        }
        if next_joint != self.joint_count || next_float != self.float_count {
            return Err(ClipError::contract(format!(
                "groups cover {next_joint} joints / {next_float} floats, hierarchy has {} / {}",
                self.joint_count, self.float_count
            )));
        }
        Ok(())
    }
}

/// Target of one animation curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BindTarget {
    Joint(u16),
    Float(u16),
    /// Curve is present in the source data but drives nothing
    Unbound,
}

/// Per-curve index to joint/float index mapping
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Binding {
    pub targets: Vec<BindTarget>,
}

impl Binding {
    pub fn target(&self, curve: u16) -> BindTarget {
        self.targets
            .get(curve as usize)
            .copied()
            .unwrap_or(BindTarget::Unbound)
    }
}

/// Raw sample sequence of one curve
#[derive(Debug, Clone)]
pub enum TrackSamples {
    /// One vec4/quat per frame (scale and translation leave w unused)
    Vector(Vec<[f32; 4]>),
    /// One float per frame
    Scalar(Vec<f32>),
}

impl TrackSamples {
    pub fn len(&self) -> usize {
        match self {
            TrackSamples::Vector(v) => v.len(),
            TrackSamples::Scalar(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at `frame`, widened to a vec4 (scalars in the x lane)
    pub fn at(&self, frame: usize) -> [f32; 4] {
        match self {
            TrackSamples::Vector(v) => v[frame],
            TrackSamples::Scalar(v) => [v[frame], 0.0, 0.0, 0.0],
        }
    }
}

/// One source animation curve: identity, classification, and raw samples
#[derive(Debug, Clone)]
pub struct Track {
    pub curve: u16,
    pub kind: ChannelKind,
    /// Constant channels are compressed into the clip-wide constant pool
    pub constant: bool,
    pub samples: TrackSamples,
}

impl Track {
    pub fn vector(curve: u16, kind: ChannelKind, samples: Vec<[f32; 4]>) -> Self {
        Self {
            curve,
            kind,
            constant: false,
            samples: TrackSamples::Vector(samples),
        }
    }

    pub fn scalar(curve: u16, samples: Vec<f32>) -> Self {
        Self {
            curve,
            kind: ChannelKind::Float,
            constant: false,
            samples: TrackSamples::Scalar(samples),
        }
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }
}

/// Per-frame root motion, consumed on the CPU side (never cache-scheduled)
#[derive(Debug, Clone, Default)]
pub struct RootMotion {
    pub translation: Vec<[f32; 3]>,
    pub rotation: Vec<[f32; 4]>,
}

/// Uncompressed source clip: raw per-frame samples plus clip-wide flags
#[derive(Debug, Clone)]
pub struct SourceClip {
    pub name: String,
    pub frame_count: u16,
    pub frame_rate: f32,
    pub looping: bool,
    pub additive: bool,
    pub tracks: Vec<Track>,
    pub root_motion: Option<RootMotion>,
}

impl SourceClip {
    pub fn new(name: impl Into<String>, frame_count: u16, frame_rate: f32) -> Self {
        Self {
            name: name.into(),
            frame_count,
            frame_rate,
            looping: false,
            additive: false,
            tracks: Vec::new(),
            root_motion: None,
        }
    }

    /// Validate frame counts before compilation
    pub fn validate(&self) -> Result<(), ClipError> {
        if self.frame_count == 0 {
            return Err(ClipError::contract("clip has no frames"));
        }
        if self.frame_rate <= 0.0 {
            return Err(ClipError::contract("clip frame rate must be positive"));
        }
        for track in &self.tracks {
            if track.samples.len() != self.frame_count as usize {
                return Err(ClipError::contract(format!(
                    "curve {} has {} samples, clip has {} frames",
                    track.curve,
                    track.samples.len(),
                    self.frame_count
                )));
            }
        }
        if let Some(rm) = &self.root_motion {
            if rm.translation.len() != self.frame_count as usize
                || rm.rotation.len() != self.frame_count as usize
            {
                return Err(ClipError::contract("root motion sample count mismatch"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_group_hierarchy() -> HierarchyDescriptor {
        HierarchyDescriptor {
            hierarchy_id: 1,
            joint_count: 6,
            float_count: 3,
            groups: vec![
                GroupRange {
                    first_joint: 0,
                    joint_count: 4,
                    first_float: 0,
                    float_count: 2,
                },
                GroupRange {
                    first_joint: 4,
                    joint_count: 2,
                    first_float: 2,
                    float_count: 1,
                },
            ],
        }
    }

    #[test]
    fn test_valid_partition() {
        assert!(two_group_hierarchy().validate().is_ok());
    }

    #[test]
    fn test_gap_rejected() {
        let mut h = two_group_hierarchy();
        h.groups[1].first_joint = 5;
        assert!(h.validate().is_err());
    }

    #[test]
    fn test_short_cover_rejected() {
        let mut h = two_group_hierarchy();
        h.joint_count = 8;
        assert!(h.validate().is_err());
    }

    #[test]
    fn test_sample_count_validation() {
        let mut clip = SourceClip::new("walk", 10, 30.0);
        clip.tracks
            .push(Track::scalar(0, vec![0.0; 9]));
        assert!(clip.validate().is_err());
    }
}
