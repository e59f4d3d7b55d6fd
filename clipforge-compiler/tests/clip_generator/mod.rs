//! Programmatic source clips for integration tests.
//!
//! Builds a small humanoid-ish rig: a chain of joints with rotation swings
//! and translation bobs, a constant scale, and one float parameter curve,
//! split across two processing groups.

use clipforge_compiler::{BindTarget, Binding, GroupRange, HierarchyDescriptor, SourceClip, Track};
use clipforge_format::ChannelKind;

pub const JOINT_COUNT: u16 = 6;
pub const FLOAT_COUNT: u16 = 1;
pub const FRAME_COUNT: u16 = 30;

fn normalize(q: [f32; 4]) -> [f32; 4] {
    let len = q.iter().map(|c| c * c).sum::<f32>().sqrt();
    [q[0] / len, q[1] / len, q[2] / len, q[3] / len]
}

pub fn swing(frames: u16, phase: f32) -> Vec<[f32; 4]> {
    (0..frames)
        .map(|i| {
            let angle = (i as f32 * 0.12 + phase).sin() * 0.6;
            let (s, c) = (angle * 0.5).sin_cos();
            normalize([s * 0.6, s * 0.8, 0.0, c])
        })
        .collect()
}

pub fn bob(frames: u16, height: f32) -> Vec<[f32; 4]> {
    (0..frames)
        .map(|i| [0.0, height + (i as f32 * 0.4).sin() * 0.05, 0.1, 0.0])
        .collect()
}

/// Rig layout: joints 0..4 in the first group, joints 4..6 plus the float
/// parameter in the second
pub fn hierarchy() -> HierarchyDescriptor {
    HierarchyDescriptor {
        hierarchy_id: 0x1234_5678,
        joint_count: JOINT_COUNT,
        float_count: FLOAT_COUNT,
        groups: vec![
            GroupRange {
                first_joint: 0,
                joint_count: 4,
                first_float: 0,
                float_count: 0,
            },
            GroupRange {
                first_joint: 4,
                joint_count: 2,
                first_float: 0,
                float_count: 1,
            },
        ],
    }
}

/// Curves 0..6 rotate joints 0..6, curves 6..12 translate them, curve 12 is
/// a constant scale on joint 0, curve 13 drives the float parameter
pub fn binding() -> Binding {
    let mut targets: Vec<BindTarget> = (0..JOINT_COUNT).map(BindTarget::Joint).collect();
    targets.extend((0..JOINT_COUNT).map(BindTarget::Joint));
    targets.push(BindTarget::Joint(0));
    targets.push(BindTarget::Float(0));
    Binding { targets }
}

pub fn walk_clip() -> SourceClip {
    let mut clip = SourceClip::new("walk_cycle", FRAME_COUNT, 30.0);
    for j in 0..JOINT_COUNT {
        clip.tracks.push(Track::vector(
            j,
            ChannelKind::Rotation,
            swing(FRAME_COUNT, j as f32 * 0.7),
        ));
    }
    for j in 0..JOINT_COUNT {
        clip.tracks.push(Track::vector(
            JOINT_COUNT + j,
            ChannelKind::Translation,
            bob(FRAME_COUNT, j as f32 * 0.5),
        ));
    }
    clip.tracks.push(
        Track::vector(
            2 * JOINT_COUNT,
            ChannelKind::Scale,
            vec![[1.0, 1.0, 1.0, 0.0]; FRAME_COUNT as usize],
        )
        .constant(),
    );
    clip.tracks.push(Track::scalar(
        2 * JOINT_COUNT + 1,
        (0..FRAME_COUNT).map(|i| (i as f32 * 0.2).sin() * 0.5).collect(),
    ));
    clip
}
