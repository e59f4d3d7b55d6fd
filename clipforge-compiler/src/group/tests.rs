//! Tests for the channel group compiler

use clipforge_format::{
    AnimCmd, ChannelKind, CmdRole, CompressionKind, KeySchemeKind, KEY_CACHE_SIZE, TWEEN_ALIGN,
};

use super::*;
use crate::channel::CompressedClip;
use crate::settings::{ChannelSettings, CompressionSettings};
use crate::source::{BindTarget, Binding, GroupRange, SourceClip, Track};

fn swing(n: usize, phase: f32) -> Vec<[f32; 4]> {
    (0..n)
        .map(|i| {
            let a = i as f32 * 0.1 + phase;
            let (s, c) = (a * 0.5).sin_cos();
            [s, 0.0, 0.0, c]
        })
        .collect()
}

fn joint_binding(n: u16) -> Binding {
    Binding {
        targets: (0..n).map(BindTarget::Joint).collect(),
    }
}

fn joints_range(joint_count: u16) -> GroupRange {
    GroupRange {
        first_joint: 0,
        joint_count,
        first_float: 0,
        float_count: 0,
    }
}

// ========================================================================
// Shared-key scenario: two rotations under QuatLog
// ========================================================================

#[test]
fn test_shared_quat_log_scenario() {
    let mut src = SourceClip::new("scenario", 8, 30.0);
    src.tracks
        .push(Track::vector(0, ChannelKind::Rotation, swing(8, 0.0)));
    src.tracks
        .push(Track::vector(1, ChannelKind::Rotation, swing(8, 0.4)));
    let mut settings = CompressionSettings::shared(vec![0, 3, 5, 7]);
    settings.rotation = ChannelSettings::exact(CompressionKind::QuatLog);

    let clip = CompressedClip::build(&src, &joint_binding(2), &settings).unwrap();
    let group = compile(0, &joints_range(2), &clip).unwrap();

    assert_eq!(group.compressed.len(), 1);
    assert_eq!(group.batches.len(), 1);
    // 4 keys x 32-byte slots x 2 items
    assert_eq!(group.cache_bytes(), 256);

    let ops = &group.batches[0].ops;
    assert_eq!(ops.len(), 4);

    assert_eq!(ops[0].cmd, AnimCmd::CopyKeys32);
    assert_eq!(ops[0].item_count, 4);
    assert_eq!(ops[0].cache_offset, 0);
    assert_eq!(ops[0].cache_bytes, 256);

    assert_eq!(ops[1].cmd, AnimCmd::DecompressQuatLogRange);
    assert_eq!(ops[1].item_count, 4);
    assert_eq!(ops[2].cmd, AnimCmd::ReconstructQuatLog);

    assert_eq!(ops[3].cmd, AnimCmd::OutputSlerp);
    assert_eq!(ops[3].item_count, 2);
    assert_eq!(ops[3].sources.len(), 1);
    assert_eq!(ops[3].sources[0].channel_count, 2);
}

// ========================================================================
// Cache budget and ordering
// ========================================================================

#[test]
fn test_large_group_splits_into_batches() {
    // 64 keys x 32 bytes = 2 KiB per rotation channel; 100 channels cannot
    // share one cache residency
    let mut src = SourceClip::new("crowd", 64, 30.0);
    for j in 0..100 {
        src.tracks.push(Track::vector(
            j,
            ChannelKind::Rotation,
            swing(64, j as f32 * 0.3),
        ));
    }
    let mut settings = CompressionSettings::uniform();
    settings.rotation = ChannelSettings::exact(CompressionKind::QuatLog);

    let clip = CompressedClip::build(&src, &joint_binding(100), &settings).unwrap();
    let group = compile(0, &joints_range(100), &clip).unwrap();

    assert!(group.batches.len() > 1);
    let mut covered = 0u16;
    for batch in &group.batches {
        assert!(batch.cache_bytes <= KEY_CACHE_SIZE);
        // Ordering invariant: key copies, then decompress, then outputs
        assert!(batch.ops.windows(2).all(|w| w[0].role() <= w[1].role()));
        covered += batch
            .ops
            .iter()
            .filter(|op| op.role() == CmdRole::Output)
            .flat_map(|op| op.sources.iter())
            .map(|s| s.channel_count)
            .sum::<u16>();
    }
    assert_eq!(covered, 100);
}

#[test]
fn test_uniform2_schedules_no_batches() {
    // Uniform2 ships key data without an embedded command block
    let mut src = SourceClip::new("pose", 8, 30.0);
    src.tracks
        .push(Track::vector(0, ChannelKind::Rotation, swing(8, 0.0)));
    let mut settings = CompressionSettings::uniform();
    settings.scheme = KeySchemeKind::Uniform2;

    let clip = CompressedClip::build(&src, &joint_binding(1), &settings).unwrap();
    let group = compile(0, &joints_range(1), &clip).unwrap();

    assert_eq!(group.compressed.len(), 1);
    assert!(group.batches.is_empty());
    assert_eq!(group.cache_bytes(), 0);
    assert_eq!(group.command_count(), 0);
}

#[test]
fn test_channel_too_large_for_cache_rejected() {
    // A single channel whose keys alone exceed the cache is fatal
    let mut src = SourceClip::new("huge", 600, 30.0);
    src.tracks
        .push(Track::vector(0, ChannelKind::Rotation, swing(600, 0.0)));
    let mut settings = CompressionSettings::uniform();
    settings.rotation = ChannelSettings::exact(CompressionKind::QuatLog);

    let clip = CompressedClip::build(&src, &joint_binding(1), &settings).unwrap();
    let err = compile(0, &joints_range(1), &clip).unwrap_err();
    assert!(matches!(
        err,
        crate::error::ClipError::CapacityOverflow { .. }
    ));
}

// ========================================================================
// Classification
// ========================================================================

#[test]
fn test_buckets_follow_kind_then_compression_order() {
    let mut src = SourceClip::new("mixed", 8, 30.0);
    src.tracks
        .push(Track::vector(0, ChannelKind::Rotation, swing(8, 0.0)));
    src.tracks.push(Track::vector(
        1,
        ChannelKind::Translation,
        (0..8).map(|i| [i as f32, 0.5, 0.0, 0.0]).collect(),
    ));
    src.tracks.push(Track::vector(
        2,
        ChannelKind::Scale,
        (0..8).map(|i| [1.0 + i as f32 * 0.1, 1.0, 1.0, 0.0]).collect(),
    ));
    let binding = Binding {
        targets: vec![
            BindTarget::Joint(0),
            BindTarget::Joint(1),
            BindTarget::Joint(2),
        ],
    };
    let settings = CompressionSettings::uniform();
    let clip = CompressedClip::build(&src, &binding, &settings).unwrap();
    let group = compile(0, &joints_range(3), &clip).unwrap();

    let kinds: Vec<ChannelKind> = group.compressed.iter().map(|g| g.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ChannelKind::Scale,
            ChannelKind::Rotation,
            ChannelKind::Translation
        ]
    );

    // Scale on joint 2, rotation on joint 0, translation on joint 1
    assert_eq!(group.masks.scale, vec![0b100]);
    assert_eq!(group.masks.rotation, vec![0b001]);
    assert_eq!(group.masks.translation, vec![0b010]);
}

#[test]
fn test_const_group_uses_subset_of_pool() {
    // Five distinct constant translations across five joints; the first
    // processing group sees only three of the pooled values
    let mut src = SourceClip::new("statue", 4, 30.0);
    for j in 0..5u16 {
        src.tracks.push(Track::vector(
            j,
            ChannelKind::Translation,
            vec![[j as f32, 0.0, 0.0, 0.0]; 4],
        ));
    }
    let settings = CompressionSettings::uniform();
    let clip = CompressedClip::build(&src, &joint_binding(5), &settings).unwrap();
    assert_eq!(clip.vec_pool.len(), 5);

    let range = GroupRange {
        first_joint: 0,
        joint_count: 3,
        first_float: 0,
        float_count: 0,
    };
    let group = compile(0, &range, &clip).unwrap();
    assert!(group.batches.is_empty());
    assert_eq!(group.consts.len(), 1);
    let consts = &group.consts[0];
    assert_eq!(consts.compression, CompressionKind::ConstVec48);
    assert_eq!(consts.channels.len(), 3);
    assert_eq!(consts.used.len(), 3);
    assert_eq!(consts.used, vec![0, 1, 2]);
}

// ========================================================================
// Unshared scheme layout
// ========================================================================

#[test]
fn test_unshared_output_kind_change_realigns_cache() {
    let mut src = SourceClip::new("blend", 8, 30.0);
    src.tracks
        .push(Track::vector(0, ChannelKind::Rotation, swing(8, 0.0)));
    src.tracks
        .push(Track::scalar(1, (0..8).map(|i| i as f32 * 0.1).collect()));
    let binding = Binding {
        targets: vec![BindTarget::Joint(0), BindTarget::Float(0)],
    };
    let settings = CompressionSettings::unshared(0.05);
    let clip = CompressedClip::build(&src, &binding, &settings).unwrap();
    let range = GroupRange {
        first_joint: 0,
        joint_count: 1,
        first_float: 0,
        float_count: 1,
    };
    let group = compile(0, &range, &clip).unwrap();

    assert_eq!(group.batches.len(), 1);
    let outputs: Vec<&AnimOp> = group.batches[0]
        .ops
        .iter()
        .filter(|op| op.role() == CmdRole::Output)
        .collect();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].cmd, AnimCmd::OutputBlockSlerp);
    assert_eq!(outputs[1].cmd, AnimCmd::OutputBlockScalarLerp);
    // The scalar run starts on a tween-table boundary
    assert_eq!(outputs[1].cache_offset as u32 % TWEEN_ALIGN, 0);
    assert!(outputs[1].cache_offset > 0);
}

#[test]
fn test_contiguous_buckets_share_one_copy_command() {
    // Rotation and translation decompress differently but copy keys the
    // same way; the contiguous cache regions merge into one copy with two
    // operands
    let mut src = SourceClip::new("pair", 8, 30.0);
    src.tracks
        .push(Track::vector(0, ChannelKind::Rotation, swing(8, 0.0)));
    src.tracks.push(Track::vector(
        1,
        ChannelKind::Translation,
        (0..8).map(|i| [i as f32, 0.0, 0.0, 0.0]).collect(),
    ));
    let mut settings = CompressionSettings::uniform();
    settings.rotation = ChannelSettings::exact(CompressionKind::QuatSmallestThree);
    settings.translation = ChannelSettings::exact(CompressionKind::RangeVector);

    let clip = CompressedClip::build(&src, &joint_binding(2), &settings).unwrap();
    let group = compile(0, &joints_range(2), &clip).unwrap();
    let ops = &group.batches[0].ops;
    let copies = ops.iter().filter(|op| op.role() == CmdRole::KeyCopy).count();
    assert_eq!(copies, 1);
    assert_eq!(ops[0].sources.len(), 2);

    // Decompress passes stay separate per compression kind
    let decompress: Vec<AnimCmd> = ops
        .iter()
        .filter(|op| op.role() == CmdRole::Decompress)
        .map(|op| op.cmd)
        .collect();
    assert_eq!(
        decompress,
        vec![
            AnimCmd::DecompressQuatSmallestThree,
            AnimCmd::UnpackRangeBits,
            AnimCmd::ExpandRange
        ]
    );
}
