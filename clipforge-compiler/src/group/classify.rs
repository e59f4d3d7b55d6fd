//! Channel classification
//!
//! Buckets a clip's compiled channels into one processing group: animated
//! channels into [`CompressedChannelGroup`]s keyed by (channel kind,
//! compression kind), constants into [`ConstChannelGroup`]s, plus the
//! valid-channel bitmasks the runtime uses to map cache items to pose
//! offsets.

use clipforge_format::{ChannelKind, CompressionKind, KeySchemeKind};

use crate::channel::{
    Channel, CompressedChannel, CompressedChannelGroup, CompressedClip, ConstChannelGroup,
};
use crate::error::ClipError;
use crate::source::{BindTarget, GroupRange};

/// Valid-channel bitmasks of one processing group, one bit per local joint
/// or float index, u32 words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMasks {
    pub scale: Vec<u32>,
    pub rotation: Vec<u32>,
    pub translation: Vec<u32>,
    pub float: Vec<u32>,
}

impl GroupMasks {
    fn new(joint_count: u16, float_count: u16) -> Self {
        let joint_words = words(joint_count);
        Self {
            scale: vec![0; joint_words],
            rotation: vec![0; joint_words],
            translation: vec![0; joint_words],
            float: vec![0; words(float_count)],
        }
    }

    fn set(&mut self, kind: ChannelKind, local_index: u16) {
        let mask = match kind {
            ChannelKind::Scale => &mut self.scale,
            ChannelKind::Rotation => &mut self.rotation,
            ChannelKind::Translation => &mut self.translation,
            ChannelKind::Float => &mut self.float,
        };
        mask[local_index as usize / 32] |= 1 << (local_index % 32);
    }

    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.scale
            .iter()
            .chain(&self.rotation)
            .chain(&self.translation)
            .chain(&self.float)
            .copied()
    }

    pub fn word_count(&self) -> usize {
        self.scale.len() + self.rotation.len() + self.translation.len() + self.float.len()
    }
}

fn words(count: u16) -> usize {
    (count as usize).div_ceil(32)
}

/// One processing group's channels, bucketed and ordered for scheduling
#[derive(Debug, Clone)]
pub struct Classified {
    pub compressed: Vec<CompressedChannelGroup>,
    pub consts: Vec<ConstChannelGroup>,
    pub masks: GroupMasks,
}

/// Local joint/float index of a target within the group, if it belongs
fn local_index(range: &GroupRange, kind: ChannelKind, target: BindTarget) -> Option<u16> {
    match (kind, target) {
        (ChannelKind::Float, BindTarget::Float(f)) => {
            (f >= range.first_float && f < range.first_float + range.float_count)
                .then(|| f - range.first_float)
        }
        (ChannelKind::Float, _) | (_, BindTarget::Float(_)) => None,
        (_, BindTarget::Joint(j)) => {
            (j >= range.first_joint && j < range.first_joint + range.joint_count)
                .then(|| j - range.first_joint)
        }
        (_, BindTarget::Unbound) => None,
    }
}

/// Partition one group's channels by kind and compression
///
/// Buckets iterate in (channel kind, compression kind) ascending order and
/// channels within a bucket by local index, so classification is
/// deterministic regardless of source track order.
pub fn classify(
    group: usize,
    range: &GroupRange,
    clip: &CompressedClip,
) -> Result<Classified, ClipError> {
    let uniform_keys = clip.scheme != KeySchemeKind::UnsharedNonUniform;
    let mut masks = GroupMasks::new(range.joint_count, range.float_count);
    let mut compressed = Vec::new();
    let mut consts: Vec<ConstChannelGroup> = Vec::new();

    for kind in ChannelKind::ALL {
        // Animated channels of this kind, bucketed by compression
        let mut members: Vec<(CompressionKind, CompressedChannel)> = Vec::new();
        for track in &clip.tracks {
            if track.kind != kind {
                continue;
            }
            let Some(local) = local_index(range, kind, track.target) else {
                continue;
            };
            masks.set(kind, local);
            members.push((
                track.array.compression(),
                CompressedChannel {
                    channel: Channel::new(kind, local, range.joint_count),
                    array: track.array.clone(),
                    key_frames: track.key_frames.clone(),
                },
            ));
        }
        members.sort_by_key(|(comp, ch)| (*comp, ch.channel.local_index));
        let mut start = 0;
        while start < members.len() {
            let comp = members[start].0;
            let end = start + members[start..].iter().take_while(|(c, _)| *c == comp).count();
            let bucket: Vec<CompressedChannel> =
                members[start..end].iter().map(|(_, ch)| ch.clone()).collect();
            compressed.push(CompressedChannelGroup::new(group, bucket, uniform_keys)?);
            start = end;
        }

        // Constant channels of this kind
        for entry in &clip.consts {
            if entry.kind != kind {
                continue;
            }
            let Some(local) = local_index(range, kind, entry.target) else {
                continue;
            };
            masks.set(kind, local);
            let channel = Channel::new(kind, local, range.joint_count);
            match consts
                .iter_mut()
                .find(|g| g.compression == entry.compression && g.channel_kind == kind)
            {
                Some(g) => g.add(channel, entry.pool_index),
                None => {
                    let mut g = ConstChannelGroup::new(entry.compression, kind);
                    g.add(channel, entry.pool_index);
                    consts.push(g);
                }
            }
        }
    }

    Ok(Classified {
        compressed,
        consts,
        masks,
    })
}
