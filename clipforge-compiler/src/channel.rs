//! Compressed channel containers
//!
//! The per-track compression pass runs before any group scheduling: every
//! bound curve either lands in the clip-wide constant pool or becomes a
//! [`TrackArray`] of compressed key samples. The group compiler later buckets
//! these by processing group and compression kind.

use clipforge_format::{pose_offset, ChannelKind, CompressionKind, KeySchemeKind};
use hashbrown::HashMap;

use crate::codec::{self, CompressedArray, PackFormat};
use crate::error::{check_u16, ClipError};
use crate::keys;
use crate::settings::CompressionSettings;
use crate::source::{BindTarget, Binding, RootMotion, SourceClip, Track};

/// One channel slot within a processing group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub kind: ChannelKind,
    /// Joint or float index relative to the group's first joint/float
    pub local_index: u16,
    /// Byte offset in the runtime pose buffer
    pub pose_offset: u32,
}

impl Channel {
    pub fn new(kind: ChannelKind, local_index: u16, joint_count: u16) -> Self {
        Self {
            kind,
            local_index,
            pose_offset: pose_offset(kind, local_index, joint_count),
        }
    }
}

/// One channel's compressed key samples, placed within its group
#[derive(Debug, Clone)]
pub struct CompressedChannel {
    pub channel: Channel,
    pub array: CompressedArray,
    pub key_frames: Vec<u16>,
}

/// Channels of one processing group sharing a channel kind and an exact
/// compression kind, ordered by local index
#[derive(Debug, Clone)]
pub struct CompressedChannelGroup {
    channels: Vec<CompressedChannel>,
}

impl CompressedChannelGroup {
    /// Group index only feeds diagnostics
    pub fn new(
        group: usize,
        channels: Vec<CompressedChannel>,
        uniform_keys: bool,
    ) -> Result<Self, ClipError> {
        let first = channels
            .first()
            .ok_or_else(|| ClipError::contract("empty compressed channel group"))?;
        let kind = first.channel.kind;
        let compression = first.array.compression();
        let format = first.array.format();
        let key_count = first.key_frames.len();
        for ch in &channels {
            if ch.channel.kind != kind || ch.array.compression() != compression {
                return Err(ClipError::contract(format!(
                    "group {group}: mixed kinds in one compressed channel group"
                )));
            }
            if ch.array.format() != format {
                return Err(ClipError::contract(format!(
                    "group {group}: mixed pack formats in one compressed channel group"
                )));
            }
            if uniform_keys && ch.key_frames.len() != key_count {
                return Err(ClipError::MismatchedSampleCounts {
                    group,
                    channel: format!("{kind:?}[{}]", ch.channel.local_index),
                    expected: key_count,
                    got: ch.key_frames.len(),
                });
            }
        }
        Ok(Self { channels })
    }

    pub fn channels(&self) -> &[CompressedChannel] {
        &self.channels
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn kind(&self) -> ChannelKind {
        self.channels[0].channel.kind
    }

    pub fn compression(&self) -> CompressionKind {
        self.channels[0].array.compression()
    }

    pub fn format(&self) -> PackFormat {
        self.channels[0].array.format()
    }

    /// Whether the group's shared bit layout must be serialized alongside
    /// the key data
    pub fn has_instance_format(&self) -> bool {
        self.channels[0].array.has_instance_format()
    }

    /// Cache slots allocated per item; the largest per-channel key count
    /// (identical across channels under uniform and shared schemes)
    pub fn slot_keys(&self) -> u16 {
        self.channels
            .iter()
            .map(|c| c.key_frames.len() as u16)
            .max()
            .unwrap_or(0)
    }

    /// Total compressed payload bits across all channels
    pub fn total_bits(&self) -> usize {
        self.channels
            .iter()
            .map(|c| c.array.bits_per_sample() as usize * c.key_frames.len())
            .sum()
    }
}

/// Constant channels of one processing group sharing a compression kind
///
/// Many channels may reference one pooled value; `used` lists the clip-pool
/// indices this group touches, in first-use order, and each channel carries
/// an index into `used`.
#[derive(Debug, Clone)]
pub struct ConstChannelGroup {
    pub compression: CompressionKind,
    pub channel_kind: ChannelKind,
    /// (channel, index into `used`)
    pub channels: Vec<(Channel, u16)>,
    /// Clip const-pool indices referenced by this group
    pub used: Vec<u16>,
}

impl ConstChannelGroup {
    pub fn new(compression: CompressionKind, channel_kind: ChannelKind) -> Self {
        Self {
            compression,
            channel_kind,
            channels: Vec::new(),
            used: Vec::new(),
        }
    }

    pub fn add(&mut self, channel: Channel, pool_index: u16) {
        let local = match self.used.iter().position(|&u| u == pool_index) {
            Some(i) => i as u16,
            None => {
                self.used.push(pool_index);
                (self.used.len() - 1) as u16
            }
        };
        self.channels.push((channel, local));
    }
}

/// Clip-wide pools of deduplicated 48-bit constant values
#[derive(Debug, Clone, Default)]
pub struct ConstPool {
    values: Vec<[u8; 6]>,
    index: HashMap<[u8; 6], u16>,
}

impl ConstPool {
    pub fn intern(&mut self, value: [u8; 6]) -> Result<u16, ClipError> {
        if let Some(&i) = self.index.get(&value) {
            return Ok(i);
        }
        let i = check_u16("const pool index", self.values.len() as u64)?;
        self.values.push(value);
        self.index.insert(value, i);
        Ok(i)
    }

    pub fn value(&self, index: u16) -> [u8; 6] {
        self.values[index as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One constant channel resolved to a pooled value
#[derive(Debug, Clone, Copy)]
pub struct ConstEntry {
    pub kind: ChannelKind,
    pub target: BindTarget,
    pub compression: CompressionKind,
    pub pool_index: u16,
}

/// One animated curve after key extraction and compression
#[derive(Debug, Clone)]
pub struct TrackArray {
    pub curve: u16,
    pub kind: ChannelKind,
    pub target: BindTarget,
    pub array: CompressedArray,
    pub key_frames: Vec<u16>,
}

/// Whole-clip result of the per-track compression pass
#[derive(Debug, Clone)]
pub struct CompressedClip {
    pub name: String,
    pub scheme: KeySchemeKind,
    pub frame_count: u16,
    pub frame_rate: f32,
    pub looping: bool,
    pub additive: bool,
    /// Clip-wide key set under uniform and shared schemes; empty otherwise
    pub shared_keys: Vec<u16>,
    pub tracks: Vec<TrackArray>,
    pub consts: Vec<ConstEntry>,
    pub vec_pool: ConstPool,
    pub quat_pool: ConstPool,
    pub root_motion: Option<RootMotion>,
}

impl CompressedClip {
    /// Run key extraction and per-channel compression over every bound curve
    pub fn build(
        source: &SourceClip,
        binding: &Binding,
        settings: &CompressionSettings,
    ) -> Result<Self, ClipError> {
        source.validate()?;
        let shared_keys = match settings.scheme {
            KeySchemeKind::Uniform | KeySchemeKind::Uniform2 => {
                keys::uniform_keys(source.frame_count, source.looping)
            }
            KeySchemeKind::SharedNonUniform => {
                let keys = settings.shared_keys.clone().ok_or_else(|| {
                    ClipError::contract("shared non-uniform scheme without a key set")
                })?;
                keys::validate_shared_keys(&keys, source.frame_count)?;
                keys
            }
            KeySchemeKind::UnsharedNonUniform => Vec::new(),
            KeySchemeKind::Spline => {
                return Err(ClipError::contract(
                    "spline clips are compiled by the spline path",
                ));
            }
        };

        let mut clip = Self {
            name: source.name.clone(),
            scheme: settings.scheme,
            frame_count: source.frame_count,
            frame_rate: source.frame_rate,
            looping: source.looping,
            additive: source.additive,
            shared_keys,
            tracks: Vec::new(),
            consts: Vec::new(),
            vec_pool: ConstPool::default(),
            quat_pool: ConstPool::default(),
            root_motion: source.root_motion.clone(),
        };

        for track in &source.tracks {
            let target = binding.target(track.curve);
            if target == BindTarget::Unbound {
                tracing::debug!(clip = %clip.name, curve = track.curve, "skipping unbound curve");
                continue;
            }
            if track.constant || is_constant(track) {
                clip.add_constant(track, target)?;
            } else {
                clip.add_animated(track, target, settings)?;
            }
        }
        Ok(clip)
    }

    fn add_constant(&mut self, track: &Track, target: BindTarget) -> Result<(), ClipError> {
        let compression = if track.kind == ChannelKind::Rotation {
            CompressionKind::ConstQuat48
        } else {
            CompressionKind::ConstVec48
        };
        let array = codec::compress(track.kind, &[track.samples.at(0)], compression, None)?;
        let mut value = [0u8; 6];
        value.copy_from_slice(&array.payload()[..6]);
        let pool = if compression == CompressionKind::ConstQuat48 {
            &mut self.quat_pool
        } else {
            &mut self.vec_pool
        };
        let pool_index = pool.intern(value)?;
        self.consts.push(ConstEntry {
            kind: track.kind,
            target,
            compression,
            pool_index,
        });
        Ok(())
    }

    fn add_animated(
        &mut self,
        track: &Track,
        target: BindTarget,
        settings: &CompressionSettings,
    ) -> Result<(), ClipError> {
        let key_frames = match self.scheme {
            KeySchemeKind::UnsharedNonUniform => {
                let all: Vec<[f32; 4]> = (0..self.frame_count as usize)
                    .map(|f| track.samples.at(f))
                    .collect();
                keys::select_channel_keys(
                    &all,
                    track.kind == ChannelKind::Rotation,
                    settings.key_tolerance,
                )?
            }
            _ => self.shared_keys.clone(),
        };
        let samples: Vec<[f32; 4]> = key_frames
            .iter()
            .map(|&f| track.samples.at(f as usize))
            .collect();

        let label = channel_label(target, track.kind);
        let channel = settings.for_kind(track.kind);
        let kind = codec::resolve_auto(track.kind, &samples, channel, &label)?;
        let array = codec::compress(track.kind, &samples, kind, None)?;
        tracing::debug!(
            clip = %self.name,
            channel = %label,
            kind = ?kind,
            keys = key_frames.len(),
            max_error = array.max_error(),
            "channel compressed"
        );
        self.tracks.push(TrackArray {
            curve: track.curve,
            kind: track.kind,
            target,
            array,
            key_frames,
        });
        Ok(())
    }
}

fn is_constant(track: &Track) -> bool {
    let first = track.samples.at(0);
    (1..track.samples.len()).all(|f| {
        let s = track.samples.at(f);
        (0..4).all(|c| s[c].to_bits() == first[c].to_bits())
    })
}

fn channel_label(target: BindTarget, kind: ChannelKind) -> String {
    match target {
        BindTarget::Joint(j) => format!("joint{j}.{}", kind_label(kind)),
        BindTarget::Float(f) => format!("float{f}"),
        BindTarget::Unbound => "unbound".to_string(),
    }
}

fn kind_label(kind: ChannelKind) -> &'static str {
    match kind {
        ChannelKind::Scale => "scale",
        ChannelKind::Rotation => "rotation",
        ChannelKind::Translation => "translation",
        ChannelKind::Float => "float",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TrackSamples;

    fn binding(n: u16) -> Binding {
        Binding {
            targets: (0..n).map(BindTarget::Joint).collect(),
        }
    }

    fn swing(n: usize) -> Vec<[f32; 4]> {
        (0..n)
            .map(|i| {
                let a = i as f32 * 0.1;
                let (s, c) = (a * 0.5).sin_cos();
                [s, 0.0, 0.0, c]
            })
            .collect()
    }

    #[test]
    fn test_build_uniform() {
        let mut src = SourceClip::new("walk", 8, 30.0);
        src.tracks
            .push(Track::vector(0, ChannelKind::Rotation, swing(8)));
        let clip =
            CompressedClip::build(&src, &binding(1), &CompressionSettings::uniform()).unwrap();
        assert_eq!(clip.tracks.len(), 1);
        assert_eq!(clip.tracks[0].key_frames.len(), 8);
        assert_eq!(clip.shared_keys.len(), 8);
    }

    #[test]
    fn test_looping_appends_wrap_key() {
        let mut src = SourceClip::new("walk", 8, 30.0);
        src.looping = true;
        src.tracks
            .push(Track::vector(0, ChannelKind::Rotation, swing(8)));
        let clip =
            CompressedClip::build(&src, &binding(1), &CompressionSettings::uniform()).unwrap();
        assert_eq!(clip.tracks[0].key_frames.len(), 9);
        assert_eq!(clip.tracks[0].key_frames.last(), Some(&0));
    }

    #[test]
    fn test_constant_detection_and_dedup() {
        let mut src = SourceClip::new("idle", 4, 30.0);
        src.tracks.push(Track {
            curve: 0,
            kind: ChannelKind::Translation,
            constant: false,
            samples: TrackSamples::Vector(vec![[1.0, 2.0, 3.0, 0.0]; 4]),
        });
        src.tracks.push(Track {
            curve: 1,
            kind: ChannelKind::Translation,
            constant: false,
            samples: TrackSamples::Vector(vec![[1.0, 2.0, 3.0, 0.0]; 4]),
        });
        let clip =
            CompressedClip::build(&src, &binding(2), &CompressionSettings::uniform()).unwrap();
        assert!(clip.tracks.is_empty());
        assert_eq!(clip.consts.len(), 2);
        // Both channels share one pooled value
        assert_eq!(clip.vec_pool.len(), 1);
        assert_eq!(clip.consts[0].pool_index, clip.consts[1].pool_index);
    }

    #[test]
    fn test_unbound_curve_skipped() {
        let mut src = SourceClip::new("walk", 4, 30.0);
        src.tracks
            .push(Track::vector(7, ChannelKind::Rotation, swing(4)));
        let clip =
            CompressedClip::build(&src, &binding(1), &CompressionSettings::uniform()).unwrap();
        assert!(clip.tracks.is_empty());
        assert!(clip.consts.is_empty());
    }

    #[test]
    fn test_shared_scheme_requires_keys() {
        let mut src = SourceClip::new("walk", 8, 30.0);
        src.tracks
            .push(Track::vector(0, ChannelKind::Rotation, swing(8)));
        let mut settings = CompressionSettings::shared(vec![0, 3, 5, 7]);
        let clip = CompressedClip::build(&src, &binding(1), &settings).unwrap();
        assert_eq!(clip.tracks[0].key_frames, vec![0, 3, 5, 7]);

        settings.shared_keys = None;
        assert!(CompressedClip::build(&src, &binding(1), &settings).is_err());
    }

    #[test]
    fn test_mismatched_key_counts_rejected() {
        let ch = |keys: usize| CompressedChannel {
            channel: Channel::new(ChannelKind::Rotation, 0, 2),
            array: codec::compress(
                ChannelKind::Rotation,
                &swing(keys),
                CompressionKind::QuatSmallestThree,
                None,
            )
            .unwrap(),
            key_frames: (0..keys as u16).collect(),
        };
        let err = CompressedChannelGroup::new(0, vec![ch(4), ch(5)], true).unwrap_err();
        assert!(matches!(err, ClipError::MismatchedSampleCounts { .. }));
        assert!(CompressedChannelGroup::new(0, vec![ch(4), ch(5)], false).is_ok());
    }

    #[test]
    fn test_const_group_local_value_indices() {
        let mut g = ConstChannelGroup::new(CompressionKind::ConstVec48, ChannelKind::Translation);
        g.add(Channel::new(ChannelKind::Translation, 0, 3), 7);
        g.add(Channel::new(ChannelKind::Translation, 1, 3), 9);
        g.add(Channel::new(ChannelKind::Translation, 2, 3), 7);
        // Two distinct pooled values; the third channel reuses the first
        assert_eq!(g.used, vec![7, 9]);
        assert_eq!(g.channels[0].1, 0);
        assert_eq!(g.channels[1].1, 1);
        assert_eq!(g.channels[2].1, 0);
    }
}
