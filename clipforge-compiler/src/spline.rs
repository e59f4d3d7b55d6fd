//! Hermite spline sub-path
//!
//! Float-only clips can skip the key cache entirely: each channel becomes a
//! sparse Hermite knot list the runtime evaluates directly. Knot frames are
//! picked with the same greedy tolerance walk as unshared keys; tangents are
//! Catmull-Rom over the retained knots.
//!
//! ```text
//! ClipHeader (scheme = Spline, group_count = 0)
//! [channel_count u16][reserved u16]
//! per channel, 4-aligned:
//!   [channel u16][knot_count u16]
//!   knot × knot_count: [frame u16][reserved u16][value f32][tan_in f32][tan_out f32]
//! optional root-motion record
//! ```

use clipforge_format::{clip_flags, ChannelKind, ClipHeader, KeySchemeKind, SECTION_ALIGN};

use crate::error::{check_u16, ClipError};
use crate::keys;
use crate::source::{BindTarget, Binding, SourceClip, TrackSamples};
use crate::writer::{write_root_motion, StreamWriter};

/// One Hermite control point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineKnot {
    pub frame: u16,
    pub value: f32,
    pub tan_in: f32,
    pub tan_out: f32,
}

/// One float channel's knot list
#[derive(Debug, Clone)]
pub struct SplineChannel {
    /// Global float parameter index
    pub channel: u16,
    pub knots: Vec<SplineKnot>,
}

/// Extract knot lists for every bound float curve
///
/// Spline clips carry only float channels; a bound vector curve is a
/// caller error.
pub fn build_spline_channels(
    source: &SourceClip,
    binding: &Binding,
    key_tolerance: f32,
) -> Result<Vec<SplineChannel>, ClipError> {
    source.validate()?;
    let mut channels = Vec::new();
    for track in &source.tracks {
        let target = binding.target(track.curve);
        if target == BindTarget::Unbound {
            continue;
        }
        let BindTarget::Float(index) = target else {
            return Err(ClipError::contract(format!(
                "spline clip curve {} drives a joint channel",
                track.curve
            )));
        };
        if track.kind != ChannelKind::Float {
            return Err(ClipError::contract(format!(
                "spline clip curve {} is not a float channel",
                track.curve
            )));
        }
        let values: Vec<f32> = match &track.samples {
            TrackSamples::Scalar(v) => v.clone(),
            TrackSamples::Vector(_) => {
                return Err(ClipError::contract(format!(
                    "spline clip curve {} carries vector samples",
                    track.curve
                )));
            }
        };
        let widened: Vec<[f32; 4]> = values.iter().map(|&v| [v, 0.0, 0.0, 0.0]).collect();
        let frames = keys::select_channel_keys(&widened, false, key_tolerance)?;
        channels.push(SplineChannel {
            channel: index,
            knots: knots_from_frames(&frames, &values),
        });
    }
    channels.sort_by_key(|c| c.channel);
    Ok(channels)
}

/// Catmull-Rom tangents over the retained knots, one-sided at the ends
fn knots_from_frames(frames: &[u16], values: &[f32]) -> Vec<SplineKnot> {
    let n = frames.len();
    let value = |i: usize| values[frames[i] as usize];
    (0..n)
        .map(|i| {
            let prev = i.saturating_sub(1);
            let next = (i + 1).min(n - 1);
            let df = frames[next] as f32 - frames[prev] as f32;
            let tangent = if df > 0.0 {
                (value(next) - value(prev)) / df
            } else {
                0.0
            };
            SplineKnot {
                frame: frames[i],
                value: value(i),
                tan_in: tangent,
                tan_out: tangent,
            }
        })
        .collect()
}

/// Serialize a spline clip
pub fn write_spline_clip(
    source: &SourceClip,
    hierarchy_id: u32,
    channels: &[SplineChannel],
) -> Result<Vec<u8>, ClipError> {
    let mut w = StreamWriter::new();
    let mut header = ClipHeader::new(hierarchy_id, 0, source.frame_count, source.frame_rate);
    header.set_scheme(KeySchemeKind::Spline);
    if source.looping {
        header.flags |= clip_flags::LOOPING;
    }
    if source.additive {
        header.flags |= clip_flags::ADDITIVE;
    }
    if source.root_motion.is_some() {
        header.flags |= clip_flags::ROOT_MOTION;
    }
    w.write_bytes(&header.to_bytes());
    let total_size = w.link_at(ClipHeader::TOTAL_SIZE_OFFSET)?;
    let root_motion = source
        .root_motion
        .is_some()
        .then(|| w.link_at(ClipHeader::ROOT_MOTION_OFFSET))
        .transpose()?;

    w.align_to(SECTION_ALIGN);
    w.write_u16(check_u16("spline channel count", channels.len() as u64)?);
    w.write_u16(0);
    for channel in channels {
        w.align_to(4);
        w.write_u16(channel.channel);
        w.write_u16(check_u16("knot count", channel.knots.len() as u64)?);
        for knot in &channel.knots {
            w.write_u16(knot.frame);
            w.write_u16(0);
            w.write_f32(knot.value);
            w.write_f32(knot.tan_in);
            w.write_f32(knot.tan_out);
        }
    }
    if let (Some(link), Some(rm)) = (root_motion, &source.root_motion) {
        w.align_to(SECTION_ALIGN);
        w.resolve_link_here(link)?;
        write_root_motion(&mut w, source.frame_count, rm);
    }
    let size = w.position()?;
    w.resolve_link(total_size, size)?;
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RootMotion, Track};

    fn float_binding(n: u16) -> Binding {
        Binding {
            targets: (0..n).map(BindTarget::Float).collect(),
        }
    }

    fn hermite(a: &SplineKnot, b: &SplineKnot, frame: f32) -> f32 {
        let span = (b.frame - a.frame) as f32;
        let t = (frame - a.frame as f32) / span;
        let (t2, t3) = (t * t, t * t * t);
        (2.0 * t3 - 3.0 * t2 + 1.0) * a.value
            + (t3 - 2.0 * t2 + t) * span * a.tan_out
            + (-2.0 * t3 + 3.0 * t2) * b.value
            + (t3 - t2) * span * b.tan_in
    }

    #[test]
    fn test_linear_channel_two_knots() {
        let mut src = SourceClip::new("fade", 16, 30.0);
        src.tracks
            .push(Track::scalar(0, (0..16).map(|i| i as f32 * 0.5).collect()));
        let channels = build_spline_channels(&src, &float_binding(1), 0.001).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].knots.len(), 2);
        let k = &channels[0].knots;
        assert_eq!(k[0].frame, 0);
        assert_eq!(k[1].frame, 15);
        // Slope is 0.5 per frame at both ends
        assert!((k[0].tan_out - 0.5).abs() < 1e-6);
        assert!((k[1].tan_in - 0.5).abs() < 1e-6);
        // The spline reproduces interior frames
        for f in 0..16 {
            let v = hermite(&k[0], &k[1], f as f32);
            assert!((v - f as f32 * 0.5).abs() < 1e-4, "frame {f}: {v}");
        }
    }

    #[test]
    fn test_vector_curve_rejected() {
        let mut src = SourceClip::new("bad", 4, 30.0);
        src.tracks.push(Track::vector(
            0,
            ChannelKind::Rotation,
            vec![[0.0, 0.0, 0.0, 1.0]; 4],
        ));
        let binding = Binding {
            targets: vec![BindTarget::Joint(0)],
        };
        assert!(build_spline_channels(&src, &binding, 0.001).is_err());
    }

    #[test]
    fn test_spline_blob_layout() {
        let mut src = SourceClip::new("fade", 8, 30.0);
        src.tracks
            .push(Track::scalar(0, (0..8).map(|i| i as f32).collect()));
        let channels = build_spline_channels(&src, &float_binding(1), 0.001).unwrap();
        let blob = write_spline_clip(&src, 42, &channels).unwrap();

        let header = ClipHeader::from_bytes(&blob).unwrap();
        assert!(header.validate());
        assert_eq!(header.scheme(), Some(KeySchemeKind::Spline));
        assert_eq!(header.group_count, 0);
        assert_eq!(header.total_size as usize, blob.len());

        let base = ClipHeader::SIZE;
        let channel_count = u16::from_le_bytes(blob[base..base + 2].try_into().unwrap());
        assert_eq!(channel_count, 1);
        let knot_count = u16::from_le_bytes(blob[base + 6..base + 8].try_into().unwrap());
        assert_eq!(knot_count, 2);
        assert_eq!(header.flags & clip_flags::ROOT_MOTION, 0);
        assert_eq!(header.root_motion_offset, 0);
    }

    #[test]
    fn test_spline_root_motion_record() {
        let mut src = SourceClip::new("fade", 8, 30.0);
        src.tracks
            .push(Track::scalar(0, (0..8).map(|i| i as f32).collect()));
        src.root_motion = Some(RootMotion {
            translation: (0..8).map(|i| [i as f32 * 0.2, 0.0, 0.0]).collect(),
            rotation: vec![[0.0, 0.0, 0.0, 1.0]; 8],
        });
        let channels = build_spline_channels(&src, &float_binding(1), 0.001).unwrap();
        let blob = write_spline_clip(&src, 42, &channels).unwrap();

        let header = ClipHeader::from_bytes(&blob).unwrap();
        assert_ne!(header.flags & clip_flags::ROOT_MOTION, 0);
        let base = header.root_motion_offset as usize;
        assert!(base > 0 && base % SECTION_ALIGN == 0);
        assert_eq!(
            u16::from_le_bytes(blob[base..base + 2].try_into().unwrap()),
            8
        );
        // Frame 1 translation x, 28 bytes per frame after the 4-byte prefix
        let tx1 = f32::from_le_bytes(blob[base + 32..base + 36].try_into().unwrap());
        assert!((tx1 - 0.2).abs() < 1e-6);
        assert_eq!(header.total_size as usize, blob.len());
    }
}
