//! Per-channel compression codec library
//!
//! A closed set of sample compressors. `compress` produces a
//! [`CompressedArray`] for one channel's retained key samples; every array
//! reports the introspection data the scheduler and writer need (bit size,
//! range data, error bounds).
//!
//! Auto requests are resolved here to the cheapest concrete kind meeting the
//! caller's tolerance; only concrete kinds ever reach the serialized format.

mod bitpack;
mod quat;
mod vector;


pub use bitpack::{BitReader, BitWriter};

use clipforge_format::{ChannelKind, CompressionKind};

use crate::error::ClipError;
use crate::settings::{ChannelSettings, CompressionRequest};

/// Bit-packing layout of a compressed array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackFormat {
    /// Layout fully determined by the compression kind
    Fixed,
    /// Per-component bit widths, stored per instance (RangeVector)
    ComponentBits([u8; 4]),
}

/// Default per-component bit widths for RangeVector (vec3 channels leave the
/// w lane at zero bits)
pub const DEFAULT_RANGE_BITS: [u8; 4] = [11, 11, 11, 0];

/// One channel's compressed key samples plus decompression side data
#[derive(Debug, Clone)]
pub struct CompressedArray {
    channel_kind: ChannelKind,
    compression: CompressionKind,
    format: PackFormat,
    /// Sample-major payload; bit-packed kinds pad to a byte at the end
    payload: Vec<u8>,
    /// Scale/bias/orientation side table, layout per kind
    range_data: Vec<f32>,
    sample_count: u16,
    bits_per_sample: u16,
    max_error: f32,
    rms_error: f32,
}

impl CompressedArray {
    pub fn channel_kind(&self) -> ChannelKind {
        self.channel_kind
    }

    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    pub fn format(&self) -> PackFormat {
        self.format
    }

    pub fn sample_count(&self) -> u16 {
        self.sample_count
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Payload bytes for `count` samples, rounded up to whole bytes
    pub fn byte_size(&self, count: u16) -> usize {
        (count as usize * self.bits_per_sample as usize).div_ceil(8)
    }

    /// Whether the bit layout must be serialized alongside the data
    pub fn has_instance_format(&self) -> bool {
        self.compression.has_instance_format()
    }

    pub fn range_data(&self) -> &[f32] {
        &self.range_data
    }

    pub fn range_data_count(&self) -> usize {
        self.range_data.len()
    }

    /// Worst-case absolute reconstruction error over all samples
    pub fn max_error(&self) -> f32 {
        self.max_error
    }

    /// Root-mean-square reconstruction error over all samples
    pub fn rms_error(&self) -> f32 {
        self.rms_error
    }

    /// Emit the payload byte-aligned
    pub fn write_aligned(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.payload);
    }

    /// Emit the payload into a running bit stream
    pub fn write_packed(&self, out: &mut BitWriter) {
        let bits = self.bits_per_sample as usize;
        let mut r = BitReader::new(&self.payload);
        for _ in 0..self.sample_count {
            let mut remaining = bits;
            while remaining > 0 {
                let take = remaining.min(32);
                out.push(r.read(take as u8), take as u8);
                remaining -= take;
            }
        }
    }

    /// Decode sample `i` back to a vec4 (scalars in the x lane)
    ///
    /// Used for error introspection and tests; the runtime performs the
    /// equivalent work in its decompress commands.
    pub fn decode_sample(&self, i: u16) -> [f32; 4] {
        debug_assert!(i < self.sample_count);
        match self.compression {
            CompressionKind::Uncompressed
            | CompressionKind::Float16
            | CompressionKind::RangeVector
            | CompressionKind::ConstVec48 => vector::decode(self, i),
            CompressionKind::QuatSmallestThree
            | CompressionKind::QuatLog
            | CompressionKind::QuatLogOriented
            | CompressionKind::ConstQuat48 => quat::decode(self, i),
        }
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Compress one channel's key samples with a concrete kind
///
/// `format` overrides the default bit layout for kinds with a per-instance
/// format; other kinds ignore it.
pub fn compress(
    channel_kind: ChannelKind,
    samples: &[[f32; 4]],
    compression: CompressionKind,
    format: Option<PackFormat>,
) -> Result<CompressedArray, ClipError> {
    if samples.is_empty() {
        return Err(ClipError::contract("cannot compress an empty sample set"));
    }
    check_kind_compat(channel_kind, compression)?;

    let (payload, range_data, bits_per_sample, format) = match compression {
        CompressionKind::Uncompressed
        | CompressionKind::Float16
        | CompressionKind::RangeVector
        | CompressionKind::ConstVec48 => vector::encode(channel_kind, samples, compression, format),
        CompressionKind::QuatSmallestThree
        | CompressionKind::QuatLog
        | CompressionKind::QuatLogOriented
        | CompressionKind::ConstQuat48 => quat::encode(samples, compression),
    };

    let sample_count = samples.len() as u16;
    let mut array = CompressedArray {
        channel_kind,
        compression,
        format,
        payload,
        range_data,
        sample_count,
        bits_per_sample,
        max_error: 0.0,
        rms_error: 0.0,
    };
    let (max_error, rms_error) = measure_errors(&array, samples);
    array.max_error = max_error;
    array.rms_error = rms_error;
    Ok(array)
}

/// Resolve an auto request to the cheapest concrete kind under tolerance
///
/// Candidates are ordered by payload bits ascending. Uncompressed is not a
/// candidate: auto means "compress under tolerance", and falling back to
/// uncompressed is a caller policy.
pub fn resolve_auto(
    channel_kind: ChannelKind,
    samples: &[[f32; 4]],
    settings: &ChannelSettings,
    channel_name: &str,
) -> Result<CompressionKind, ClipError> {
    let requested = match settings.compression {
        CompressionRequest::Exact(kind) => return Ok(kind),
        CompressionRequest::Auto => auto_candidates(channel_kind),
    };

    for &candidate in requested {
        let array = compress(channel_kind, samples, candidate, None)?;
        if array.max_error() <= settings.tolerance {
            tracing::debug!(
                channel = channel_name,
                kind = ?candidate,
                max_error = array.max_error(),
                "auto compression resolved"
            );
            return Ok(candidate);
        }
    }
    Err(ClipError::ToleranceUnmet {
        channel: channel_name.to_string(),
        tolerance: settings.tolerance,
    })
}

fn auto_candidates(kind: ChannelKind) -> &'static [CompressionKind] {
    match kind {
        ChannelKind::Rotation => &[
            CompressionKind::QuatSmallestThree,
            CompressionKind::QuatLog,
            CompressionKind::QuatLogOriented,
            CompressionKind::Float16,
        ],
        ChannelKind::Scale | ChannelKind::Translation => {
            &[CompressionKind::RangeVector, CompressionKind::Float16]
        }
        ChannelKind::Float => &[CompressionKind::Float16],
    }
}

fn check_kind_compat(
    channel_kind: ChannelKind,
    compression: CompressionKind,
) -> Result<(), ClipError> {
    let ok = match compression {
        CompressionKind::Uncompressed | CompressionKind::Float16 => true,
        CompressionKind::RangeVector | CompressionKind::ConstVec48 => {
            channel_kind != ChannelKind::Rotation
        }
        CompressionKind::QuatSmallestThree
        | CompressionKind::QuatLog
        | CompressionKind::QuatLogOriented
        | CompressionKind::ConstQuat48 => channel_kind == ChannelKind::Rotation,
    };
    if ok {
        Ok(())
    } else {
        Err(ClipError::UnsupportedCompressionKind {
            channel: format!("{channel_kind:?}"),
            kind: compression,
        })
    }
}

/// Max and RMS reconstruction error of an array against its source samples
///
/// Quaternion kinds compare components after sign alignment; q and -q encode
/// the same rotation.
fn measure_errors(array: &CompressedArray, samples: &[[f32; 4]]) -> (f32, f32) {
    let is_quat = array.channel_kind == ChannelKind::Rotation;
    let mut max = 0.0f32;
    let mut sum_sq = 0.0f64;
    let mut n = 0usize;
    for (i, src) in samples.iter().enumerate() {
        let mut dec = array.decode_sample(i as u16);
        if is_quat {
            let dot: f32 = (0..4).map(|c| src[c] * dec[c]).sum();
            if dot < 0.0 {
                for d in dec.iter_mut() {
                    *d = -*d;
                }
            }
        }
        for c in 0..4 {
            let e = (src[c] - dec[c]).abs();
            max = max.max(e);
            sum_sq += (e as f64) * (e as f64);
            n += 1;
        }
    }
    let rms = if n > 0 {
        ((sum_sq / n as f64) as f32).sqrt()
    } else {
        0.0
    };
    (max, rms)
}
