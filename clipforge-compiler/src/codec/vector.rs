//! Vector and scalar codecs
//!
//! Uncompressed, Float16, RangeVector (per-component range quantization) and
//! the constant-only 48-bit vector kind. Scalars travel in the x lane of a
//! vec4 throughout.

use clipforge_format::{ChannelKind, CompressionKind};
use half::f16;

use super::bitpack::{BitReader, BitWriter};
use super::{CompressedArray, PackFormat, DEFAULT_RANGE_BITS};

/// RangeVector range data layout: [bias, scale] per component
const RANGE_FLOATS: usize = 8;

pub(super) fn encode(
    channel_kind: ChannelKind,
    samples: &[[f32; 4]],
    compression: CompressionKind,
    format: Option<PackFormat>,
) -> (Vec<u8>, Vec<f32>, u16, PackFormat) {
    let scalar = channel_kind == ChannelKind::Float;
    match compression {
        CompressionKind::Uncompressed => {
            let lanes = if scalar { 1 } else { 4 };
            let mut payload = Vec::with_capacity(samples.len() * lanes * 4);
            for s in samples {
                for c in 0..lanes {
                    payload.extend_from_slice(&s[c].to_le_bytes());
                }
            }
            (payload, Vec::new(), (lanes * 32) as u16, PackFormat::Fixed)
        }
        CompressionKind::Float16 => {
            let lanes = if scalar { 1 } else { 4 };
            let mut payload = Vec::with_capacity(samples.len() * lanes * 2);
            for s in samples {
                for c in 0..lanes {
                    payload.extend_from_slice(&f16::from_f32(s[c]).to_bits().to_le_bytes());
                }
            }
            (payload, Vec::new(), (lanes * 16) as u16, PackFormat::Fixed)
        }
        CompressionKind::RangeVector => {
            let bits = match format {
                Some(PackFormat::ComponentBits(b)) => b,
                _ => {
                    if scalar {
                        [11, 0, 0, 0]
                    } else {
                        DEFAULT_RANGE_BITS
                    }
                }
            };
            encode_range(samples, bits)
        }
        CompressionKind::ConstVec48 => {
            let mut payload = Vec::with_capacity(samples.len() * 6);
            for s in samples {
                for c in 0..3 {
                    payload.extend_from_slice(&f16::from_f32(s[c]).to_bits().to_le_bytes());
                }
            }
            (payload, Vec::new(), 48, PackFormat::Fixed)
        }
        _ => unreachable!("non-vector kind routed to vector codec"),
    }
}

fn encode_range(samples: &[[f32; 4]], bits: [u8; 4]) -> (Vec<u8>, Vec<f32>, u16, PackFormat) {
    // Per-component min/max over the sample set
    let mut range_data = vec![0.0f32; RANGE_FLOATS];
    let mut lo = [f32::MAX; 4];
    let mut hi = [f32::MIN; 4];
    for s in samples {
        for c in 0..4 {
            lo[c] = lo[c].min(s[c]);
            hi[c] = hi[c].max(s[c]);
        }
    }
    for c in 0..4 {
        range_data[c * 2] = lo[c];
        range_data[c * 2 + 1] = hi[c] - lo[c];
    }

    let mut w = BitWriter::new();
    for s in samples {
        for c in 0..4 {
            if bits[c] == 0 {
                continue;
            }
            let bias = range_data[c * 2];
            let scale = range_data[c * 2 + 1];
            let maxq = ((1u32 << bits[c]) - 1) as f32;
            let q = if scale > 0.0 {
                (((s[c] - bias) / scale) * maxq).round().clamp(0.0, maxq) as u32
            } else {
                0
            };
            w.push(q, bits[c]);
        }
    }
    let total: u16 = bits.iter().map(|&b| b as u16).sum();
    (
        w.into_bytes(),
        range_data,
        total,
        PackFormat::ComponentBits(bits),
    )
}

pub(super) fn decode(array: &CompressedArray, i: u16) -> [f32; 4] {
    let scalar = array.channel_kind == ChannelKind::Float;
    let mut out = [0.0f32; 4];
    match array.compression {
        CompressionKind::Uncompressed => {
            let lanes = if scalar { 1 } else { 4 };
            let base = i as usize * lanes * 4;
            for c in 0..lanes {
                let o = base + c * 4;
                out[c] = f32::from_le_bytes(array.payload[o..o + 4].try_into().unwrap());
            }
        }
        CompressionKind::Float16 => {
            let lanes = if scalar { 1 } else { 4 };
            let base = i as usize * lanes * 2;
            for c in 0..lanes {
                let o = base + c * 2;
                let bits = u16::from_le_bytes(array.payload[o..o + 2].try_into().unwrap());
                out[c] = f16::from_bits(bits).to_f32();
            }
        }
        CompressionKind::RangeVector => {
            let bits = match array.format {
                PackFormat::ComponentBits(b) => b,
                PackFormat::Fixed => DEFAULT_RANGE_BITS,
            };
            let per_sample: usize = bits.iter().map(|&b| b as usize).sum();
            let mut r = BitReader::new(&array.payload);
            skip_bits(&mut r, i as usize * per_sample);
            for c in 0..4 {
                let bias = array.range_data[c * 2];
                let scale = array.range_data[c * 2 + 1];
                if bits[c] == 0 {
                    out[c] = bias;
                    continue;
                }
                let q = r.read(bits[c]);
                let maxq = ((1u32 << bits[c]) - 1) as f32;
                out[c] = if scale > 0.0 {
                    bias + (q as f32 / maxq) * scale
                } else {
                    bias
                };
            }
        }
        CompressionKind::ConstVec48 => {
            let base = i as usize * 6;
            for c in 0..3 {
                let o = base + c * 2;
                let bits = u16::from_le_bytes(array.payload[o..o + 2].try_into().unwrap());
                out[c] = f16::from_bits(bits).to_f32();
            }
        }
        _ => unreachable!("non-vector kind routed to vector codec"),
    }
    out
}

fn skip_bits(r: &mut BitReader, mut bits: usize) {
    while bits > 0 {
        let take = bits.min(32);
        let _ = r.read(take as u8);
        bits -= take;
    }
}
