//! Quaternion codecs
//!
//! Smallest-three (32-bit animated, 48-bit constant) and the two
//! quaternion-log kinds. The log kinds store a shared orientation computed
//! once across all samples of the channel (component average, then
//! renormalized) in range data, and range-quantize the residual log vectors
//! to 3×16 bits.

use clipforge_format::CompressionKind;
use glam::{Quat, Vec3};

use super::{CompressedArray, PackFormat};

/// QuatLog range data: mean orientation (4) + bias/scale per log component (6)
const LOG_RANGE_FLOATS: usize = 10;
/// QuatLogOriented range data: pre (4) + post (4) + bias/scale (6)
const LOG_ORIENTED_RANGE_FLOATS: usize = 14;

pub(super) fn encode(
    samples: &[[f32; 4]],
    compression: CompressionKind,
) -> (Vec<u8>, Vec<f32>, u16, PackFormat) {
    match compression {
        CompressionKind::QuatSmallestThree => {
            let mut payload = Vec::with_capacity(samples.len() * 4);
            for s in samples {
                payload.extend_from_slice(&encode_smallest_three_32(*s).to_le_bytes());
            }
            (payload, Vec::new(), 32, PackFormat::Fixed)
        }
        CompressionKind::ConstQuat48 => {
            let mut payload = Vec::with_capacity(samples.len() * 6);
            for s in samples {
                let packed = encode_smallest_three_48(*s);
                payload.extend_from_slice(&packed.to_le_bytes()[..6]);
            }
            (payload, Vec::new(), 48, PackFormat::Fixed)
        }
        CompressionKind::QuatLog => {
            let mean = mean_orientation(samples);
            let logs: Vec<Vec3> = samples
                .iter()
                .map(|s| log_residual(mean.conjugate() * to_quat(*s)))
                .collect();
            let (payload, bias_scale) = quantize_logs(&logs);
            let mut range_data = Vec::with_capacity(LOG_RANGE_FLOATS);
            range_data.extend_from_slice(&[mean.x, mean.y, mean.z, mean.w]);
            range_data.extend_from_slice(&bias_scale);
            (payload, range_data, 48, PackFormat::Fixed)
        }
        CompressionKind::QuatLogOriented => {
            let (pre, post) = orientation_pair(samples);
            let logs: Vec<Vec3> = samples
                .iter()
                .map(|s| log_residual(pre.conjugate() * to_quat(*s) * post.conjugate()))
                .collect();
            let (payload, bias_scale) = quantize_logs(&logs);
            let mut range_data = Vec::with_capacity(LOG_ORIENTED_RANGE_FLOATS);
            range_data.extend_from_slice(&[pre.x, pre.y, pre.z, pre.w]);
            range_data.extend_from_slice(&[post.x, post.y, post.z, post.w]);
            range_data.extend_from_slice(&bias_scale);
            (payload, range_data, 48, PackFormat::Fixed)
        }
        _ => unreachable!("non-quaternion kind routed to quaternion codec"),
    }
}

pub(super) fn decode(array: &CompressedArray, i: u16) -> [f32; 4] {
    match array.compression {
        CompressionKind::QuatSmallestThree => {
            let base = i as usize * 4;
            let packed = u32::from_le_bytes(array.payload[base..base + 4].try_into().unwrap());
            decode_smallest_three_32(packed)
        }
        CompressionKind::ConstQuat48 => {
            let base = i as usize * 6;
            let mut bytes = [0u8; 8];
            bytes[..6].copy_from_slice(&array.payload[base..base + 6]);
            decode_smallest_three_48(u64::from_le_bytes(bytes))
        }
        CompressionKind::QuatLog => {
            let r = array.range_data();
            let mean = Quat::from_xyzw(r[0], r[1], r[2], r[3]);
            let v = dequantize_log(&array.payload, i, &r[4..10]);
            let q = mean * exp_quat(v);
            [q.x, q.y, q.z, q.w]
        }
        CompressionKind::QuatLogOriented => {
            let r = array.range_data();
            let pre = Quat::from_xyzw(r[0], r[1], r[2], r[3]);
            let post = Quat::from_xyzw(r[4], r[5], r[6], r[7]);
            let v = dequantize_log(&array.payload, i, &r[8..14]);
            let q = pre * exp_quat(v) * post;
            [q.x, q.y, q.z, q.w]
        }
        _ => unreachable!("non-quaternion kind routed to quaternion codec"),
    }
}

// ============================================================================
// Smallest-three encoding
// ============================================================================

fn largest_component(q: [f32; 4]) -> usize {
    let abs = [q[0].abs(), q[1].abs(), q[2].abs(), q[3].abs()];
    if abs[0] > abs[1] && abs[0] > abs[2] && abs[0] > abs[3] {
        0
    } else if abs[1] > abs[2] && abs[1] > abs[3] {
        1
    } else if abs[2] > abs[3] {
        2
    } else {
        3
    }
}

fn smallest_three(q: [f32; 4]) -> (usize, [f32; 3]) {
    let idx = largest_component(q);
    // q and -q encode the same rotation; force the dropped component positive
    let sign = if q[idx] < 0.0 { -1.0 } else { 1.0 };
    let q = [q[0] * sign, q[1] * sign, q[2] * sign, q[3] * sign];
    let rest = match idx {
        0 => [q[1], q[2], q[3]],
        1 => [q[0], q[2], q[3]],
        2 => [q[0], q[1], q[3]],
        _ => [q[0], q[1], q[2]],
    };
    (idx, rest)
}

fn rebuild_quat(idx: usize, rest: [f32; 3]) -> [f32; 4] {
    let [a, b, c] = rest;
    let largest = (1.0 - a * a - b * b - c * c).max(0.0).sqrt();
    match idx {
        0 => [largest, a, b, c],
        1 => [a, largest, b, c],
        2 => [a, b, largest, c],
        _ => [a, b, c, largest],
    }
}

/// Quantize a component in [-1/√2, 1/√2] to `bits` bits
fn quantize_component(v: f32, bits: u32) -> u32 {
    let scale = ((1u32 << bits) - 1) as f32 / 2.0;
    let q = ((v * std::f32::consts::SQRT_2 + 1.0) * scale).round() as i64;
    q.clamp(0, (1i64 << bits) - 1) as u32
}

fn dequantize_component(q: u32, bits: u32) -> f32 {
    let scale = 2.0 / ((1u32 << bits) - 1) as f32;
    (q as f32 * scale - 1.0) * std::f32::consts::FRAC_1_SQRT_2
}

/// 32-bit layout: [a:10][b:10][c:10][idx:2]
fn encode_smallest_three_32(q: [f32; 4]) -> u32 {
    let (idx, rest) = smallest_three(q);
    let qa = quantize_component(rest[0], 10);
    let qb = quantize_component(rest[1], 10);
    let qc = quantize_component(rest[2], 10);
    (qa << 22) | (qb << 12) | (qc << 2) | idx as u32
}

fn decode_smallest_three_32(packed: u32) -> [f32; 4] {
    let idx = (packed & 0x3) as usize;
    let a = dequantize_component((packed >> 22) & 0x3FF, 10);
    let b = dequantize_component((packed >> 12) & 0x3FF, 10);
    let c = dequantize_component((packed >> 2) & 0x3FF, 10);
    rebuild_quat(idx, [a, b, c])
}

/// 48-bit constant layout: [a:15][b:15][c:15][idx:2], top bit unused
fn encode_smallest_three_48(q: [f32; 4]) -> u64 {
    let (idx, rest) = smallest_three(q);
    let qa = quantize_component(rest[0], 15) as u64;
    let qb = quantize_component(rest[1], 15) as u64;
    let qc = quantize_component(rest[2], 15) as u64;
    (qa << 32) | (qb << 17) | (qc << 2) | idx as u64
}

fn decode_smallest_three_48(packed: u64) -> [f32; 4] {
    let idx = (packed & 0x3) as usize;
    let a = dequantize_component(((packed >> 32) & 0x7FFF) as u32, 15);
    let b = dequantize_component(((packed >> 17) & 0x7FFF) as u32, 15);
    let c = dequantize_component(((packed >> 2) & 0x7FFF) as u32, 15);
    rebuild_quat(idx, [a, b, c])
}

// ============================================================================
// Quaternion log
// ============================================================================

fn to_quat(s: [f32; 4]) -> Quat {
    Quat::from_xyzw(s[0], s[1], s[2], s[3]).normalize()
}

/// Shared mean orientation: sign-canonicalized component average, renormalized
pub(super) fn mean_orientation(samples: &[[f32; 4]]) -> Quat {
    let first = to_quat(samples[0]);
    let mut sum = Vec3::ZERO;
    let mut sum_w = 0.0f32;
    for s in samples {
        let mut q = to_quat(*s);
        if q.dot(first) < 0.0 {
            q = -q;
        }
        sum += Vec3::new(q.x, q.y, q.z);
        sum_w += q.w;
    }
    let mean = Quat::from_xyzw(sum.x, sum.y, sum.z, sum_w);
    if mean.length_squared() < 1e-12 {
        Quat::IDENTITY
    } else {
        mean.normalize()
    }
}

/// Pre/post orientation pair for the oriented log kind: the first sample as
/// pre, the mean residual as post. Both deterministic for byte-identical
/// recompilation.
fn orientation_pair(samples: &[[f32; 4]]) -> (Quat, Quat) {
    let mut pre = to_quat(samples[0]);
    if pre.w < 0.0 {
        pre = -pre;
    }
    let mean = mean_orientation(samples);
    let post = (pre.conjugate() * mean).normalize();
    (pre, post)
}

/// Log map of a unit quaternion residual, canonicalized to the w >= 0 cover
fn log_residual(r: Quat) -> Vec3 {
    let r = if r.w < 0.0 { -r } else { r }.normalize();
    let w = r.w.clamp(-1.0, 1.0);
    let theta = w.acos();
    let s = (1.0 - w * w).sqrt();
    let xyz = Vec3::new(r.x, r.y, r.z);
    if s < 1e-6 {
        // sin θ ≈ θ near identity
        xyz * 2.0
    } else {
        xyz * (2.0 * theta / s)
    }
}

fn exp_quat(v: Vec3) -> Quat {
    let theta = v.length() * 0.5;
    if theta < 1e-6 {
        Quat::from_xyzw(v.x * 0.5, v.y * 0.5, v.z * 0.5, 1.0).normalize()
    } else {
        let axis = v / v.length();
        let s = theta.sin();
        Quat::from_xyzw(axis.x * s, axis.y * s, axis.z * s, theta.cos())
    }
}

/// Range-quantize log vectors to 3×16 bits; returns (payload, bias/scale ×3)
fn quantize_logs(logs: &[Vec3]) -> (Vec<u8>, [f32; 6]) {
    let mut lo = Vec3::MAX;
    let mut hi = Vec3::MIN;
    for v in logs {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    let bias_scale = [
        lo.x,
        hi.x - lo.x,
        lo.y,
        hi.y - lo.y,
        lo.z,
        hi.z - lo.z,
    ];
    let mut payload = Vec::with_capacity(logs.len() * 6);
    for v in logs {
        for c in 0..3 {
            let bias = bias_scale[c * 2];
            let scale = bias_scale[c * 2 + 1];
            let q = if scale > 0.0 {
                (((v[c] - bias) / scale) * 65535.0).round().clamp(0.0, 65535.0) as u16
            } else {
                0
            };
            payload.extend_from_slice(&q.to_le_bytes());
        }
    }
    (payload, bias_scale)
}

fn dequantize_log(payload: &[u8], i: u16, bias_scale: &[f32]) -> Vec3 {
    let base = i as usize * 6;
    let mut v = [0.0f32; 3];
    for c in 0..3 {
        let o = base + c * 2;
        let q = u16::from_le_bytes(payload[o..o + 2].try_into().unwrap());
        let bias = bias_scale[c * 2];
        let scale = bias_scale[c * 2 + 1];
        v[c] = if scale > 0.0 {
            bias + (q as f32 / 65535.0) * scale
        } else {
            bias
        };
    }
    Vec3::from_array(v)
}
