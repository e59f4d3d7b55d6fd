//! Key extraction
//!
//! Decides which source frames each channel retains before compression.
//! Uniform keeps every frame, shared applies one clip-wide index set to all
//! channels, unshared picks per-channel keys greedily under a linear
//! interpolation tolerance and stores them in fixed 64-frame blocks so the
//! runtime can seek without scanning the whole clip.

use clipforge_format::BLOCK_FRAMES;

use crate::error::{check_u16, ClipError};

/// Frame indices retained for every channel under the uniform scheme
///
/// Looping clips append frame 0 again so the runtime can tween the wrap
/// without a modulo fetch. A single-frame clip keeps exactly one key.
pub fn uniform_keys(frame_count: u16, looping: bool) -> Vec<u16> {
    if frame_count == 1 {
        return vec![0];
    }
    let mut keys: Vec<u16> = (0..frame_count).collect();
    if looping {
        keys.push(0);
    }
    keys
}

/// Validate a clip-wide shared key set
///
/// Must be strictly monotonic, start at frame 0 and end at the last frame.
pub fn validate_shared_keys(keys: &[u16], frame_count: u16) -> Result<(), ClipError> {
    let last = frame_count - 1;
    if frame_count == 1 {
        if keys != [0] {
            return Err(ClipError::contract(
                "single-frame clip must use the single shared key 0",
            ));
        }
        return Ok(());
    }
    match (keys.first(), keys.last()) {
        (Some(0), Some(&k)) if k == last => {}
        _ => {
            return Err(ClipError::contract(format!(
                "shared keys must start at 0 and end at {last}"
            )));
        }
    }
    for pair in keys.windows(2) {
        if pair[1] <= pair[0] {
            return Err(ClipError::contract(format!(
                "shared keys not strictly monotonic at {} -> {}",
                pair[0], pair[1]
            )));
        }
    }
    Ok(())
}

/// Greedily select per-channel keys under a linear interpolation tolerance
///
/// Walks the frames and drops every frame whose value is reproduced within
/// `tolerance` by lerping its retained neighbors. The first and last frame
/// are always kept, as is every block boundary frame so each 64-frame block
/// stays self-contained.
pub fn select_channel_keys(
    samples: &[[f32; 4]],
    is_quat: bool,
    tolerance: f32,
) -> Result<Vec<u16>, ClipError> {
    let frame_count = check_u16("frame_count", samples.len() as u64)?;
    if frame_count == 0 {
        return Err(ClipError::contract("cannot select keys over zero frames"));
    }
    if frame_count == 1 {
        return Ok(vec![0]);
    }

    let mut keys = vec![0u16];
    let mut anchor = 0usize;
    let mut frame = 1usize;
    let last = frame_count as usize - 1;
    while frame < last {
        let candidate = frame + 1;
        if forced_key(frame, last) || !span_within(samples, anchor, candidate, is_quat, tolerance) {
            keys.push(frame as u16);
            anchor = frame;
        }
        frame += 1;
    }
    keys.push(last as u16);
    Ok(keys)
}

/// Block boundaries are always retained
fn forced_key(frame: usize, last: usize) -> bool {
    frame != last && frame % BLOCK_FRAMES as usize == 0
}

/// Whether lerping anchor..end reproduces every interior frame within tolerance
fn span_within(
    samples: &[[f32; 4]],
    anchor: usize,
    end: usize,
    is_quat: bool,
    tolerance: f32,
) -> bool {
    let a = samples[anchor];
    let b = align_sign(samples[end], a, is_quat);
    let span = (end - anchor) as f32;
    for frame in anchor + 1..end {
        let t = (frame - anchor) as f32 / span;
        let actual = align_sign(samples[frame], a, is_quat);
        for c in 0..4 {
            let lerped = a[c] + (b[c] - a[c]) * t;
            if (lerped - actual[c]).abs() > tolerance {
                return false;
            }
        }
    }
    true
}

fn align_sign(v: [f32; 4], reference: [f32; 4], is_quat: bool) -> [f32; 4] {
    if !is_quat {
        return v;
    }
    let dot: f32 = (0..4).map(|c| v[c] * reference[c]).sum();
    if dot < 0.0 {
        [-v[0], -v[1], -v[2], -v[3]]
    } else {
        v
    }
}

// ============================================================================
// Block directory
// ============================================================================

/// Inclusive frame range of one 64-frame block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBlock {
    pub first_frame: u16,
    pub last_frame: u16,
}

/// Number of blocks covering a clip; adjacent blocks share their boundary
/// frame
pub fn block_count(frame_count: u16) -> usize {
    if frame_count <= 1 {
        return 1;
    }
    ((frame_count as usize - 1) + BLOCK_FRAMES as usize - 1) / BLOCK_FRAMES as usize
}

pub fn block_bounds(block: usize, frame_count: u16) -> KeyBlock {
    let first = (block * BLOCK_FRAMES as usize) as u16;
    let last = ((block + 1) * BLOCK_FRAMES as usize).min(frame_count as usize - 1) as u16;
    KeyBlock {
        first_frame: first,
        last_frame: last.max(first),
    }
}

/// Per-channel key offsets within one block, as u8 deltas from the block's
/// first frame
///
/// The block's boundary frames are always included; `select_channel_keys`
/// guarantees they were retained.
pub fn block_offsets(keys: &[u16], block: KeyBlock) -> Result<Vec<u8>, ClipError> {
    let mut offsets = Vec::new();
    for &k in keys {
        if k < block.first_frame || k > block.last_frame {
            continue;
        }
        offsets.push((k - block.first_frame) as u8);
    }
    match (offsets.first(), offsets.last()) {
        (Some(0), Some(&o)) if o as u16 == block.last_frame - block.first_frame => Ok(offsets),
        _ if block.first_frame == block.last_frame && offsets == [0] => Ok(offsets),
        _ => Err(ClipError::contract(format!(
            "channel keys missing boundary frames of block {}..{}",
            block.first_frame, block.last_frame
        ))),
    }
}
