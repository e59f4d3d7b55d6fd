//! Cache scheduling
//!
//! Turns the classified channel buckets of one processing group into
//! decompression batches that fit the runtime's fixed key cache. Greedy and
//! deterministic: sources are walked in classification order, breaks happen
//! at the cheapest command boundary seen when the cache budget forces one,
//! and broken-off runs are placed first-fit into an already-open batch with
//! spare capacity.

use clipforge_format::{
    AnimCmd, ChannelKind, CompressionKind, KeySchemeKind, KEY_CACHE_SIZE, SCALAR_SLOT_BYTES,
    TWEEN_ALIGN, VECTOR_SLOT_BYTES,
};
use smallvec::SmallVec;

use crate::channel::CompressedChannelGroup;
use crate::error::ClipError;

/// One schedulable slice of a compressed channel group
#[derive(Debug, Clone)]
pub struct OpSource {
    /// Index of the owning [`CompressedChannelGroup`] within the group
    pub ccg: u16,
    /// First channel of the slice within the owning group
    pub first_channel: u16,
    pub channel_count: u16,
    /// Channel count rounded up to the decompress alignment
    pub padded_items: u16,
    /// Cache key slots allocated per item
    pub key_count: u16,
    pub slot_bytes: u16,
    pub kind: ChannelKind,
    pub alignment: u8,
    pub copy_cmd: AnimCmd,
    pub decompress_cmds: SmallVec<[AnimCmd; 2]>,
    pub output_cmd: AnimCmd,
    /// Assigned during placement
    pub cache_offset: u32,
}

impl OpSource {
    pub fn cache_bytes(&self) -> u32 {
        self.key_count as u32 * self.slot_bytes as u32 * self.padded_items as u32
    }
}

fn copy_cmd(kind: ChannelKind, scheme: KeySchemeKind) -> AnimCmd {
    match (kind.is_vector(), scheme == KeySchemeKind::UnsharedNonUniform) {
        (true, false) => AnimCmd::CopyKeys32,
        (true, true) => AnimCmd::CopyKeysBlock32,
        (false, false) => AnimCmd::CopyKeys8,
        (false, true) => AnimCmd::CopyKeysBlock8,
    }
}

fn decompress_cmds(compression: CompressionKind) -> SmallVec<[AnimCmd; 2]> {
    match compression {
        CompressionKind::Uncompressed
        | CompressionKind::ConstVec48
        | CompressionKind::ConstQuat48 => SmallVec::new(),
        CompressionKind::Float16 => SmallVec::from_slice(&[AnimCmd::DecompressFloat16]),
        CompressionKind::RangeVector => {
            SmallVec::from_slice(&[AnimCmd::UnpackRangeBits, AnimCmd::ExpandRange])
        }
        CompressionKind::QuatSmallestThree => {
            SmallVec::from_slice(&[AnimCmd::DecompressQuatSmallestThree])
        }
        CompressionKind::QuatLog => {
            SmallVec::from_slice(&[AnimCmd::DecompressQuatLogRange, AnimCmd::ReconstructQuatLog])
        }
        CompressionKind::QuatLogOriented => SmallVec::from_slice(&[
            AnimCmd::DecompressQuatLogRange,
            AnimCmd::ReconstructQuatLogOriented,
        ]),
    }
}

fn output_cmd(kind: ChannelKind, scheme: KeySchemeKind) -> AnimCmd {
    let block = scheme == KeySchemeKind::UnsharedNonUniform;
    match kind {
        ChannelKind::Rotation => {
            if block {
                AnimCmd::OutputBlockSlerp
            } else {
                AnimCmd::OutputSlerp
            }
        }
        ChannelKind::Float => {
            if block {
                AnimCmd::OutputBlockScalarLerp
            } else {
                AnimCmd::OutputScalarLerp
            }
        }
        _ => {
            if block {
                AnimCmd::OutputBlockLerp
            } else {
                AnimCmd::OutputLerp
            }
        }
    }
}

/// Flatten the group's channel buckets into schedulable sources
///
/// Buckets whose cache footprint exceeds the whole key cache are split into
/// aligned channel slices that fit on their own.
pub fn collect_sources(
    compressed: &[CompressedChannelGroup],
    scheme: KeySchemeKind,
) -> Result<Vec<OpSource>, ClipError> {
    let mut sources = Vec::new();
    for (ccg_index, ccg) in compressed.iter().enumerate() {
        let kind = ccg.kind();
        let compression = ccg.compression();
        let key_count = ccg.slot_keys();
        let slot_bytes = if kind.is_vector() {
            VECTOR_SLOT_BYTES
        } else if scheme.pads_scalar_slots() {
            SCALAR_SLOT_BYTES * 4
        } else {
            SCALAR_SLOT_BYTES
        };
        let alignment = compression.decompress_alignment();
        let slot_cost = key_count as u32 * slot_bytes as u32;
        if slot_cost * alignment as u32 > KEY_CACHE_SIZE {
            return Err(ClipError::overflow(
                "channel cache footprint",
                (slot_cost * alignment as u32) as u64,
                KEY_CACHE_SIZE as u64,
            ));
        }
        // Largest aligned slice that fits the cache on its own
        let max_items = (KEY_CACHE_SIZE / slot_cost) as u16 / alignment as u16 * alignment as u16;

        let mut first_channel = 0u16;
        while first_channel < ccg.channel_count() {
            let channel_count = (ccg.channel_count() - first_channel).min(max_items);
            let padded_items = channel_count.div_ceil(alignment as u16) * alignment as u16;
            sources.push(OpSource {
                ccg: ccg_index as u16,
                first_channel,
                channel_count,
                padded_items,
                key_count,
                slot_bytes,
                kind,
                alignment,
                copy_cmd: copy_cmd(kind, scheme),
                decompress_cmds: decompress_cmds(compression),
                output_cmd: output_cmd(kind, scheme),
                cache_offset: 0,
            });
            first_channel += channel_count;
        }
    }
    Ok(sources)
}

/// One cache-sized batch of placed sources
#[derive(Debug, Clone, Default)]
pub struct ScheduledBatch {
    pub sources: Vec<OpSource>,
    pub cache_bytes: u32,
}

/// Command kinds that change across a boundary; 0 means a free break
fn break_cost(a: &OpSource, b: &OpSource) -> u32 {
    (a.copy_cmd != b.copy_cmd) as u32
        + (a.decompress_cmds != b.decompress_cmds) as u32
        + (a.output_cmd != b.output_cmd) as u32
}

/// Lay out a candidate batch, recomputing every offset from zero
///
/// Tween-table padding is applied here, at merge time, so earlier estimates
/// can never go stale: under the unshared scheme the offset realigns to
/// [`TWEEN_ALIGN`] whenever the output channel kind changes.
fn layout(sources: &mut [OpSource], scheme: KeySchemeKind) -> Option<u32> {
    let mut cursor = 0u32;
    let mut prev_kind: Option<ChannelKind> = None;
    for src in sources.iter_mut() {
        if scheme == KeySchemeKind::UnsharedNonUniform
            && prev_kind.is_some_and(|k| k != src.kind)
        {
            cursor = cursor.div_ceil(TWEEN_ALIGN) * TWEEN_ALIGN;
        }
        src.cache_offset = cursor;
        cursor += src.cache_bytes();
        prev_kind = Some(src.kind);
    }
    (cursor <= KEY_CACHE_SIZE).then_some(cursor)
}

/// Cut index with the cheapest boundary cost; ties go to the later boundary.
/// `incoming` is the source that forced the break.
fn cheapest_cut(run: &[OpSource], incoming: &OpSource) -> usize {
    let mut best = run.len();
    let mut best_cost = break_cost(&run[run.len() - 1], incoming);
    for cut in (1..run.len()).rev() {
        let cost = break_cost(&run[cut - 1], &run[cut]);
        if cost < best_cost {
            best = cut;
            best_cost = cost;
        }
    }
    best
}

/// Place a finished run into the first open batch with room, else a new one
fn place_run(batches: &mut Vec<ScheduledBatch>, run: &[OpSource], scheme: KeySchemeKind) {
    for batch in batches.iter_mut() {
        let mut candidate: Vec<OpSource> = batch.sources.clone();
        candidate.extend_from_slice(run);
        if let Some(bytes) = layout(&mut candidate, scheme) {
            batch.sources = candidate;
            batch.cache_bytes = bytes;
            return;
        }
    }
    let mut sources = run.to_vec();
    // Sources are pre-split to fit a fresh cache, so this cannot fail
    let cache_bytes = layout(&mut sources, scheme).unwrap_or(0);
    batches.push(ScheduledBatch {
        sources,
        cache_bytes,
    });
}

/// Group sources into cache-sized batches
pub fn schedule(sources: Vec<OpSource>, scheme: KeySchemeKind) -> Vec<ScheduledBatch> {
    let mut batches: Vec<ScheduledBatch> = Vec::new();
    let mut run: Vec<OpSource> = Vec::new();
    for src in sources {
        loop {
            let mut candidate = run.clone();
            candidate.push(src.clone());
            if layout(&mut candidate, scheme).is_some() {
                run = candidate;
                break;
            }
            // Over budget: break the run at its cheapest boundary
            let cut = cheapest_cut(&run, &src);
            let tail = run.split_off(cut);
            place_run(&mut batches, &run, scheme);
            run = tail;
        }
    }
    if !run.is_empty() {
        place_run(&mut batches, &run, scheme);
    }
    batches
}
