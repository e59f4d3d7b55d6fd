//! Channel group compiler
//!
//! One processing group at a time: classify the clip's channels into
//! buckets, schedule them into cache-sized batches, and assemble each
//! batch's command list. Groups compile independently, which is what lets
//! the top level fan them out across a thread pool.

mod classify;
mod ops;
mod schedule;

#[cfg(test)]
mod tests;

pub use classify::{classify, Classified, GroupMasks};
pub use ops::{assemble, AnimOp, SourceRef};
pub use schedule::{collect_sources, schedule, OpSource, ScheduledBatch};

use clipforge_format::KEY_CACHE_SIZE;

use crate::channel::{CompressedChannelGroup, CompressedClip, ConstChannelGroup};
use crate::error::ClipError;
use crate::source::GroupRange;

/// One decompression batch: a command list sharing one key-cache residency
#[derive(Debug, Clone)]
pub struct OpBatch {
    pub ops: Vec<AnimOp>,
    pub cache_bytes: u32,
}

/// Fully compiled processing group, ready for serialization
#[derive(Debug, Clone)]
pub struct ChannelGroup {
    pub index: usize,
    pub range: GroupRange,
    pub compressed: Vec<CompressedChannelGroup>,
    pub consts: Vec<ConstChannelGroup>,
    pub masks: GroupMasks,
    pub batches: Vec<OpBatch>,
}

impl ChannelGroup {
    /// Peak cache residency across the group's batches
    pub fn cache_bytes(&self) -> u32 {
        self.batches.iter().map(|b| b.cache_bytes).max().unwrap_or(0)
    }

    pub fn command_count(&self) -> usize {
        self.batches.iter().map(|b| b.ops.len()).sum()
    }
}

/// Compile one processing group of a clip
pub fn compile(
    index: usize,
    range: &GroupRange,
    clip: &CompressedClip,
) -> Result<ChannelGroup, ClipError> {
    let classified = classify(index, range, clip)?;

    // Schemes without an embedded command block carry key data only; the
    // runtime walks the masks directly and no batches are scheduled.
    let batches = if clip.scheme.has_command_block() {
        let sources = collect_sources(&classified.compressed, clip.scheme)?;
        let scheduled = schedule(sources, clip.scheme);
        let mut batches = Vec::with_capacity(scheduled.len());
        for batch in &scheduled {
            debug_assert!(batch.cache_bytes <= KEY_CACHE_SIZE);
            batches.push(OpBatch {
                ops: assemble(batch)?,
                cache_bytes: batch.cache_bytes,
            });
        }
        batches
    } else {
        Vec::new()
    };
    tracing::debug!(
        clip = %clip.name,
        group = index,
        buckets = classified.compressed.len(),
        payload_bits = classified
            .compressed
            .iter()
            .map(|c| c.total_bits())
            .sum::<usize>(),
        batches = batches.len(),
        cache_bytes = batches.iter().map(|b| b.cache_bytes).max().unwrap_or(0),
        "group compiled"
    );
    Ok(ChannelGroup {
        index,
        range: *range,
        compressed: classified.compressed,
        consts: classified.consts,
        masks: classified.masks,
        batches,
    })
}
