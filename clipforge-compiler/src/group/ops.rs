//! Command assembly
//!
//! Flattens a scheduled batch into the ordered command list the runtime
//! replays: every key-copy command first, then the decompress commands
//! (sub-step 0 before sub-step 1), then the output commands. Adjacent
//! sources sharing a command and a contiguous cache region merge into one
//! command with multiple operands.

use clipforge_format::{AnimCmd, CmdRole};
use smallvec::SmallVec;

use crate::error::{check_u16, ClipError};
use crate::group::schedule::{OpSource, ScheduledBatch};

/// One serialized command operand: a contiguous channel run of one
/// compressed channel group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRef {
    pub ccg: u16,
    pub first_channel: u16,
    pub channel_count: u16,
    pub key_count: u16,
}

/// One runtime command with its cache region and operands
#[derive(Debug, Clone)]
pub struct AnimOp {
    pub cmd: AnimCmd,
    pub cache_offset: u16,
    pub cache_bytes: u16,
    /// Key rows for copy/decompress commands, padded channel items for
    /// output commands
    pub item_count: u16,
    pub alignment: u8,
    pub sources: SmallVec<[SourceRef; 2]>,
}

impl AnimOp {
    pub fn role(&self) -> CmdRole {
        self.cmd.role()
    }
}

fn source_ref(src: &OpSource) -> SourceRef {
    SourceRef {
        ccg: src.ccg,
        first_channel: src.first_channel,
        channel_count: src.channel_count,
        key_count: src.key_count,
    }
}

fn new_op(cmd: AnimCmd, src: &OpSource, item_count: u16) -> Result<AnimOp, ClipError> {
    Ok(AnimOp {
        cmd,
        cache_offset: check_u16("cache offset", src.cache_offset as u64)?,
        cache_bytes: check_u16("cache bytes", src.cache_bytes() as u64)?,
        item_count,
        alignment: src.alignment,
        sources: SmallVec::from_elem(source_ref(src), 1),
    })
}

/// Whether `src` can join `op` as another operand
fn merges(op: &AnimOp, cmd: AnimCmd, src: &OpSource) -> bool {
    op.cmd == cmd
        && src.key_count == op.sources[0].key_count
        && op.cache_offset as u32 + op.cache_bytes as u32 == src.cache_offset
}

fn merge(op: &mut AnimOp, src: &OpSource, extra_items: u16) -> Result<(), ClipError> {
    op.cache_bytes = check_u16(
        "cache bytes",
        op.cache_bytes as u64 + src.cache_bytes() as u64,
    )?;
    op.item_count += extra_items;
    op.alignment = op.alignment.max(src.alignment);
    op.sources.push(source_ref(src));
    Ok(())
}

/// Assemble a batch's sources into its ordered command list
pub fn assemble(batch: &ScheduledBatch) -> Result<Vec<AnimOp>, ClipError> {
    let mut ops: Vec<AnimOp> = Vec::new();

    // Key copies, in cache order
    for src in &batch.sources {
        match ops.last_mut() {
            Some(op) if merges(op, src.copy_cmd, src) => merge(op, src, 0)?,
            _ => ops.push(new_op(src.copy_cmd, src, src.key_count)?),
        }
    }

    // Decompress sub-step 0 across all sources, then sub-step 1
    for sub_step in 0..2 {
        let mut first = true;
        for src in &batch.sources {
            let Some(&cmd) = src.decompress_cmds.get(sub_step) else {
                continue;
            };
            match ops.last_mut() {
                Some(op) if !first && merges(op, cmd, src) => merge(op, src, 0)?,
                _ => ops.push(new_op(cmd, src, src.key_count)?),
            }
            first = false;
        }
    }

    // Outputs; item counts accumulate padded channel items
    let mut first = true;
    for src in &batch.sources {
        match ops.last_mut() {
            Some(op) if !first && merges(op, src.output_cmd, src) => {
                merge(op, src, src.padded_items)?
            }
            _ => ops.push(new_op(src.output_cmd, src, src.padded_items)?),
        }
        first = false;
    }

    debug_assert!(ops.windows(2).all(|w| w[0].role() <= w[1].role()));
    Ok(ops)
}
