//! Clip blob serialization
//!
//! Single-threaded, deterministic walk over the compiled groups. Sections
//! are written in declaration order; every cross-section offset goes through
//! a stream link so a field is either patched exactly once or the writer
//! refuses to finish.
//!
//! ```text
//! ClipHeader
//! GroupHeader × group_count
//! per group: masks | command block | const data | key data   (16-aligned)
//! optional root-motion record
//! ```

use clipforge_format::{
    clip_flags, ClipHeader, CompressionKind, GroupHeader, KeySchemeKind, RECORD_ALIGN,
    SECTION_ALIGN,
};

use crate::channel::{CompressedClip, ConstChannelGroup, ConstPool};
use crate::codec::PackFormat;
use crate::error::{check_u16, ClipError};
use crate::group::{ChannelGroup, OpBatch};
use crate::keys;
use crate::source::{HierarchyDescriptor, RootMotion};
use crate::writer::stream::{LinkId, StreamWriter};

/// Pending key-data reference of one serialized command operand
struct SourceLink {
    ccg: u16,
    first_channel: u16,
    link: LinkId,
}

struct GroupLinks {
    mask: Option<LinkId>,
    command: Option<LinkId>,
    consts: Option<LinkId>,
    key_data: Option<LinkId>,
    sources: Vec<SourceLink>,
}

fn take_link(slot: &mut Option<LinkId>) -> Result<LinkId, ClipError> {
    slot.take()
        .ok_or_else(|| ClipError::contract("group section written twice"))
}

/// Serialize a compiled clip to its binary blob
pub fn write_clip(
    clip: &CompressedClip,
    hierarchy: &HierarchyDescriptor,
    groups: &[ChannelGroup],
) -> Result<Vec<u8>, ClipError> {
    let mut w = StreamWriter::new();

    let mut header = ClipHeader::new(
        hierarchy.hierarchy_id,
        check_u16("group count", groups.len() as u64)?,
        clip.frame_count,
        clip.frame_rate,
    );
    header.set_scheme(clip.scheme);
    if clip.looping {
        header.flags |= clip_flags::LOOPING;
    }
    if clip.additive {
        header.flags |= clip_flags::ADDITIVE;
    }
    if clip.root_motion.is_some() {
        header.flags |= clip_flags::ROOT_MOTION;
    }
    w.write_bytes(&header.to_bytes());
    let total_size = w.link_at(ClipHeader::TOTAL_SIZE_OFFSET)?;
    let root_motion = clip
        .root_motion
        .is_some()
        .then(|| w.link_at(ClipHeader::ROOT_MOTION_OFFSET))
        .transpose()?;

    // Group header records, links patched as each section lands
    let mut links = Vec::with_capacity(groups.len());
    for group in groups {
        let record = GroupHeader {
            first_joint: group.range.first_joint,
            joint_count: group.range.joint_count,
            first_float: group.range.first_float,
            float_count: group.range.float_count,
            command_count: check_u16("command count", group.command_count() as u64)?,
            const_count: check_u16("const group count", group.consts.len() as u64)?,
            batch_count: check_u16("batch count", group.batches.len() as u64)?,
            cache_bytes: check_u16("group cache bytes", group.cache_bytes() as u64)?,
            ..GroupHeader::default()
        };
        let base = w.len();
        w.write_bytes(&record.to_bytes());
        links.push(GroupLinks {
            mask: Some(w.link_at(base + GroupHeader::MASK_LINK)?),
            command: Some(w.link_at(base + GroupHeader::COMMAND_LINK)?),
            consts: Some(w.link_at(base + GroupHeader::CONST_LINK)?),
            key_data: Some(w.link_at(base + GroupHeader::KEY_DATA_LINK)?),
            sources: Vec::new(),
        });
    }

    for (group, group_links) in groups.iter().zip(&mut links) {
        write_masks(&mut w, group, group_links)?;
        write_commands(&mut w, clip.scheme, &group.batches, group_links)?;
        write_consts(&mut w, group, &clip.vec_pool, &clip.quat_pool, group_links)?;
        write_key_data(&mut w, clip, group, group_links)?;
    }

    if let (Some(link), Some(rm)) = (root_motion, &clip.root_motion) {
        w.align_to(SECTION_ALIGN);
        w.resolve_link_here(link)?;
        write_root_motion(&mut w, clip.frame_count, rm);
    }

    w.align_to(RECORD_ALIGN);
    let size = w.position()?;
    w.resolve_link(total_size, size)?;
    w.finish()
}

fn write_masks(
    w: &mut StreamWriter,
    group: &ChannelGroup,
    links: &mut GroupLinks,
) -> Result<(), ClipError> {
    w.align_to(SECTION_ALIGN);
    let mask = take_link(&mut links.mask)?;
    w.resolve_link_here(mask)?;
    for word in group.masks.words() {
        w.write_u32(word);
    }
    Ok(())
}

fn write_commands(
    w: &mut StreamWriter,
    scheme: KeySchemeKind,
    batches: &[OpBatch],
    links: &mut GroupLinks,
) -> Result<(), ClipError> {
    let command = take_link(&mut links.command)?;
    if !scheme.has_command_block() || batches.is_empty() {
        return w.resolve_link(command, 0);
    }
    w.align_to(SECTION_ALIGN);
    w.resolve_link_here(command)?;
    for batch in batches {
        w.write_u16(check_u16("batch op count", batch.ops.len() as u64)?);
        w.write_u16(check_u16("batch cache bytes", batch.cache_bytes as u64)?);
        for op in &batch.ops {
            w.write_u8(op.cmd as u8);
            w.write_u8(op.alignment);
            w.write_u16(check_u16("source count", op.sources.len() as u64)?);
            w.write_u16(op.item_count);
            w.write_u16(op.cache_offset);
            w.write_u16(op.cache_bytes);
            w.write_u16(0);
            for src in &op.sources {
                links.sources.push(SourceLink {
                    ccg: src.ccg,
                    first_channel: src.first_channel,
                    link: w.reserve_u32_link(),
                });
                w.write_u16(src.first_channel);
                w.write_u16(src.channel_count);
            }
        }
    }
    Ok(())
}

fn write_consts(
    w: &mut StreamWriter,
    group: &ChannelGroup,
    vec_pool: &ConstPool,
    quat_pool: &ConstPool,
    links: &mut GroupLinks,
) -> Result<(), ClipError> {
    let consts = take_link(&mut links.consts)?;
    if group.consts.is_empty() {
        return w.resolve_link(consts, 0);
    }
    w.align_to(SECTION_ALIGN);
    w.resolve_link_here(consts)?;
    for record in &group.consts {
        write_const_record(w, record, vec_pool, quat_pool)?;
    }
    Ok(())
}

fn write_const_record(
    w: &mut StreamWriter,
    record: &ConstChannelGroup,
    vec_pool: &ConstPool,
    quat_pool: &ConstPool,
) -> Result<(), ClipError> {
    w.align_to(RECORD_ALIGN);
    w.write_u8(record.compression as u8);
    w.write_u8(record.channel_kind as u8);
    w.write_u16(check_u16("const value count", record.used.len() as u64)?);
    w.write_u16(check_u16("const channel count", record.channels.len() as u64)?);
    w.write_u16(0);
    let pool = if record.compression == CompressionKind::ConstQuat48 {
        quat_pool
    } else {
        vec_pool
    };
    // Values in first-use order; channels reference them by local index
    for &pool_index in &record.used {
        w.write_bytes(&pool.value(pool_index));
    }
    w.align_to(2);
    for (channel, value_index) in &record.channels {
        w.write_u16(channel.local_index);
        w.write_u16(*value_index);
    }
    Ok(())
}

fn write_key_data(
    w: &mut StreamWriter,
    clip: &CompressedClip,
    group: &ChannelGroup,
    links: &mut GroupLinks,
) -> Result<(), ClipError> {
    let key_data = take_link(&mut links.key_data)?;
    let has_table = clip.scheme == KeySchemeKind::SharedNonUniform
        || clip.scheme == KeySchemeKind::UnsharedNonUniform;
    if group.compressed.is_empty() && !has_table {
        return w.resolve_link(key_data, 0);
    }
    w.align_to(SECTION_ALIGN);
    w.resolve_link_here(key_data)?;

    match clip.scheme {
        KeySchemeKind::SharedNonUniform => {
            w.write_u16(check_u16("shared key count", clip.shared_keys.len() as u64)?);
            for &k in &clip.shared_keys {
                w.write_u16(k);
            }
        }
        KeySchemeKind::UnsharedNonUniform => write_block_directory(w, clip, group)?,
        _ => {}
    }

    // Per-channel compressed records; operand links resolve to the first
    // channel of their run
    let mut positions: Vec<Vec<u32>> = Vec::with_capacity(group.compressed.len());
    for ccg in &group.compressed {
        // Kinds with a per-instance bit layout share one format record
        // across the channel group
        if ccg.has_instance_format() {
            if let PackFormat::ComponentBits(bits) = ccg.format() {
                w.align_to(RECORD_ALIGN);
                w.write_bytes(&bits);
            }
        }
        let mut channel_positions = Vec::with_capacity(ccg.channels().len());
        for ch in ccg.channels() {
            w.align_to(RECORD_ALIGN);
            channel_positions.push(w.position()?);
            w.write_bytes(bytemuck::cast_slice(ch.array.range_data()));
            w.write_bytes(ch.array.payload());
        }
        positions.push(channel_positions);
    }
    for src in links.sources.drain(..) {
        let target = positions
            .get(src.ccg as usize)
            .and_then(|p| p.get(src.first_channel as usize))
            .copied()
            .ok_or_else(|| ClipError::contract("command operand references a missing channel"))?;
        w.resolve_link(src.link, target)?;
    }
    Ok(())
}

/// Root-motion record shared by the group and spline serializers; the
/// caller aligns the stream and patches the header offset
pub(crate) fn write_root_motion(w: &mut StreamWriter, frame_count: u16, rm: &RootMotion) {
    w.write_u16(frame_count);
    w.write_u16(0);
    for (t, r) in rm.translation.iter().zip(&rm.rotation) {
        w.write_bytes(bytemuck::cast_slice(t));
        w.write_bytes(bytemuck::cast_slice(r));
    }
}

/// Block directory plus per-channel intra-block key offsets
fn write_block_directory(
    w: &mut StreamWriter,
    clip: &CompressedClip,
    group: &ChannelGroup,
) -> Result<(), ClipError> {
    let block_count = keys::block_count(clip.frame_count);
    w.write_u16(check_u16("block count", block_count as u64)?);
    w.write_u16(0);
    for b in 0..block_count {
        let block = keys::block_bounds(b, clip.frame_count);
        w.write_u16(block.first_frame);
        w.write_u16(block.last_frame);
    }
    for ccg in &group.compressed {
        for ch in ccg.channels() {
            w.write_u16(check_u16("channel key count", ch.key_frames.len() as u64)?);
            for b in 0..block_count {
                let block = keys::block_bounds(b, clip.frame_count);
                let offsets = keys::block_offsets(&ch.key_frames, block)?;
                w.write_u8(offsets.len() as u8);
                for o in offsets {
                    w.write_u8(o);
                }
            }
            w.align_to(2);
        }
    }
    Ok(())
}
