//! Offline animation clip compiler
//!
//! Takes raw per-frame samples of a skeletal animation, compresses every
//! channel under caller-supplied tolerances, schedules the channels into
//! runtime key-cache batches, and serializes the relocatable binary blob
//! described by `clipforge-format`.
//!
//! The pipeline per clip:
//!
//! ```text
//! SourceClip ── key extraction ── per-channel compression ── CompressedClip
//!                                                                 │
//!              per processing group (parallel): classify ── schedule ── assemble
//!                                                                 │
//!                                   single-threaded writer ── Vec<u8>
//! ```
//!
//! Every error is fatal to the clip; the compiler never silently degrades
//! output quality.

pub mod channel;
pub mod codec;
pub mod error;
pub mod group;
pub mod keys;
pub mod settings;
pub mod source;
pub mod spline;
pub mod writer;

use clipforge_format::KeySchemeKind;
use rayon::prelude::*;

pub use channel::CompressedClip;
pub use error::ClipError;
pub use settings::{ChannelSettings, CompressionRequest, CompressionSettings};
pub use source::{BindTarget, Binding, GroupRange, HierarchyDescriptor, SourceClip, Track};

/// Compile one source clip to its binary blob
///
/// Processing groups compile independently across the rayon pool; the final
/// serialization pass is single-threaded so identical inputs always produce
/// byte-identical output.
pub fn compile_clip(
    source: &SourceClip,
    hierarchy: &HierarchyDescriptor,
    binding: &Binding,
    settings: &CompressionSettings,
) -> Result<Vec<u8>, ClipError> {
    hierarchy.validate()?;

    if settings.scheme == KeySchemeKind::Spline {
        let channels = spline::build_spline_channels(source, binding, settings.key_tolerance)?;
        let blob = spline::write_spline_clip(source, hierarchy.hierarchy_id, &channels)?;
        tracing::info!(
            clip = %source.name,
            channels = channels.len(),
            bytes = blob.len(),
            "spline clip compiled"
        );
        return Ok(blob);
    }

    let clip = CompressedClip::build(source, binding, settings)?;
    let groups = hierarchy
        .groups
        .par_iter()
        .enumerate()
        .map(|(index, range)| group::compile(index, range, &clip))
        .collect::<Result<Vec<_>, _>>()?;
    let blob = writer::write_clip(&clip, hierarchy, &groups)?;
    tracing::info!(
        clip = %source.name,
        groups = groups.len(),
        frames = source.frame_count,
        bytes = blob.len(),
        "clip compiled"
    );
    Ok(blob)
}
