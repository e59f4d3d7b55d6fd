//! Compiler error taxonomy
//!
//! Every error is fatal to the current clip compilation; there is no
//! partial-success or degraded-quality path. A fallback-to-uncompressed
//! policy, if wanted, is a caller decision made before invoking the codecs.

use clipforge_format::CompressionKind;

/// Fatal clip-compilation error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClipError {
    /// An internal invariant was broken; programming-error class
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A count or computed offset exceeds its fixed-width serialization field
    #[error("{field} = {value} exceeds serialization limit {max}")]
    CapacityOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// Two channels in one group disagree on key count under a shared or
    /// uniform scheme
    #[error("group {group}: channel {channel} has {got} keys, expected {expected}")]
    MismatchedSampleCounts {
        group: usize,
        channel: String,
        expected: usize,
        got: usize,
    },

    /// The requested compression kind cannot encode this channel
    #[error("compression kind {kind:?} is not valid for channel {channel}")]
    UnsupportedCompressionKind {
        channel: String,
        kind: CompressionKind,
    },

    /// Auto selection found no concrete kind meeting the tolerance
    #[error("no compression kind for channel {channel} meets tolerance {tolerance}")]
    ToleranceUnmet { channel: String, tolerance: f32 },
}

impl ClipError {
    pub(crate) fn contract(detail: impl Into<String>) -> Self {
        ClipError::ContractViolation(detail.into())
    }

    pub(crate) fn overflow(field: &'static str, value: u64, max: u64) -> Self {
        ClipError::CapacityOverflow { field, value, max }
    }
}

/// Check a count or offset against a u16 serialization field
pub(crate) fn check_u16(field: &'static str, value: u64) -> Result<u16, ClipError> {
    if value > u16::MAX as u64 {
        return Err(ClipError::overflow(field, value, u16::MAX as u64));
    }
    Ok(value as u16)
}

/// Check an offset against a u32 serialization field
pub(crate) fn check_u32(field: &'static str, value: u64) -> Result<u32, ClipError> {
    if value > u32::MAX as u64 {
        return Err(ClipError::overflow(field, value, u32::MAX as u64));
    }
    Ok(value as u32)
}
