//! Compression parameter descriptor
//!
//! Supplied by the build driver, typically deserialized from the asset
//! manifest. Describes the keyframe scheme and the per-channel-kind
//! compression request and error tolerance.

use clipforge_format::{ChannelKind, CompressionKind, KeySchemeKind};
use serde::{Deserialize, Serialize};

/// Requested compression for one channel kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CompressionRequest {
    /// Use exactly this kind; its error is accepted as-is
    Exact(CompressionKind),
    /// Pick the cheapest kind whose max error stays under the tolerance.
    /// Resolution happens at selection time; only the chosen concrete kind
    /// is serialized. Uncompressed is deliberately not a candidate - falling
    /// back to it is a caller policy, not an auto outcome.
    Auto,
}

/// Compression request + tolerance for one channel kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub compression: CompressionRequest,
    /// Max acceptable per-component error (quaternion kinds compare
    /// components after sign alignment)
    pub tolerance: f32,
}

impl ChannelSettings {
    pub fn exact(kind: CompressionKind) -> Self {
        Self {
            compression: CompressionRequest::Exact(kind),
            tolerance: f32::MAX,
        }
    }

    pub fn auto(tolerance: f32) -> Self {
        Self {
            compression: CompressionRequest::Auto,
            tolerance,
        }
    }
}

/// Clip-wide compression parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionSettings {
    pub scheme: KeySchemeKind,
    /// Clip-wide key set for the shared non-uniform scheme: monotonic,
    /// starting at frame 0, ending at the last frame
    #[serde(default)]
    pub shared_keys: Option<Vec<u16>>,
    pub scale: ChannelSettings,
    pub rotation: ChannelSettings,
    pub translation: ChannelSettings,
    pub float: ChannelSettings,
    /// Linear-interpolation error threshold for unshared/spline key selection
    pub key_tolerance: f32,
}

impl CompressionSettings {
    /// Uniform scheme with auto selection under per-kind default tolerances
    pub fn uniform() -> Self {
        Self {
            scheme: KeySchemeKind::Uniform,
            shared_keys: None,
            scale: ChannelSettings::auto(0.001),
            rotation: ChannelSettings::auto(0.001),
            translation: ChannelSettings::auto(0.01),
            float: ChannelSettings::auto(0.001),
            key_tolerance: 0.001,
        }
    }

    /// Shared non-uniform scheme with an externally supplied key set
    pub fn shared(keys: Vec<u16>) -> Self {
        Self {
            scheme: KeySchemeKind::SharedNonUniform,
            shared_keys: Some(keys),
            ..Self::uniform()
        }
    }

    /// Unshared non-uniform scheme (per-channel keys in frame blocks)
    pub fn unshared(key_tolerance: f32) -> Self {
        Self {
            scheme: KeySchemeKind::UnsharedNonUniform,
            key_tolerance,
            ..Self::uniform()
        }
    }

    /// Settings for one channel kind
    pub fn for_kind(&self, kind: ChannelKind) -> &ChannelSettings {
        match kind {
            ChannelKind::Scale => &self.scale,
            ChannelKind::Rotation => &self.rotation,
            ChannelKind::Translation => &self.translation,
            ChannelKind::Float => &self.float,
        }
    }
}
