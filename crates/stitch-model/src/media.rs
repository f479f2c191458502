//! Source clips and probed metadata.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An opaque binary media blob (a video clip or an audio source).
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone)]
pub struct MediaBlob {
    data: Arc<[u8]>,
    name: Option<String>,
}

impl MediaBlob {
    /// Wrap raw bytes.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            name: None,
        }
    }

    /// Attach a human-readable label used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a blob from disk, labelled with its file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(bytes).with_name(name))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Label for logs; falls back to the byte size.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("<{} bytes>", self.data.len()),
        }
    }
}

impl std::fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaBlob")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Display rotation carried in container metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[serde(rename = "0")]
    None,
    #[serde(rename = "90")]
    Cw90,
    #[serde(rename = "180")]
    Cw180,
    #[serde(rename = "270")]
    Cw270,
}

impl Rotation {
    /// Normalize an arbitrary degree value to the nearest quarter turn.
    pub fn from_degrees(degrees: i32) -> Self {
        let quarter = ((degrees as f64 / 90.0).round() as i32).rem_euclid(4);
        match quarter {
            1 => Self::Cw90,
            2 => Self::Cw180,
            3 => Self::Cw270,
            _ => Self::None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::None
    }
}

/// Metadata read from a single clip's container without full decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotation: Option<Rotation>,

    /// Overall bitrate in bits/sec, if known.
    pub bitrate: Option<u64>,

    /// Duration in seconds.
    pub duration_secs: f64,

    /// Number of video tracks in the container.
    pub video_tracks: usize,
}

impl ClipMetadata {
    /// Dimensions, when both are present and non-zero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

/// Aggregated probe result across all clips of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbedMetadata {
    /// Largest source width, rounded up to even.
    pub max_width: u32,

    /// Largest source height, rounded up to even.
    pub max_height: u32,

    /// Largest observed bitrate (0 when none reported).
    pub max_bitrate: u64,

    /// First non-null rotation seen.
    pub rotation: Option<Rotation>,

    /// Sum of readable clip durations in seconds.
    pub total_duration_secs: f64,

    /// Per-clip durations in list order; `None` for clips that failed to probe.
    pub clip_durations_secs: Vec<Option<f64>>,

    /// Whether the fallback resolution was used.
    pub used_fallback_resolution: bool,
}

impl ProbedMetadata {
    /// Number of clips that were probed successfully.
    pub fn probed_clips(&self) -> usize {
        self.clip_durations_secs.iter().flatten().count()
    }
}

/// Round a dimension up to the next even value (codec constraint).
pub fn even_dimension(value: u32) -> u32 {
    value.saturating_add(value & 1).max(2)
}
