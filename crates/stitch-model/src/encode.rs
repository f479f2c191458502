//! Encode parameters and codec identifiers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::media::Rotation;

/// H.264 profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvcProfile {
    Baseline,
    Main,
    High,
}

impl AvcProfile {
    /// `profile_idc` as used in `avc1.PPCCLL` codec strings.
    pub fn idc(self) -> u8 {
        match self {
            Self::Baseline => 0x42,
            Self::Main => 0x4d,
            Self::High => 0x64,
        }
    }

    /// Profile name as understood by H.264 caps negotiation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Main => "main",
            Self::High => "high",
        }
    }
}

/// H.264 level, stored as `level_idc` (e.g. 40 for level 4.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AvcLevel(pub u8);

impl AvcLevel {
    pub const L3_1: Self = Self(31);
    pub const L4_0: Self = Self(40);
    pub const L4_2: Self = Self(42);
    pub const L5_1: Self = Self(51);
    pub const L5_2: Self = Self(52);

    /// Dotted form, e.g. "4.0".
    pub fn dotted(self) -> String {
        format!("{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Codec profile/level tier the encoder must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodecProfile {
    pub profile: AvcProfile,
    pub level: AvcLevel,
}

impl CodecProfile {
    /// Tier used for outputs up to the pixel threshold.
    pub const LOW_RES: Self = Self {
        profile: AvcProfile::High,
        level: AvcLevel::L4_0,
    };

    /// Tier used for outputs above the pixel threshold.
    pub const HIGH_RES: Self = Self {
        profile: AvcProfile::High,
        level: AvcLevel::L5_1,
    };

    /// RFC 6381 codec string, e.g. `avc1.640028`.
    pub fn codec_string(&self) -> String {
        format!("avc1.{:02x}00{:02x}", self.profile.idc(), self.level.0)
    }
}

/// Fully resolved output encode parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeParameters {
    /// Output width (even).
    pub width: u32,

    /// Output height (even).
    pub height: u32,

    /// Rotation written to the video track.
    pub rotation: Rotation,

    pub codec_profile: CodecProfile,

    /// Target video bitrate in bits/sec (always >= 1).
    pub bitrate: u64,

    /// Output frame rate.
    pub frame_rate: u32,
}

/// Audio codecs the output container may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCodec {
    Aac,
    Mp3,
}

impl AudioCodec {
    pub fn codec_string(self) -> &'static str {
        match self {
            Self::Aac => "mp4a.40.2",
            Self::Mp3 => "mp3",
        }
    }

    /// Target bitrate for the encoded audio track (bits/sec).
    pub fn default_bitrate(self) -> u32 {
        match self {
            Self::Aac => 192_000,
            Self::Mp3 => 192_000,
        }
    }
}

impl std::fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aac => write!(f, "aac"),
            Self::Mp3 => write!(f, "mp3"),
        }
    }
}

/// Error returned for an unrecognized audio codec name.
#[derive(Debug, thiserror::Error)]
#[error("Unknown audio codec: {0}. Use: aac, mp3")]
pub struct UnknownAudioCodec(pub String);

impl FromStr for AudioCodec {
    type Err = UnknownAudioCodec;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aac" | "mp4a" | "mp4a.40.2" => Ok(Self::Aac),
            "mp3" | "mpeg" => Ok(Self::Mp3),
            _ => Err(UnknownAudioCodec(s.to_string())),
        }
    }
}
