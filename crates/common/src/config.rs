//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StitchError, StitchResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default stitching parameters.
    #[serde(default)]
    pub stitch: StitchDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default stitching parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchDefaults {
    /// Output frame rate every clip is re-timed onto.
    pub frame_rate: u32,

    /// Target video bitrate (bits/sec) used when sources report less.
    pub default_bitrate: u64,

    /// Output size used when no clip yields usable dimensions.
    pub fallback_width: u32,
    pub fallback_height: u32,

    /// Pixel count above which the high-resolution codec tier is selected.
    pub high_tier_pixel_threshold: u64,

    /// Audio codecs to negotiate, in preference order ("aac", "mp3").
    pub audio_codecs: Vec<String>,

    /// Shortest audio track that will be prepared (seconds).
    pub min_audio_duration_secs: f64,

    /// How clips with differing rotation metadata are handled.
    pub rotation_policy: RotationPolicy,
}

/// Handling of clips whose rotation disagrees with the first clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Keep the first clip's rotation for the whole output and warn.
    #[default]
    UseFirst,
    /// Refuse to stitch clips with mixed rotation.
    RejectMixed,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipstitch_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for StitchDefaults {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            default_bitrate: 8_000_000,
            fallback_width: 1280,
            fallback_height: 720,
            high_tier_pixel_threshold: 1920 * 1080,
            audio_codecs: vec!["aac".to_string(), "mp3".to_string()],
            min_audio_duration_secs: 1.0,
            rotation_policy: RotationPolicy::UseFirst,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load `$XDG_CONFIG_HOME/clipstitch/config.json`, or defaults when it is
    /// missing or unusable.
    pub fn load() -> Self {
        let path = config_file_path();
        match Self::load_from(&path) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                Self::default()
            }
        }
    }

    /// Read a config file. A missing file is `Ok(None)`.
    pub fn load_from(path: &Path) -> StitchResult<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StitchError::config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self) -> StitchResult<()> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, path: &Path) -> StitchResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipstitch").join("config.json")
}
