//! Per-invocation stitch settings derived from configuration.

use clipstitch_common::clock::FrameRate;
use clipstitch_common::config::{RotationPolicy, StitchDefaults};
use clipstitch_model::AudioCodec;

/// Settings consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct StitchSettings {
    pub frame_rate: FrameRate,
    pub default_bitrate: u64,
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub high_tier_pixel_threshold: u64,
    pub audio_codecs: Vec<AudioCodec>,
    pub min_audio_duration_secs: f64,
    pub rotation_policy: RotationPolicy,
}

impl StitchSettings {
    /// Build settings from configuration, skipping unknown audio codec names.
    pub fn from_defaults(defaults: &StitchDefaults) -> Self {
        let audio_codecs = defaults
            .audio_codecs
            .iter()
            .filter_map(|name| match name.parse::<AudioCodec>() {
                Ok(codec) => Some(codec),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring configured audio codec");
                    None
                }
            })
            .collect();

        Self {
            frame_rate: FrameRate::new(defaults.frame_rate),
            default_bitrate: defaults.default_bitrate,
            fallback_width: defaults.fallback_width,
            fallback_height: defaults.fallback_height,
            high_tier_pixel_threshold: defaults.high_tier_pixel_threshold,
            audio_codecs,
            min_audio_duration_secs: defaults.min_audio_duration_secs.max(0.0),
            rotation_policy: defaults.rotation_policy,
        }
    }
}

impl Default for StitchSettings {
    fn default() -> Self {
        Self::from_defaults(&StitchDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = StitchSettings::default();
        assert_eq!(settings.frame_rate.fps(), 60);
        assert_eq!(settings.audio_codecs, vec![AudioCodec::Aac, AudioCodec::Mp3]);
        assert_eq!(settings.rotation_policy, RotationPolicy::UseFirst);
    }

    #[test]
    fn test_unknown_codecs_are_skipped() {
        let defaults = StitchDefaults {
            audio_codecs: vec!["opus".to_string(), "mp3".to_string()],
            ..Default::default()
        };
        let settings = StitchSettings::from_defaults(&defaults);
        assert_eq!(settings.audio_codecs, vec![AudioCodec::Mp3]);
    }
}
