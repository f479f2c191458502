//! Encode capability checks against installed plugins and H.264 level limits.

use clipstitch_engine::backend::{AudioEncodeQuery, VideoEncodeQuery};
use clipstitch_model::{AudioCodec, AvcLevel, AvcProfile};
use gstreamer as gst;

use crate::pipeline::init_gstreamer;

/// Elements every video output needs.
pub(crate) const VIDEO_ELEMENTS: &[&str] = &["appsrc", "videoconvert", "x264enc", "h264parse", "mp4mux"];

/// Per-level limits from H.264 Table A-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelLimits {
    /// Max frame size in 16x16 macroblocks.
    pub max_frame_macroblocks: u64,
    /// Max video bitrate for Baseline/Main, in kbit/s.
    pub max_bitrate_kbps: u64,
}

pub fn level_limits(level: AvcLevel) -> Option<LevelLimits> {
    let (max_frame_macroblocks, max_bitrate_kbps) = match level.0 {
        31 => (3_600, 14_000),
        32 => (5_120, 20_000),
        40 => (8_192, 20_000),
        41 => (8_192, 50_000),
        42 => (8_704, 50_000),
        50 => (22_080, 135_000),
        51 | 52 => (36_864, 240_000),
        _ => return None,
    };
    Some(LevelLimits {
        max_frame_macroblocks,
        max_bitrate_kbps,
    })
}

/// High profile allows 1.25x the Baseline/Main bitrate.
fn profile_bitrate_factor(profile: AvcProfile) -> f64 {
    match profile {
        AvcProfile::High => 1.25,
        AvcProfile::Baseline | AvcProfile::Main => 1.0,
    }
}

pub fn frame_macroblocks(width: u32, height: u32) -> u64 {
    u64::from(width.div_ceil(16)) * u64::from(height.div_ceil(16))
}

/// Whether `query` fits inside its declared profile and level.
pub fn fits_level(query: &VideoEncodeQuery) -> bool {
    let Some(limits) = level_limits(query.profile.level) else {
        return false;
    };
    let max_bps =
        limits.max_bitrate_kbps as f64 * 1000.0 * profile_bitrate_factor(query.profile.profile);

    query.width > 0
        && query.height > 0
        && query.width % 2 == 0
        && query.height % 2 == 0
        && frame_macroblocks(query.width, query.height) <= limits.max_frame_macroblocks
        && (query.bitrate as f64) <= max_bps
}

/// Encoders able to produce `codec`, in preference order.
pub fn audio_encoder_candidates(codec: AudioCodec) -> &'static [&'static str] {
    match codec {
        AudioCodec::Aac => &["avenc_aac", "fdkaacenc", "voaacenc"],
        AudioCodec::Mp3 => &["lamemp3enc"],
    }
}

/// Parser placed between the audio encoder and the muxer.
pub fn audio_parser(codec: AudioCodec) -> &'static str {
    match codec {
        AudioCodec::Aac => "aacparse",
        AudioCodec::Mp3 => "mpegaudioparse",
    }
}

fn max_channels(codec: AudioCodec) -> usize {
    match codec {
        AudioCodec::Aac => 8,
        AudioCodec::Mp3 => 2,
    }
}

pub(crate) fn element_available(name: &str) -> bool {
    gst::ElementFactory::find(name).is_some()
}

/// First installed encoder for `codec`.
pub(crate) fn find_audio_encoder(codec: AudioCodec) -> Option<&'static str> {
    audio_encoder_candidates(codec)
        .iter()
        .copied()
        .find(|name| element_available(name))
}

/// Installed state of every element the output pipeline can use.
pub fn element_report() -> Vec<(&'static str, bool)> {
    if init_gstreamer().is_err() {
        return Vec::new();
    }
    VIDEO_ELEMENTS
        .iter()
        .chain(audio_encoder_candidates(AudioCodec::Aac))
        .chain(audio_encoder_candidates(AudioCodec::Mp3))
        .map(|name| (*name, element_available(name)))
        .collect()
}

pub(crate) fn can_encode_video(query: &VideoEncodeQuery) -> bool {
    if let Err(e) = init_gstreamer() {
        tracing::warn!(error = %e, "GStreamer unavailable");
        return false;
    }

    if let Some(missing) = VIDEO_ELEMENTS.iter().find(|name| !element_available(name)) {
        tracing::warn!(element = missing, "Missing GStreamer element for video output");
        return false;
    }

    let fits = fits_level(query);
    if !fits {
        tracing::debug!(
            width = query.width,
            height = query.height,
            bitrate = query.bitrate,
            level = %query.profile.level.dotted(),
            "Configuration exceeds H.264 level limits"
        );
    }
    fits
}

pub(crate) fn can_encode_audio(query: &AudioEncodeQuery) -> bool {
    if init_gstreamer().is_err() {
        return false;
    }
    if query.channels == 0 || query.channels > max_channels(query.codec) || query.sample_rate == 0 {
        return false;
    }
    let Some(encoder) = find_audio_encoder(query.codec) else {
        tracing::debug!(codec = %query.codec, "No installed encoder");
        return false;
    };
    tracing::trace!(codec = %query.codec, encoder, "Audio encoder available");
    element_available(audio_parser(query.codec))
}
