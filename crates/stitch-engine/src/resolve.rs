//! Encode parameter resolution and the device capability gate.

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{CodecProfile, EncodeParameters, ProbedMetadata};

use crate::backend::{EncodeCapability, VideoEncodeQuery};
use crate::settings::StitchSettings;

/// Pick resolution, tier, and bitrate from the probe aggregate.
pub fn choose_parameters(meta: &ProbedMetadata, settings: &StitchSettings) -> EncodeParameters {
    let pixels = meta.max_width as u64 * meta.max_height as u64;
    let codec_profile = if pixels > settings.high_tier_pixel_threshold {
        CodecProfile::HIGH_RES
    } else {
        CodecProfile::LOW_RES
    };

    let bitrate = settings.default_bitrate.max(meta.max_bitrate).max(1);

    EncodeParameters {
        width: meta.max_width,
        height: meta.max_height,
        rotation: meta.rotation.unwrap_or_default(),
        codec_profile,
        bitrate,
        frame_rate: settings.frame_rate.fps(),
    }
}

/// Resolve parameters and confirm the device can encode them.
///
/// Fails before any encoder or container is constructed when the device
/// says no. Never retried.
pub async fn resolve_encode_parameters<C>(
    capability: &C,
    meta: &ProbedMetadata,
    settings: &StitchSettings,
) -> StitchResult<EncodeParameters>
where
    C: EncodeCapability + ?Sized,
{
    let params = choose_parameters(meta, settings);
    let query = VideoEncodeQuery::from_params(&params);

    if !capability.can_encode_video(&query).await {
        return Err(StitchError::unsupported_configuration(format!(
            "AVC {}x{} at {} bps ({})",
            params.width,
            params.height,
            params.bitrate,
            params.codec_profile.codec_string()
        )));
    }

    tracing::info!(
        width = params.width,
        height = params.height,
        bitrate = params.bitrate,
        codec = %params.codec_profile.codec_string(),
        frame_rate = params.frame_rate,
        rotation = params.rotation.degrees(),
        "Resolved encode parameters"
    );

    Ok(params)
}
