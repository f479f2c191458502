//! Pre-flight device support check.
//!
//! Runs the prober and the parameter resolver only, so a caller can ask
//! whether stitching is possible before offering it. No container or
//! decode session is opened.

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{EncodeParameters, MediaBlob, ProbedMetadata};
use serde::Serialize;

use crate::backend::{EncodeCapability, MediaProbe};
use crate::probe::probe_clips;
use crate::resolve::resolve_encode_parameters;
use crate::settings::StitchSettings;

/// Result of a successful pre-flight check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreflightReport {
    pub metadata: ProbedMetadata,
    pub params: EncodeParameters,
}

/// Check that the device can encode the output `clips` would produce.
pub async fn check_device_support<P>(
    backend: &P,
    clips: &[MediaBlob],
    settings: &StitchSettings,
) -> StitchResult<PreflightReport>
where
    P: MediaProbe + EncodeCapability + ?Sized,
{
    if clips.is_empty() {
        return Err(StitchError::NoClips);
    }

    let metadata = probe_clips(backend, clips, settings).await?;
    let params = resolve_encode_parameters(backend, &metadata, settings).await?;

    tracing::info!(
        clips = clips.len(),
        probed = metadata.probed_clips(),
        codec = %params.codec_profile.codec_string(),
        "Device supports the stitched output"
    );

    Ok(PreflightReport { metadata, params })
}
