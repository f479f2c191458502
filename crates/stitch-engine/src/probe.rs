//! Metadata probing and aggregation across clips.

use clipstitch_common::config::RotationPolicy;
use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{even_dimension, ClipMetadata, MediaBlob, ProbedMetadata, Rotation};

use crate::backend::MediaProbe;
use crate::settings::StitchSettings;

/// Probe every clip in order and aggregate the results.
///
/// A clip whose metadata cannot be read is logged and left out of the
/// aggregate; it does not fail the job.
pub async fn probe_clips<P>(
    probe: &P,
    clips: &[MediaBlob],
    settings: &StitchSettings,
) -> StitchResult<ProbedMetadata>
where
    P: MediaProbe + ?Sized,
{
    let mut results = Vec::with_capacity(clips.len());
    for (index, clip) in clips.iter().enumerate() {
        match probe.probe(clip).await {
            Ok(meta) => {
                tracing::debug!(
                    clip_index = index,
                    clip = %clip.label(),
                    width = ?meta.width,
                    height = ?meta.height,
                    rotation = ?meta.rotation,
                    bitrate = ?meta.bitrate,
                    duration_secs = meta.duration_secs,
                    video_tracks = meta.video_tracks,
                    "Probed clip"
                );
                results.push(Some(meta));
            }
            Err(e) => {
                tracing::warn!(
                    clip_index = index,
                    clip = %clip.label(),
                    error = %e,
                    "Failed to read clip metadata; excluding it from aggregation"
                );
                results.push(None);
            }
        }
    }

    aggregate_metadata(&results, settings)
}

/// Fold per-clip metadata into the output canvas description.
pub fn aggregate_metadata(
    results: &[Option<ClipMetadata>],
    settings: &StitchSettings,
) -> StitchResult<ProbedMetadata> {
    let mut max_width = 0u32;
    let mut max_height = 0u32;
    let mut max_bitrate = 0u64;
    let mut rotation: Option<Rotation> = None;
    let mut total_duration_secs = 0.0;
    let mut clip_durations_secs = Vec::with_capacity(results.len());

    for (index, result) in results.iter().enumerate() {
        let Some(meta) = result else {
            clip_durations_secs.push(None);
            continue;
        };

        if let Some((w, h)) = meta.dimensions() {
            max_width = max_width.max(w);
            max_height = max_height.max(h);
        }
        if let Some(bitrate) = meta.bitrate {
            max_bitrate = max_bitrate.max(bitrate);
        }

        match (rotation, meta.rotation) {
            (None, Some(r)) => rotation = Some(r),
            (Some(first), Some(r)) if first != r => match settings.rotation_policy {
                RotationPolicy::UseFirst => {
                    tracing::warn!(
                        clip_index = index,
                        first_degrees = first.degrees(),
                        clip_degrees = r.degrees(),
                        "Clip rotation differs from the first clip; output keeps the first rotation"
                    );
                }
                RotationPolicy::RejectMixed => {
                    return Err(StitchError::config(format!(
                        "Clip {index} is rotated {}° but earlier clips are rotated {}°",
                        r.degrees(),
                        first.degrees()
                    )));
                }
            },
            _ => {}
        }

        let duration = if meta.duration_secs.is_finite() {
            meta.duration_secs.max(0.0)
        } else {
            0.0
        };
        total_duration_secs += duration;
        clip_durations_secs.push(Some(duration));
    }

    let used_fallback_resolution = max_width == 0 || max_height == 0;
    if used_fallback_resolution {
        tracing::warn!(
            width = settings.fallback_width,
            height = settings.fallback_height,
            "No clip reported usable dimensions; using fallback resolution"
        );
        max_width = settings.fallback_width;
        max_height = settings.fallback_height;
    }

    Ok(ProbedMetadata {
        max_width: even_dimension(max_width),
        max_height: even_dimension(max_height),
        max_bitrate,
        rotation,
        total_duration_secs,
        clip_durations_secs,
        used_fallback_resolution,
    })
}
