//! Clip metadata via a prerolled `decodebin` pipeline.

use std::sync::{Arc, Mutex};

use clipstitch_common::clock::ns_to_secs;
use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{ClipMetadata, MediaBlob, Rotation};
use gst::prelude::*;
use gstreamer as gst;

use crate::pipeline::{
    discard_pad, element, escape_path, launch, set_state, shutdown, wait_for, BusOutcome,
    TempMedia, PIPELINE_TIMEOUT,
};
use crate::source::is_video_media;

#[derive(Debug, Default)]
struct PadSummary {
    video_tracks: usize,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default)]
struct TagSummary {
    rotation: Option<Rotation>,
    bitrate: Option<u64>,
}

/// Parse a GStreamer `image-orientation` tag value.
///
/// Flipped orientations are not representable and yield `None`.
pub fn parse_orientation(value: &str) -> Option<Rotation> {
    let degrees = value.strip_prefix("rotate-")?.parse::<i32>().ok()?;
    Some(Rotation::from_degrees(degrees))
}

/// Average bitrate from file size when the container carries no bitrate tag.
pub fn estimate_bitrate(size_bytes: usize, duration_secs: f64) -> Option<u64> {
    (duration_secs > 0.0 && size_bytes > 0)
        .then(|| (size_bytes as f64 * 8.0 / duration_secs).round() as u64)
}

/// Probe one clip. Blocks; run it off the async executor.
pub(crate) fn probe_blob(blob: &MediaBlob) -> StitchResult<ClipMetadata> {
    let file = TempMedia::materialize(blob, "probe")?;
    let pipeline = launch(
        "probe",
        &format!(
            "filesrc location=\"{}\" ! decodebin name=dec",
            escape_path(file.path())
        ),
    )?;

    let pads = Arc::new(Mutex::new(PadSummary::default()));
    let decodebin = element(&pipeline, "dec")?;
    let pipeline_weak = pipeline.downgrade();
    let pads_in_cb = pads.clone();
    decodebin.connect_pad_added(move |_dbin, pad| {
        let Some(pipeline) = pipeline_weak.upgrade() else {
            return;
        };
        let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
        if let Some(s) = caps.structure(0) {
            if is_video_media(s.name()) {
                if let Ok(mut summary) = pads_in_cb.lock() {
                    summary.video_tracks += 1;
                    if summary.width.is_none() {
                        summary.width = s.get::<i32>("width").ok().map(|w| w.max(0) as u32);
                        summary.height = s.get::<i32>("height").ok().map(|h| h.max(0) as u32);
                    }
                }
            }
        }

        // Every stream needs a sink or preroll never completes.
        discard_pad(&pipeline, pad);
    });

    set_state(&pipeline, gst::State::Paused)?;

    let mut tags = TagSummary::default();
    let outcome = wait_for(
        &pipeline,
        &[gst::MessageType::AsyncDone],
        PIPELINE_TIMEOUT,
        |msg| {
            if let gst::MessageView::Tag(tag) = msg.view() {
                collect_tags(&tag.tags(), &mut tags);
            }
        },
    );

    let duration_ns = pipeline
        .query_duration::<gst::ClockTime>()
        .map(|d| d.nseconds());
    shutdown(&pipeline, "probe");

    match outcome {
        BusOutcome::Reached(_) => {}
        BusOutcome::Failed(e) => return Err(StitchError::probe(e)),
        BusOutcome::TimedOut => return Err(StitchError::probe("timed out prerolling clip")),
    }

    let pads = pads
        .lock()
        .map_err(|_| StitchError::probe("probe state poisoned"))?;
    let duration_secs = duration_ns.map(ns_to_secs).unwrap_or(0.0);

    Ok(ClipMetadata {
        width: pads.width.filter(|w| *w > 0),
        height: pads.height.filter(|h| *h > 0),
        rotation: tags.rotation,
        bitrate: tags
            .bitrate
            .or_else(|| estimate_bitrate(blob.len(), duration_secs)),
        duration_secs,
        video_tracks: pads.video_tracks,
    })
}

fn collect_tags(list: &gst::TagList, tags: &mut TagSummary) {
    if tags.rotation.is_none() {
        if let Some(value) = list.generic("image-orientation") {
            if let Ok(orientation) = value.get::<String>() {
                tags.rotation = parse_orientation(&orientation);
            }
        }
    }
    for name in ["bitrate", "nominal-bitrate"] {
        if tags.bitrate.is_some() {
            break;
        }
        if let Some(value) = list.generic(name) {
            tags.bitrate = value.get::<u32>().ok().filter(|b| *b > 0).map(u64::from);
        }
    }
}
