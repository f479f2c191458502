//! Per-clip decode sessions.

use clipstitch_common::clock::ns_to_secs;
use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_engine::backend::{VideoSample, VideoSource};
use clipstitch_model::{EncodeParameters, MediaBlob};
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::pipeline::{
    app_sink, escape_path, launch, link_first_pad, pending_error, set_state, shutdown, TempMedia,
};

/// Raw video caps shared by decode sessions and the container input.
pub fn raw_video_caps(width: u32, height: u32, frame_rate: Option<u32>) -> String {
    let mut caps = format!(
        "video/x-raw,format=I420,width={width},height={height},pixel-aspect-ratio=1/1"
    );
    if let Some(fps) = frame_rate {
        caps.push_str(&format!(",framerate={fps}/1"));
    }
    caps
}

pub(crate) fn is_video_media(media_type: &str) -> bool {
    media_type.starts_with("video/")
}

pub(crate) fn decode_launch(location: &str, width: u32, height: u32) -> String {
    // The decoder is linked to `vqueue` by caps once its pads appear;
    // appsink holds at most one decoded frame.
    format!(
        "filesrc location=\"{location}\" ! decodebin name=dec \
         queue name=vqueue ! videoconvert ! videoscale add-borders=true ! {} ! \
         appsink name=sink sync=false max-buffers=1 drop=false",
        raw_video_caps(width, height, None)
    )
}

/// Decodes one clip, scaling frames to the output canvas.
pub struct GstVideoSource {
    label: String,
    video_tracks: usize,
    pipeline: Option<gst::Pipeline>,
    sink: Option<gst_app::AppSink>,
    last_pts_secs: Option<f64>,
    frame_interval_secs: f64,
    _file: Option<TempMedia>,
}

impl GstVideoSource {
    /// A session over a clip with no video track; yields nothing.
    pub(crate) fn empty(blob: &MediaBlob) -> Self {
        Self {
            label: blob.label(),
            video_tracks: 0,
            pipeline: None,
            sink: None,
            last_pts_secs: None,
            frame_interval_secs: 0.0,
            _file: None,
        }
    }

    pub(crate) fn open(
        blob: &MediaBlob,
        params: &EncodeParameters,
        video_tracks: usize,
    ) -> StitchResult<Self> {
        let file = TempMedia::materialize(blob, "clip")?;
        let pipeline = launch(
            "decode",
            &decode_launch(&escape_path(file.path()), params.width, params.height),
        )?;
        let sink = app_sink(&pipeline, "sink")?;
        let started = link_first_pad(&pipeline, "dec", "vqueue", "video/")
            .and_then(|_| set_state(&pipeline, gst::State::Playing));
        if let Err(e) = started {
            shutdown(&pipeline, "decode");
            return Err(e);
        }

        tracing::debug!(clip = %blob.label(), "Opened decode session");
        Ok(Self {
            label: blob.label(),
            video_tracks,
            pipeline: Some(pipeline),
            sink: Some(sink),
            last_pts_secs: None,
            frame_interval_secs: 1.0 / f64::from(params.frame_rate.max(1)),
            _file: Some(file),
        })
    }
}

#[async_trait::async_trait]
impl VideoSource for GstVideoSource {
    type Frame = gst::Buffer;

    fn video_track_count(&self) -> usize {
        self.video_tracks
    }

    async fn next_sample(&mut self) -> StitchResult<Option<VideoSample<gst::Buffer>>> {
        let (Some(pipeline), Some(sink)) = (self.pipeline.clone(), self.sink.clone()) else {
            return Ok(None);
        };

        let pulled = tokio::task::spawn_blocking(move || match sink.pull_sample() {
            Ok(sample) => Ok(sample.buffer_owned()),
            Err(_) if sink.is_eos() => Ok(None),
            Err(_) => Err(pending_error(&pipeline)
                .unwrap_or_else(|| "decoder stopped before end of stream".to_string())),
        })
        .await
        .map_err(|e| StitchError::backend(format!("Decode task failed: {e}")))?
        .map_err(StitchError::backend)?;

        let Some(buffer) = pulled else {
            tracing::debug!(clip = %self.label, "Decode session reached end of stream");
            return Ok(None);
        };

        // Buffers without a PTS continue one output frame after the last.
        let timestamp_secs = match buffer.pts() {
            Some(pts) => ns_to_secs(pts.nseconds()),
            None => self
                .last_pts_secs
                .map(|prev| prev + self.frame_interval_secs)
                .unwrap_or(0.0),
        };
        self.last_pts_secs = Some(timestamp_secs);
        let duration_secs = buffer
            .duration()
            .map(|d| ns_to_secs(d.nseconds()))
            .unwrap_or(self.frame_interval_secs);

        Ok(Some(VideoSample {
            timestamp_secs,
            duration_secs,
            frame: buffer,
        }))
    }

    async fn close(&mut self) -> StitchResult<()> {
        self.sink = None;
        if let Some(pipeline) = self.pipeline.take() {
            set_state(&pipeline, gst::State::Null)?;
            tracing::debug!(clip = %self.label, "Closed decode session");
        }
        self._file = None;
        Ok(())
    }
}

impl Drop for GstVideoSource {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            shutdown(&pipeline, "decode");
        }
    }
}
