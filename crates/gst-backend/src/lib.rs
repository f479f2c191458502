//! ClipStitch GStreamer Backend
//!
//! Implements the engine's backend traits on top of GStreamer:
//!
//! - **Probe:** preroll `decodebin` and read caps, duration, and tags
//! - **Capability:** installed encoders plus H.264 level limits
//! - **Decode:** `decodebin ! videoscale ! appsink`, one frame in flight
//! - **Encode/Mux:** `appsrc ! x264enc ! mp4mux`, optional AAC/MP3 branch
//! - **Audio:** `decodebin` to interleaved float, with a WAV fallback
//!
//! Blobs are written to temp files for the file-based elements and removed
//! when the owning pipeline is done with them.

pub mod audio;
pub mod capability;
pub mod container;
mod pipeline;
pub mod probe;
pub mod source;

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_engine::audio::decode::WavDecodeStrategy;
use clipstitch_engine::backend::{
    AudioDecodeStrategy, AudioEncodeQuery, EncodeCapability, MediaProbe, StitchBackend,
    VideoEncodeQuery,
};
use clipstitch_model::{ClipMetadata, EncodeParameters, MediaBlob};
use gstreamer as gst;

pub use audio::GstAudioDecodeStrategy;
pub use container::GstContainer;
pub use source::GstVideoSource;

/// GStreamer-backed implementation of [`StitchBackend`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GstBackend;

impl GstBackend {
    /// Initialize GStreamer and return the backend.
    pub fn new() -> StitchResult<Self> {
        pipeline::init_gstreamer()?;
        Ok(Self)
    }
}

#[async_trait::async_trait]
impl MediaProbe for GstBackend {
    async fn probe(&self, clip: &MediaBlob) -> StitchResult<ClipMetadata> {
        let clip = clip.clone();
        tokio::task::spawn_blocking(move || probe::probe_blob(&clip))
            .await
            .map_err(|e| StitchError::backend(format!("Probe task failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl EncodeCapability for GstBackend {
    async fn can_encode_video(&self, query: &VideoEncodeQuery) -> bool {
        capability::can_encode_video(query)
    }

    async fn can_encode_audio(&self, query: &AudioEncodeQuery) -> bool {
        capability::can_encode_audio(query)
    }
}

#[async_trait::async_trait]
impl StitchBackend for GstBackend {
    type Frame = gst::Buffer;
    type Source = GstVideoSource;
    type Container = GstContainer;

    async fn open_video_source(
        &self,
        clip: &MediaBlob,
        params: &EncodeParameters,
    ) -> StitchResult<GstVideoSource> {
        // An unprobeable clip still gets a decode attempt; it fails there if unreadable.
        let video_tracks = match self.probe(clip).await {
            Ok(meta) => meta.video_tracks,
            Err(e) => {
                tracing::debug!(clip = %clip.label(), error = %e, "Probe failed; decoding anyway");
                1
            }
        };
        if video_tracks == 0 {
            return Ok(GstVideoSource::empty(clip));
        }

        let clip = clip.clone();
        let params = params.clone();
        tokio::task::spawn_blocking(move || GstVideoSource::open(&clip, &params, video_tracks))
            .await
            .map_err(|e| StitchError::backend(format!("Open task failed: {e}")))?
    }

    async fn create_container(&self, _params: &EncodeParameters) -> StitchResult<GstContainer> {
        pipeline::init_gstreamer()?;
        Ok(GstContainer::new())
    }

    fn audio_decoders(&self) -> Vec<Box<dyn AudioDecodeStrategy>> {
        vec![
            Box::new(GstAudioDecodeStrategy),
            Box::new(WavDecodeStrategy),
        ]
    }
}
