//! Device/platform boundary.
//!
//! The stitching pipeline is written against these traits. A media
//! framework backend (see `clipstitch-gst`) implements them for real
//! decoding, encoding, and muxing; tests implement them in memory.

use clipstitch_common::error::StitchResult;
use clipstitch_model::{AudioCodec, ClipMetadata, CodecProfile, EncodeParameters, MediaBlob, PcmBuffer};

/// Reads per-clip container metadata without fully decoding.
#[async_trait::async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, clip: &MediaBlob) -> StitchResult<ClipMetadata>;
}

/// A video encode configuration to test against the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoEncodeQuery {
    pub width: u32,
    pub height: u32,
    pub bitrate: u64,
    pub profile: CodecProfile,
    pub frame_rate: u32,
}

impl VideoEncodeQuery {
    pub fn from_params(params: &EncodeParameters) -> Self {
        Self {
            width: params.width,
            height: params.height,
            bitrate: params.bitrate,
            profile: params.codec_profile,
            frame_rate: params.frame_rate,
        }
    }
}

/// An audio encode configuration to test against the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioEncodeQuery {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: usize,
    pub bitrate: u32,
}

/// Device encode-capability predicates.
#[async_trait::async_trait]
pub trait EncodeCapability: Send + Sync {
    /// Can this device encode AVC at the given size, bitrate, and profile?
    async fn can_encode_video(&self, query: &VideoEncodeQuery) -> bool;

    /// Can this device encode the given audio configuration?
    async fn can_encode_audio(&self, query: &AudioEncodeQuery) -> bool;
}

/// One way of turning an audio blob into PCM chunks.
#[async_trait::async_trait]
pub trait AudioDecodeStrategy: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &str;

    /// Decode the whole blob into one or more PCM chunks.
    async fn decode(&self, audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>>;
}

/// A decoded video frame with its presentation timing, in seconds.
#[derive(Debug)]
pub struct VideoSample<F> {
    pub timestamp_secs: f64,
    pub duration_secs: f64,
    pub frame: F,
}

/// A frame placed on the output grid, timed in whole nanoseconds.
#[derive(Debug)]
pub struct GridFrame<F> {
    pub slot: i64,
    pub timestamp_ns: u64,
    pub duration_ns: u64,
    pub frame: F,
}

/// A decode session over one clip.
#[async_trait::async_trait]
pub trait VideoSource: Send {
    type Frame: Send;

    /// Number of video tracks in the clip.
    fn video_track_count(&self) -> usize;

    /// Next decoded sample in presentation order, or `None` at end of stream.
    async fn next_sample(&mut self) -> StitchResult<Option<VideoSample<Self::Frame>>>;

    /// Release the session. Calling it again is a no-op.
    async fn close(&mut self) -> StitchResult<()>;
}

/// Audio track layout registered on the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrackConfig {
    pub codec: AudioCodec,
    pub sample_rate: u32,
    pub channels: usize,
    pub bitrate: u32,
}

/// The output container and its encoders. Not safe for concurrent writes.
#[async_trait::async_trait]
pub trait OutputContainer: Send {
    type Frame: Send;

    /// Register the video track. Must precede `start`.
    fn add_video_track(&mut self, params: &EncodeParameters) -> StitchResult<()>;

    /// Register the audio track. Must precede `start`.
    fn add_audio_track(&mut self, config: &AudioTrackConfig) -> StitchResult<()>;

    /// Open the container for writing.
    async fn start(&mut self) -> StitchResult<()>;

    /// Encode and write PCM to the audio track.
    async fn write_audio(&mut self, audio: &PcmBuffer) -> StitchResult<()>;

    /// Close the audio track. Calling it again is a no-op.
    async fn close_audio(&mut self) -> StitchResult<()>;

    /// Encode and write one frame at its grid timestamp.
    async fn write_video(&mut self, frame: GridFrame<Self::Frame>) -> StitchResult<()>;

    /// Signal end of stream on the video track and flush the encoder.
    /// Calling it again is a no-op.
    async fn close_video(&mut self) -> StitchResult<()>;

    /// Finish the container and hand back its bytes.
    async fn finalize(&mut self) -> StitchResult<Option<Vec<u8>>>;

    /// Abandon a started container. Calling it again is a no-op.
    async fn cancel(&mut self) -> StitchResult<()>;
}

/// Everything the orchestrator needs from a platform.
#[async_trait::async_trait]
pub trait StitchBackend: MediaProbe + EncodeCapability {
    type Frame: Send;
    type Source: VideoSource<Frame = Self::Frame>;
    type Container: OutputContainer<Frame = Self::Frame>;

    /// Open a decode session whose frames are scaled to the output size.
    async fn open_video_source(
        &self,
        clip: &MediaBlob,
        params: &EncodeParameters,
    ) -> StitchResult<Self::Source>;

    /// Construct a fresh container for one invocation.
    async fn create_container(&self, params: &EncodeParameters) -> StitchResult<Self::Container>;

    /// Audio decoders in preference order.
    fn audio_decoders(&self) -> Vec<Box<dyn AudioDecodeStrategy>>;
}
