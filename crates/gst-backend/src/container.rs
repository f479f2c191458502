//! MP4 output container: x264 video plus an optional AAC/MP3 track.

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_engine::backend::{AudioTrackConfig, GridFrame, OutputContainer};
use clipstitch_model::{AudioCodec, EncodeParameters, PcmBuffer, Rotation};
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::capability::{audio_parser, find_audio_encoder};
use crate::pipeline::{
    app_src, escape_path, launch, set_state, shutdown, wait_for, BusOutcome, TempMedia,
    PIPELINE_TIMEOUT,
};
use crate::source::raw_video_caps;

/// Frames per audio buffer pushed into the encoder.
const AUDIO_CHUNK_FRAMES: usize = 4096;

/// Queued raw video bytes before `push-buffer` blocks.
const VIDEO_QUEUE_BYTES: u64 = 64 * 1024 * 1024;

/// Launch description for the muxing pipeline.
pub fn container_launch(
    video: &EncodeParameters,
    audio: Option<(&AudioTrackConfig, &str)>,
    location: &str,
) -> String {
    let kbps = video.bitrate.div_ceil(1000).clamp(1, 2_048_000);
    let keyint = video.frame_rate.saturating_mul(2).max(2);
    let mut launch = format!(
        "appsrc name=vsrc format=time block=true max-bytes={VIDEO_QUEUE_BYTES} caps=\"{caps}\" ! \
         queue ! videoconvert ! \
         x264enc bitrate={kbps} speed-preset=medium key-int-max={keyint} ! \
         video/x-h264,profile={profile},level=(string){level} ! h264parse ! mux. \
         mp4mux name=mux faststart=true ! filesink location=\"{location}\"",
        caps = raw_video_caps(video.width, video.height, Some(video.frame_rate)),
        profile = video.codec_profile.profile.as_str(),
        level = video.codec_profile.level.dotted(),
    );

    if let Some((config, encoder)) = audio {
        launch.push_str(&format!(
            " appsrc name=asrc format=time caps=\"audio/x-raw,format=F32LE,layout=interleaved,rate={},channels={}\" ! \
             queue ! audioconvert ! audioresample ! {} ! {} ! mux.",
            config.sample_rate,
            config.channels,
            audio_encoder_fragment(config.codec, encoder, config.bitrate),
            audio_parser(config.codec),
        ));
    }
    launch
}

fn audio_encoder_fragment(codec: AudioCodec, encoder: &str, bitrate: u32) -> String {
    match codec {
        AudioCodec::Aac => format!("{encoder} bitrate={bitrate}"),
        AudioCodec::Mp3 => format!(
            "{encoder} target=bitrate cbr=true bitrate={}",
            bitrate.div_ceil(1000)
        ),
    }
}

/// `image-orientation` tag value for the output track.
pub fn orientation_tag(rotation: Rotation) -> &'static str {
    match rotation {
        Rotation::None => "rotate-0",
        Rotation::Cw90 => "rotate-90",
        Rotation::Cw180 => "rotate-180",
        Rotation::Cw270 => "rotate-270",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Configuring,
    Running,
    Finished,
}

/// Muxes into a temp file and hands back its bytes on finalize.
pub struct GstContainer {
    video: Option<EncodeParameters>,
    audio: Option<(AudioTrackConfig, &'static str)>,
    pipeline: Option<gst::Pipeline>,
    video_src: Option<gst_app::AppSrc>,
    audio_src: Option<gst_app::AppSrc>,
    audio_closed: bool,
    video_closed: bool,
    state: State,
    output: TempMedia,
}

impl GstContainer {
    pub(crate) fn new() -> Self {
        Self {
            video: None,
            audio: None,
            pipeline: None,
            video_src: None,
            audio_src: None,
            audio_closed: false,
            video_closed: false,
            state: State::Configuring,
            output: TempMedia::reserve("output", "mp4"),
        }
    }

    fn running_pipeline(&self) -> StitchResult<&gst::Pipeline> {
        match (&self.pipeline, self.state) {
            (Some(pipeline), State::Running) => Ok(pipeline),
            _ => Err(StitchError::mux("Container is not running")),
        }
    }

    /// Push one buffer; blocks while the video queue is full.
    async fn push(src: gst_app::AppSrc, buffer: gst::Buffer) -> StitchResult<()> {
        tokio::task::spawn_blocking(move || src.push_buffer(buffer))
            .await
            .map_err(|e| StitchError::backend(format!("Push task failed: {e}")))?
            .map(|_| ())
            .map_err(|e| StitchError::encode(format!("Encoder rejected buffer: {e:?}")))
    }

    fn end_of_stream(src: &gst_app::AppSrc) -> StitchResult<()> {
        src.end_of_stream()
            .map(|_| ())
            .map_err(|e| StitchError::mux(format!("Failed to end stream: {e:?}")))
    }
}

#[async_trait::async_trait]
impl OutputContainer for GstContainer {
    type Frame = gst::Buffer;

    fn add_video_track(&mut self, params: &EncodeParameters) -> StitchResult<()> {
        if self.state != State::Configuring {
            return Err(StitchError::mux("Tracks must be added before start"));
        }
        self.video = Some(params.clone());
        Ok(())
    }

    fn add_audio_track(&mut self, config: &AudioTrackConfig) -> StitchResult<()> {
        if self.state != State::Configuring {
            return Err(StitchError::mux("Tracks must be added before start"));
        }
        let encoder = find_audio_encoder(config.codec).ok_or_else(|| {
            StitchError::unsupported(format!("No {} encoder installed", config.codec))
        })?;
        self.audio = Some((*config, encoder));
        Ok(())
    }

    async fn start(&mut self) -> StitchResult<()> {
        let video = self
            .video
            .clone()
            .ok_or_else(|| StitchError::mux("No video track registered"))?;
        let description = container_launch(
            &video,
            self.audio.as_ref().map(|(c, e)| (c, *e)),
            &escape_path(self.output.path()),
        );
        let pipeline = launch("mux", &description)?;
        let video_src = app_src(&pipeline, "vsrc")?;
        let audio_src = match self.audio {
            Some(_) => Some(app_src(&pipeline, "asrc")?),
            None => {
                self.audio_closed = true;
                None
            }
        };

        if video.rotation != Rotation::None {
            let mut tags = gst::TagList::new();
            if let Some(tags) = tags.get_mut() {
                tags.add_generic(
                    "image-orientation",
                    orientation_tag(video.rotation),
                    gst::TagMergeMode::Replace,
                )
                .map_err(|e| StitchError::mux(format!("Invalid orientation tag: {e}")))?;
            }
            if !video_src.send_event(gst::event::Tag::new(tags)) {
                tracing::warn!(
                    degrees = video.rotation.degrees(),
                    "Failed to tag output rotation"
                );
            }
        }

        set_state(&pipeline, gst::State::Playing)?;
        tracing::info!(
            output = %self.output.path().display(),
            audio = self.audio.is_some(),
            "Output container started"
        );

        self.pipeline = Some(pipeline);
        self.video_src = Some(video_src);
        self.audio_src = audio_src;
        self.state = State::Running;
        Ok(())
    }

    async fn write_audio(&mut self, audio: &PcmBuffer) -> StitchResult<()> {
        self.running_pipeline()?;
        let src = self
            .audio_src
            .clone()
            .ok_or_else(|| StitchError::mux("No audio track registered"))?;
        if self.audio_closed {
            return Err(StitchError::mux("Audio track already closed"));
        }

        let rate = u64::from(audio.sample_rate().max(1));
        let mut interleaved = Vec::with_capacity(AUDIO_CHUNK_FRAMES * audio.channel_count());
        let mut start = 0;
        while start < audio.frames() {
            let len = AUDIO_CHUNK_FRAMES.min(audio.frames() - start);
            interleaved.clear();
            audio.interleave_into(start, len, &mut interleaved);

            let bytes: Vec<u8> = interleaved.iter().flat_map(|s| s.to_le_bytes()).collect();
            let mut buffer = gst::Buffer::from_mut_slice(bytes);
            if let Some(b) = buffer.get_mut() {
                let pts_ns = start as u64 * 1_000_000_000 / rate;
                let end_ns = (start + len) as u64 * 1_000_000_000 / rate;
                b.set_pts(gst::ClockTime::from_nseconds(pts_ns));
                b.set_duration(gst::ClockTime::from_nseconds(end_ns - pts_ns));
            }
            Self::push(src.clone(), buffer).await?;
            start += len;
        }

        tracing::debug!(frames = audio.frames(), "Audio pushed to encoder");
        Ok(())
    }

    async fn close_audio(&mut self) -> StitchResult<()> {
        if self.audio_closed {
            return Ok(());
        }
        self.audio_closed = true;
        if let Some(src) = &self.audio_src {
            Self::end_of_stream(src)?;
        }
        Ok(())
    }

    async fn write_video(&mut self, frame: GridFrame<gst::Buffer>) -> StitchResult<()> {
        self.running_pipeline()?;
        if self.video_closed {
            return Err(StitchError::mux("Video track already closed"));
        }
        let src = self
            .video_src
            .clone()
            .ok_or_else(|| StitchError::mux("No video track registered"))?;

        let mut buffer = frame.frame;
        {
            let b = buffer.make_mut();
            b.set_pts(gst::ClockTime::from_nseconds(frame.timestamp_ns));
            b.set_duration(gst::ClockTime::from_nseconds(frame.duration_ns));
            b.set_dts(gst::ClockTime::NONE);
        }
        Self::push(src, buffer).await
    }

    async fn close_video(&mut self) -> StitchResult<()> {
        if self.video_closed {
            return Ok(());
        }
        self.video_closed = true;
        if let Some(src) = &self.video_src {
            Self::end_of_stream(src)?;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> StitchResult<Option<Vec<u8>>> {
        let pipeline = self.running_pipeline()?.clone();
        self.close_audio().await?;
        self.close_video().await?;

        let outcome = tokio::task::spawn_blocking(move || {
            let outcome = wait_for(&pipeline, &[gst::MessageType::Eos], PIPELINE_TIMEOUT, |_| {});
            shutdown(&pipeline, "mux");
            outcome
        })
        .await
        .map_err(|e| StitchError::backend(format!("Finalize task failed: {e}")))?;

        self.state = State::Finished;
        self.pipeline = None;
        self.video_src = None;
        self.audio_src = None;

        match outcome {
            BusOutcome::Reached(_) => {}
            BusOutcome::Failed(e) => return Err(StitchError::mux(e)),
            BusOutcome::TimedOut => return Err(StitchError::mux("Timed out draining muxer")),
        }

        match tokio::fs::read(self.output.path()).await {
            Ok(bytes) => {
                tracing::info!(bytes = bytes.len(), "Output container finalized");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel(&mut self) -> StitchResult<()> {
        if self.state == State::Finished {
            return Ok(());
        }
        self.state = State::Finished;
        self.video_src = None;
        self.audio_src = None;
        if let Some(pipeline) = self.pipeline.take() {
            set_state(&pipeline, gst::State::Null)?;
            tracing::debug!("Output container cancelled");
        }
        Ok(())
    }
}

impl Drop for GstContainer {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            shutdown(&pipeline, "mux");
        }
    }
}
