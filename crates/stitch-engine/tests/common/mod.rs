//! In-memory backend for driving the orchestrator without a media framework.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clipstitch_common::clock::ns_to_secs;
use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_engine::backend::{
    AudioDecodeStrategy, AudioEncodeQuery, AudioTrackConfig, EncodeCapability, MediaProbe,
    GridFrame, OutputContainer, StitchBackend, VideoEncodeQuery, VideoSample, VideoSource,
};
use clipstitch_model::{AudioCodec, ClipMetadata, EncodeParameters, MediaBlob, PcmBuffer};

/// Something observable the pipeline did to the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateContainer,
    AddVideoTrack,
    AddAudioTrack(AudioCodec),
    Start,
    WriteAudio { frames: usize },
    CloseAudio,
    WriteVideo {
        slot: i64,
        timestamp_ns: u64,
        duration_ns: u64,
    },
    CloseVideo,
    Finalize,
    Cancel,
    OpenSource(String),
    CloseSource(String),
}

/// Scripted behaviour for one clip, looked up by blob name.
#[derive(Debug, Clone)]
pub struct MockClip {
    pub metadata: Option<ClipMetadata>,
    pub video_tracks: usize,
    pub timestamps: Vec<f64>,
    /// Fail `next_sample` after this many samples.
    pub fail_after: Option<usize>,
}

impl MockClip {
    /// A clip of `secs` seconds at `fps`, starting at `start_secs`.
    pub fn video(width: u32, height: u32, secs: f64, fps: f64, start_secs: f64) -> Self {
        let count = (secs * fps).round() as usize;
        Self {
            metadata: Some(ClipMetadata {
                width: Some(width),
                height: Some(height),
                rotation: None,
                bitrate: Some(2_000_000),
                duration_secs: secs,
                video_tracks: 1,
            }),
            video_tracks: 1,
            timestamps: (0..count).map(|i| start_secs + i as f64 / fps).collect(),
            fail_after: None,
        }
    }

    /// An audio-only file: probes fine but has no video track.
    pub fn audio_only(secs: f64) -> Self {
        Self {
            metadata: Some(ClipMetadata {
                duration_secs: secs,
                ..Default::default()
            }),
            video_tracks: 0,
            timestamps: Vec::new(),
            fail_after: None,
        }
    }

    pub fn failing_after(mut self, samples: usize) -> Self {
        self.fail_after = Some(samples);
        self
    }
}

/// Shared call log and knobs.
#[derive(Debug, Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub open_sources: usize,
}

#[derive(Clone)]
pub struct MockBackend {
    pub clips: HashMap<String, MockClip>,
    pub can_encode_video: bool,
    pub audio_codecs: Vec<AudioCodec>,
    pub audio: Option<PcmBuffer>,
    pub output: Option<Vec<u8>>,
    pub fail_close_video: bool,
    pub state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
            can_encode_video: true,
            audio_codecs: vec![AudioCodec::Aac, AudioCodec::Mp3],
            audio: None,
            output: Some(b"ftypisom".to_vec()),
            fail_close_video: false,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Register a clip and return the blob that refers to it.
    pub fn add_clip(&mut self, name: &str, clip: MockClip) -> MediaBlob {
        self.clips.insert(name.to_string(), clip);
        MediaBlob::new(name.as_bytes().to_vec()).with_name(name)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn video_timestamps(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::WriteVideo { timestamp_ns, .. } => Some(ns_to_secs(timestamp_ns)),
                _ => None,
            })
            .collect()
    }

    pub fn open_sources(&self) -> usize {
        self.state.lock().unwrap().open_sources
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl MediaProbe for MockBackend {
    async fn probe(&self, clip: &MediaBlob) -> StitchResult<ClipMetadata> {
        self.clips
            .get(&clip.label())
            .and_then(|c| c.metadata.clone())
            .ok_or_else(|| StitchError::probe(format!("unreadable: {}", clip.label())))
    }
}

#[async_trait::async_trait]
impl EncodeCapability for MockBackend {
    async fn can_encode_video(&self, _query: &VideoEncodeQuery) -> bool {
        self.can_encode_video
    }

    async fn can_encode_audio(&self, query: &AudioEncodeQuery) -> bool {
        self.audio_codecs.contains(&query.codec)
    }
}

struct FixedAudio(Option<PcmBuffer>);

#[async_trait::async_trait]
impl AudioDecodeStrategy for FixedAudio {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn decode(&self, _audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>> {
        self.0
            .clone()
            .map(|pcm| vec![pcm])
            .ok_or_else(|| StitchError::audio_decode("no audio scripted"))
    }
}

#[async_trait::async_trait]
impl StitchBackend for MockBackend {
    type Frame = usize;
    type Source = MockSource;
    type Container = MockContainer;

    async fn open_video_source(
        &self,
        clip: &MediaBlob,
        _params: &EncodeParameters,
    ) -> StitchResult<MockSource> {
        let name = clip.label();
        let script = self
            .clips
            .get(&name)
            .cloned()
            .ok_or_else(|| StitchError::backend(format!("unknown clip {name}")))?;
        {
            let mut state = self.state.lock().unwrap();
            state.open_sources += 1;
            state.calls.push(Call::OpenSource(name.clone()));
        }
        Ok(MockSource {
            name,
            script,
            position: 0,
            closed: false,
            state: self.state.clone(),
        })
    }

    async fn create_container(&self, _params: &EncodeParameters) -> StitchResult<MockContainer> {
        self.record(Call::CreateContainer);
        Ok(MockContainer {
            output: self.output.clone(),
            fail_close_video: self.fail_close_video,
            audio_closed: false,
            video_closed: false,
            cancelled: false,
            state: self.state.clone(),
        })
    }

    fn audio_decoders(&self) -> Vec<Box<dyn AudioDecodeStrategy>> {
        vec![Box::new(FixedAudio(self.audio.clone()))]
    }
}

pub struct MockSource {
    name: String,
    script: MockClip,
    position: usize,
    closed: bool,
    state: Arc<Mutex<MockState>>,
}

#[async_trait::async_trait]
impl VideoSource for MockSource {
    type Frame = usize;

    fn video_track_count(&self) -> usize {
        self.script.video_tracks
    }

    async fn next_sample(&mut self) -> StitchResult<Option<VideoSample<usize>>> {
        if self.script.fail_after == Some(self.position) {
            return Err(StitchError::backend("corrupt sample"));
        }
        let Some(ts) = self.script.timestamps.get(self.position).copied() else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(VideoSample {
            timestamp_secs: ts,
            duration_secs: 0.0,
            frame: self.position,
        }))
    }

    async fn close(&mut self) -> StitchResult<()> {
        if !self.closed {
            self.closed = true;
            let mut state = self.state.lock().unwrap();
            state.open_sources -= 1;
            state.calls.push(Call::CloseSource(self.name.clone()));
        }
        Ok(())
    }
}

pub struct MockContainer {
    output: Option<Vec<u8>>,
    fail_close_video: bool,
    audio_closed: bool,
    video_closed: bool,
    cancelled: bool,
    state: Arc<Mutex<MockState>>,
}

impl MockContainer {
    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait::async_trait]
impl OutputContainer for MockContainer {
    type Frame = usize;

    fn add_video_track(&mut self, _params: &EncodeParameters) -> StitchResult<()> {
        self.record(Call::AddVideoTrack);
        Ok(())
    }

    fn add_audio_track(&mut self, config: &AudioTrackConfig) -> StitchResult<()> {
        self.record(Call::AddAudioTrack(config.codec));
        Ok(())
    }

    async fn start(&mut self) -> StitchResult<()> {
        self.record(Call::Start);
        Ok(())
    }

    async fn write_audio(&mut self, audio: &PcmBuffer) -> StitchResult<()> {
        self.record(Call::WriteAudio {
            frames: audio.frames(),
        });
        Ok(())
    }

    async fn close_audio(&mut self) -> StitchResult<()> {
        if !self.audio_closed {
            self.audio_closed = true;
            self.record(Call::CloseAudio);
        }
        Ok(())
    }

    async fn write_video(&mut self, frame: GridFrame<usize>) -> StitchResult<()> {
        self.record(Call::WriteVideo {
            slot: frame.slot,
            timestamp_ns: frame.timestamp_ns,
            duration_ns: frame.duration_ns,
        });
        Ok(())
    }

    async fn close_video(&mut self) -> StitchResult<()> {
        if self.fail_close_video {
            return Err(StitchError::encode("flush failed"));
        }
        if !self.video_closed {
            self.video_closed = true;
            self.record(Call::CloseVideo);
        }
        Ok(())
    }

    async fn finalize(&mut self) -> StitchResult<Option<Vec<u8>>> {
        self.record(Call::Finalize);
        Ok(self.output.take())
    }

    async fn cancel(&mut self) -> StitchResult<()> {
        if !self.cancelled {
            self.cancelled = true;
            self.record(Call::Cancel);
        }
        Ok(())
    }
}

/// Stereo PCM of constant amplitude.
pub fn tone(sample_rate: u32, secs: f64) -> PcmBuffer {
    let frames = (secs * sample_rate as f64).round() as usize;
    PcmBuffer::from_planar(sample_rate, vec![vec![0.5; frames], vec![0.5; frames]])
}
