//! The stitch orchestrator.
//!
//! One invocation owns one output container. Audio is prepared and written
//! in full before the first video sample; clips are then decoded strictly
//! in order and every sample is re-timed onto the output frame grid.

use clipstitch_common::clock::ProgressThrottle;
use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{
    AudioProcessingOptions, DecodedAudio, EncodeParameters, MediaBlob, ProbedMetadata,
    StitchOutput, StitchProgress,
};

use crate::audio::{AudioMilestone, AudioPreparer};
use crate::backend::{
    AudioEncodeQuery, AudioTrackConfig, GridFrame, OutputContainer, StitchBackend, VideoSource,
};
use crate::grid::{FrameGrid, Placement};
use crate::probe::probe_clips;
use crate::progress::{
    band, ProgressReporter, AUDIO_END, AUDIO_START, FINALIZE, PROBE_DONE, VIDEO_END, VIDEO_START,
};
use crate::resolve::resolve_encode_parameters;
use crate::session::{CleanupStep, ContainerGuard};
use crate::settings::StitchSettings;

/// Assumed clip length when probing gave none; only drives progress.
const FALLBACK_CLIP_SECS: f64 = 5.0;

/// Frames between periodic progress reports within a clip.
const PROGRESS_STRIDE_FRAMES: u64 = 30;

/// Inputs for one stitch invocation.
#[derive(Debug, Clone, Default)]
pub struct StitchRequest {
    /// Clips in output order.
    pub clips: Vec<MediaBlob>,
    /// Optional soundtrack laid under the whole output.
    pub audio: Option<MediaBlob>,
    pub audio_options: AudioProcessingOptions,
}

impl StitchRequest {
    pub fn new(clips: Vec<MediaBlob>) -> Self {
        Self {
            clips,
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: MediaBlob, options: AudioProcessingOptions) -> Self {
        self.audio = Some(audio);
        self.audio_options = options;
        self
    }
}

/// Counters describing what the clip loop wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchStats {
    pub frames_written: u64,
    pub frames_dropped: u64,
    pub clips_skipped: usize,
}

/// Stitch `request.clips` into one MP4.
///
/// Failures are returned and also reported once through `progress` with
/// an error status; the output is never partially returned.
pub async fn stitch_videos<B>(
    backend: &B,
    request: &StitchRequest,
    settings: &StitchSettings,
    progress: Option<&(dyn Fn(StitchProgress) + Send + Sync)>,
) -> StitchResult<StitchOutput>
where
    B: StitchBackend,
{
    let reporter = ProgressReporter::new(progress, request.clips.len());

    tracing::info!(
        clips = request.clips.len(),
        audio = request.audio.is_some(),
        frame_rate = settings.frame_rate.fps(),
        "Starting stitch"
    );

    match run(backend, request, settings, &reporter).await {
        Ok((output, stats)) => {
            tracing::info!(
                bytes = output.len(),
                frames_written = stats.frames_written,
                frames_dropped = stats.frames_dropped,
                clips_skipped = stats.clips_skipped,
                "Stitch complete"
            );
            reporter.complete(format!(
                "Stitched {} clips ({} frames)",
                request.clips.len() - stats.clips_skipped,
                stats.frames_written
            ));
            Ok(output)
        }
        Err(e) => {
            tracing::error!(error = %e, "Stitch failed");
            reporter.error(&e);
            Err(e)
        }
    }
}


/// Everything resolved before the container is created.
struct Job<'a, B> {
    backend: &'a B,
    request: &'a StitchRequest,
    settings: &'a StitchSettings,
    params: EncodeParameters,
    meta: ProbedMetadata,
    reporter: &'a ProgressReporter<'a>,
}

/// What one clip contributed to the output.
#[derive(Debug, Clone, Copy, Default)]
struct ClipSummary {
    written: u64,
    dropped: u64,
    skipped: bool,
}

async fn run<B>(
    backend: &B,
    request: &StitchRequest,
    settings: &StitchSettings,
    reporter: &ProgressReporter<'_>,
) -> StitchResult<(StitchOutput, StitchStats)>
where
    B: StitchBackend,
{
    if request.clips.is_empty() {
        return Err(StitchError::NoClips);
    }

    reporter.processing("Reading clip metadata", 0.0, None);
    let meta = probe_clips(backend, &request.clips, settings).await?;
    let params = resolve_encode_parameters(backend, &meta, settings).await?;
    reporter.processing(
        format!(
            "Output {}x{} at {} fps",
            params.width, params.height, params.frame_rate
        ),
        PROBE_DONE,
        None,
    );

    let job = Job {
        backend,
        request,
        settings,
        params,
        meta,
        reporter,
    };

    let audio = match &request.audio {
        Some(blob) => Some(prepare_audio(&job, blob).await?),
        None => None,
    };

    let container = backend.create_container(&job.params).await?;
    let mut guard = ContainerGuard::new(container);

    match write_container(&job, &mut guard, audio).await {
        Ok(result) => {
            guard.into_inner();
            Ok(result)
        }
        Err(e) => {
            let failed = guard.release().await;
            if !failed.is_empty() {
                tracing::warn!(steps = ?failed, "Cleanup finished with failures");
            }
            Err(e)
        }
    }
}

async fn prepare_audio<B>(job: &Job<'_, B>, blob: &MediaBlob) -> StitchResult<DecodedAudio>
where
    B: StitchBackend,
{
    let preparer = AudioPreparer::new(
        job.backend.audio_decoders(),
        job.settings.min_audio_duration_secs,
    );
    let reporter = job.reporter;
    let on_milestone = |m: AudioMilestone| {
        reporter.processing(
            m.message(),
            band(AUDIO_START, AUDIO_END, f64::from(m.percent()) / 100.0),
            None,
        )
    };

    let video_secs = job.meta.total_duration_secs;
    let mut audio = preparer
        .prepare(blob, video_secs, &job.request.audio_options, &on_milestone)
        .await?;

    if video_secs > 0.0 {
        audio.trim_to(video_secs.min(audio.duration_secs));
    }
    Ok(audio)
}

/// Pick the first preferred codec the device can encode for this audio.
async fn negotiate_audio_codec<B>(job: &Job<'_, B>, audio: &DecodedAudio) -> Option<AudioTrackConfig>
where
    B: StitchBackend,
{
    for codec in &job.settings.audio_codecs {
        let query = AudioEncodeQuery {
            codec: *codec,
            sample_rate: audio.sample_rate,
            channels: audio.buffer.channel_count(),
            bitrate: codec.default_bitrate(),
        };
        if job.backend.can_encode_audio(&query).await {
            tracing::debug!(codec = %codec, "Negotiated audio codec");
            return Some(AudioTrackConfig {
                codec: query.codec,
                sample_rate: query.sample_rate,
                channels: query.channels,
                bitrate: query.bitrate,
            });
        }
        tracing::debug!(codec = %codec, "Audio codec not encodable on this device");
    }
    None
}

async fn write_container<B>(
    job: &Job<'_, B>,
    guard: &mut ContainerGuard<B::Container>,
    audio: Option<DecodedAudio>,
) -> StitchResult<(StitchOutput, StitchStats)>
where
    B: StitchBackend,
{
    guard.container_mut().add_video_track(&job.params)?;

    let audio = match audio {
        Some(audio) => match negotiate_audio_codec(job, &audio).await {
            Some(config) => {
                guard.container_mut().add_audio_track(&config)?;
                Some(audio)
            }
            None => {
                tracing::warn!(
                    preferred = ?job.settings.audio_codecs,
                    "No audio codec could be negotiated; writing video only"
                );
                None
            }
        },
        None => None,
    };

    guard.container_mut().start().await?;
    guard.register(CleanupStep::CancelContainer);
    guard.register(CleanupStep::CloseVideoTrack);

    // Audio goes in completely before the first video sample.
    if let Some(audio) = audio {
        guard.register(CleanupStep::CloseAudioTrack);
        guard.container_mut().write_audio(&audio.buffer).await?;
        guard.container_mut().close_audio().await?;
        guard.resolve(CleanupStep::CloseAudioTrack);
        tracing::info!(
            duration_secs = audio.duration_secs,
            sample_rate = audio.sample_rate,
            "Audio track written"
        );
    }

    let stats = write_clips(job, guard.container_mut()).await?;

    job.reporter.processing("Finalizing video", FINALIZE, None);
    guard.container_mut().close_video().await?;
    guard.resolve(CleanupStep::CloseVideoTrack);

    let bytes = guard.container_mut().finalize().await?;
    guard.resolve(CleanupStep::CancelContainer);

    match bytes {
        Some(bytes) if !bytes.is_empty() => Ok((StitchOutput::mp4(bytes), stats)),
        _ => Err(StitchError::MissingOutput),
    }
}

async fn write_clips<B>(job: &Job<'_, B>, container: &mut B::Container) -> StitchResult<StitchStats>
where
    B: StitchBackend,
{
    let mut grid = FrameGrid::new(job.settings.frame_rate);
    let mut stats = StitchStats::default();

    for (index, clip) in job.request.clips.iter().enumerate() {
        let mut source = job
            .backend
            .open_video_source(clip, &job.params)
            .await
            .map_err(|e| into_decode_error(index, e))?;

        let result = write_clip(job, container, &mut grid, &mut source, index).await;

        if let Err(e) = source.close().await {
            tracing::warn!(clip_index = index, error = %e, "Failed to close decode session");
        }

        let summary = result?;
        stats.frames_written += summary.written;
        stats.frames_dropped += summary.dropped;
        if summary.skipped {
            stats.clips_skipped += 1;
        }
    }

    job.reporter.processing("All clips written", VIDEO_END, None);
    Ok(stats)
}

async fn write_clip<B>(
    job: &Job<'_, B>,
    container: &mut B::Container,
    grid: &mut FrameGrid,
    source: &mut B::Source,
    index: usize,
) -> StitchResult<ClipSummary>
where
    B: StitchBackend,
{
    let total = job.request.clips.len();

    if source.video_track_count() == 0 {
        tracing::warn!(clip_index = index, "Clip has no video track; skipping");
        return Ok(ClipSummary {
            skipped: true,
            ..Default::default()
        });
    }

    let expected_frames = estimated_frames(job, index);
    let clip_percent = |fraction: f64| {
        band(
            VIDEO_START,
            VIDEO_END,
            (index as f64 + fraction.clamp(0.0, 1.0)) / total as f64,
        )
    };
    job.reporter.processing(
        format!("Processing clip {} of {}", index + 1, total),
        clip_percent(0.0),
        Some(index),
    );

    let mut segment = grid.start_clip();
    let mut throttle = ProgressThrottle::new(PROGRESS_STRIDE_FRAMES);
    let mut summary = ClipSummary::default();

    while let Some(sample) = source
        .next_sample()
        .await
        .map_err(|e| into_decode_error(index, e))?
    {
        match grid.place(&mut segment, sample.timestamp_secs) {
            Placement::Write {
                slot,
                timestamp_ns,
                duration_ns,
            } => {
                tracing::trace!(clip_index = index, slot, original = sample.timestamp_secs, "Writing frame");
                container
                    .write_video(GridFrame {
                        slot,
                        timestamp_ns,
                        duration_ns,
                        frame: sample.frame,
                    })
                    .await?;
                summary.written += 1;
            }
            Placement::Duplicate { slot } => {
                tracing::trace!(clip_index = index, slot, original = sample.timestamp_secs, "Dropping frame on used slot");
                summary.dropped += 1;
            }
        }

        let seen = summary.written + summary.dropped;
        if throttle.should_fire(seen) {
            job.reporter.processing(
                format!("Processing clip {} of {}", index + 1, total),
                clip_percent(seen as f64 / expected_frames as f64),
                Some(index),
            );
        }
    }

    tracing::info!(
        clip_index = index,
        frames_written = summary.written,
        frames_dropped = summary.dropped,
        last_slot = grid.highest_slot(),
        timeline_secs = grid.written_duration_secs(),
        "Clip written"
    );
    Ok(summary)
}

/// Rough frame count for progress only.
fn estimated_frames<B>(job: &Job<'_, B>, index: usize) -> u64 {
    let secs = job
        .meta
        .clip_durations_secs
        .get(index)
        .copied()
        .flatten()
        .filter(|secs| *secs > 0.0)
        .unwrap_or(FALLBACK_CLIP_SECS);
    ((secs * job.settings.frame_rate.fps() as f64).round() as u64).max(1)
}

fn into_decode_error(clip_index: usize, err: StitchError) -> StitchError {
    match err {
        StitchError::Decode { .. } => err,
        other => StitchError::decode(clip_index, other.to_string()),
    }
}
