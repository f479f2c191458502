//! Orchestrator integration tests against the in-memory backend.

mod common;

use std::sync::Mutex;

use clipstitch_common::clock::FrameRate;
use clipstitch_common::error::StitchError;
use clipstitch_engine::session::{CleanupStep, ContainerGuard};
use clipstitch_engine::{
    check_device_support, stitch_videos, StitchBackend, StitchRequest, StitchSettings,
};
use clipstitch_model::{
    AudioCodec, AudioProcessingOptions, MediaBlob, StitchProgress, StitchStatus, OUTPUT_MIME_TYPE,
};
use common::{tone, Call, MockBackend, MockClip};

async fn stitch_collecting(
    backend: &MockBackend,
    request: &StitchRequest,
) -> (
    Result<clipstitch_model::StitchOutput, StitchError>,
    Vec<StitchProgress>,
) {
    let seen = Mutex::new(Vec::new());
    let cb = |p: StitchProgress| seen.lock().unwrap().push(p);
    let result = stitch_videos(backend, request, &StitchSettings::default(), Some(&cb)).await;
    (result, seen.into_inner().unwrap())
}

fn is_on_grid(ts: f64, fps: f64) -> bool {
    let k = ts * fps;
    (k - k.round()).abs() < 1e-6
}

#[tokio::test]
async fn empty_clip_list_fails_without_allocating() {
    let backend = MockBackend::new();
    let (result, progress) = stitch_collecting(&backend, &StitchRequest::default()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, StitchError::NoClips));
    assert_eq!(err.to_string(), "No videos to stitch");
    assert!(backend.calls().is_empty());

    let last = progress.last().unwrap();
    assert_eq!(last.status, StitchStatus::Error);
    assert_eq!(last.error.as_deref(), Some("No videos to stitch"));
}

#[tokio::test]
async fn capability_refusal_opens_nothing() {
    let mut backend = MockBackend::new();
    backend.can_encode_video = false;
    let clip = backend.add_clip("a", MockClip::video(3840, 2160, 1.0, 30.0, 0.0));

    let (result, progress) = stitch_collecting(&backend, &StitchRequest::new(vec![clip])).await;

    let err = result.unwrap_err();
    assert!(matches!(err, StitchError::UnsupportedConfiguration { .. }));
    assert!(err.to_string().contains("avc1.640033"));
    assert_eq!(backend.count(|c| *c == Call::CreateContainer), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::OpenSource(_))), 0);
    assert_eq!(progress.last().unwrap().status, StitchStatus::Error);
}

#[tokio::test]
async fn two_clips_fill_a_gap_free_sixty_fps_grid() {
    let mut backend = MockBackend::new();
    let a = backend.add_clip("a", MockClip::video(1280, 720, 3.0, 60.0, 0.0));
    let b = backend.add_clip("b", MockClip::video(1280, 720, 2.0, 60.0, 100.0));

    let (result, progress) = stitch_collecting(&backend, &StitchRequest::new(vec![a, b])).await;

    let output = result.unwrap();
    assert_eq!(output.mime_type, OUTPUT_MIME_TYPE);
    assert!(!output.is_empty());

    let timestamps = backend.video_timestamps();
    assert_eq!(timestamps.len(), 300);
    assert_eq!(timestamps[0], 0.0);
    assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
    assert!(timestamps.iter().all(|ts| is_on_grid(*ts, 60.0)));
    assert!((timestamps[180] - 3.0).abs() < 1e-9);

    let written_secs = timestamps.len() as f64 / 60.0;
    assert!((written_secs - 5.0).abs() <= 1.0 / 60.0);

    // Every frame ends exactly where the next one starts.
    let rate = FrameRate::new(60);
    let mut next_start = 0u64;
    for call in backend.calls() {
        if let Call::WriteVideo {
            slot,
            timestamp_ns,
            duration_ns,
        } = call
        {
            assert_eq!(timestamp_ns, rate.slot_to_ns(slot));
            assert_eq!(timestamp_ns, next_start);
            assert!(duration_ns == 16_666_666 || duration_ns == 16_666_667);
            next_start = timestamp_ns + duration_ns;
        }
    }
    assert_eq!(next_start, 5_000_000_000);

    let last = progress.last().unwrap();
    assert_eq!(last.status, StitchStatus::Complete);
    assert_eq!(last.progress, 100.0);
    assert_eq!(last.total_clips, Some(2));
}

#[tokio::test]
async fn mixed_source_rates_land_on_the_output_grid() {
    let mut backend = MockBackend::new();
    let dense = backend.add_clip("dense", MockClip::video(1280, 720, 1.0, 120.0, 0.0));
    let sparse = backend.add_clip("sparse", MockClip::video(1280, 720, 1.0, 24.0, 7.5));

    let (result, _) = stitch_collecting(&backend, &StitchRequest::new(vec![dense, sparse])).await;
    result.unwrap();

    let timestamps = backend.video_timestamps();
    assert!(timestamps.windows(2).all(|w| w[1] > w[0]));
    assert!(timestamps.iter().all(|ts| is_on_grid(*ts, 60.0)));

    // The 120 fps clip keeps one frame per output slot.
    let calls = backend.calls();
    let sparse_opened = calls
        .iter()
        .position(|c| *c == Call::OpenSource("sparse".into()))
        .unwrap();
    let dense_frames = calls[..sparse_opened]
        .iter()
        .filter(|c| matches!(c, Call::WriteVideo { .. }))
        .count();
    assert!((60..=61).contains(&dense_frames));
    assert_eq!(timestamps.len() - dense_frames, 24);
}

#[tokio::test]
async fn clip_without_video_track_is_skipped() {
    let mut backend = MockBackend::new();
    let a = backend.add_clip("a", MockClip::video(1280, 720, 2.0, 60.0, 0.0));
    let silent = backend.add_clip("voice", MockClip::audio_only(4.0));
    let b = backend.add_clip("b", MockClip::video(1280, 720, 1.0, 60.0, 0.0));

    let (result, progress) =
        stitch_collecting(&backend, &StitchRequest::new(vec![a, silent, b])).await;

    result.unwrap();
    assert_eq!(backend.video_timestamps().len(), 180);
    assert_eq!(backend.count(|c| *c == Call::CloseSource("voice".into())), 1);
    assert_eq!(backend.open_sources(), 0);
    assert_eq!(progress.last().unwrap().status, StitchStatus::Complete);
}

#[tokio::test]
async fn unreadable_metadata_does_not_abort_the_job() {
    let mut backend = MockBackend::new();
    let mut broken = MockClip::video(640, 480, 1.0, 30.0, 0.0);
    broken.metadata = None;
    let a = backend.add_clip("a", broken);
    let b = backend.add_clip("b", MockClip::video(640, 480, 1.0, 30.0, 0.0));

    let (result, _) = stitch_collecting(&backend, &StitchRequest::new(vec![a, b])).await;

    result.unwrap();
    assert!(backend.video_timestamps().len() >= 59);
}

#[tokio::test]
async fn audio_is_written_and_closed_before_any_video() {
    let mut backend = MockBackend::new();
    backend.audio = Some(tone(1000, 5.0));
    let clip = backend.add_clip("a", MockClip::video(1280, 720, 2.0, 30.0, 0.0));

    let request = StitchRequest::new(vec![clip])
        .with_audio(MediaBlob::new(vec![0u8; 4]), AudioProcessingOptions::default());
    let (result, _) = stitch_collecting(&backend, &request).await;
    result.unwrap();

    let calls = backend.calls();
    let pos = |pred: &dyn Fn(&Call) -> bool| calls.iter().position(|c| pred(c)).unwrap();
    let add_audio = pos(&|c: &Call| *c == Call::AddAudioTrack(AudioCodec::Aac));
    let start = pos(&|c: &Call| *c == Call::Start);
    let write_audio = pos(&|c: &Call| matches!(c, Call::WriteAudio { .. }));
    let close_audio = pos(&|c: &Call| *c == Call::CloseAudio);
    let first_video = pos(&|c: &Call| matches!(c, Call::WriteVideo { .. }));

    assert!(add_audio < start);
    assert!(start < write_audio);
    assert!(write_audio < close_audio);
    assert!(close_audio < first_video);

    // Trimmed to the 2 s of video.
    assert!(calls.contains(&Call::WriteAudio { frames: 2000 }));
}

#[tokio::test]
async fn audio_codec_negotiation_falls_back_in_order() {
    let mut backend = MockBackend::new();
    backend.audio = Some(tone(1000, 1.0));
    backend.audio_codecs = vec![AudioCodec::Mp3];
    let clip = backend.add_clip("a", MockClip::video(1280, 720, 1.0, 30.0, 0.0));

    let request = StitchRequest::new(vec![clip])
        .with_audio(MediaBlob::new(vec![0u8; 4]), AudioProcessingOptions::default());
    let (result, _) = stitch_collecting(&backend, &request).await;
    result.unwrap();

    assert_eq!(backend.count(|c| *c == Call::AddAudioTrack(AudioCodec::Mp3)), 1);
}

#[tokio::test]
async fn no_negotiable_audio_codec_writes_video_only() {
    let mut backend = MockBackend::new();
    backend.audio = Some(tone(1000, 1.0));
    backend.audio_codecs = Vec::new();
    let clip = backend.add_clip("a", MockClip::video(1280, 720, 1.0, 30.0, 0.0));

    let request = StitchRequest::new(vec![clip])
        .with_audio(MediaBlob::new(vec![0u8; 4]), AudioProcessingOptions::default());
    let (result, progress) = stitch_collecting(&backend, &request).await;

    result.unwrap();
    assert_eq!(backend.count(|c| matches!(c, Call::AddAudioTrack(_))), 0);
    assert_eq!(backend.count(|c| matches!(c, Call::WriteAudio { .. })), 0);
    assert_eq!(backend.video_timestamps().len(), 60);
    assert_eq!(progress.last().unwrap().status, StitchStatus::Complete);
}

#[tokio::test]
async fn audio_decode_failure_is_fatal() {
    let mut backend = MockBackend::new();
    let clip = backend.add_clip("a", MockClip::video(1280, 720, 1.0, 30.0, 0.0));

    let request = StitchRequest::new(vec![clip])
        .with_audio(MediaBlob::new(vec![0u8; 4]), AudioProcessingOptions::default());
    let (result, _) = stitch_collecting(&backend, &request).await;

    assert!(matches!(result.unwrap_err(), StitchError::AudioDecode { .. }));
    assert_eq!(backend.count(|c| *c == Call::CreateContainer), 0);
}

#[tokio::test]
async fn decode_error_mid_clip_cleans_up_every_resource() {
    let mut backend = MockBackend::new();
    backend.audio = Some(tone(1000, 3.0));
    let a = backend.add_clip("a", MockClip::video(1280, 720, 1.0, 30.0, 0.0));
    let b = backend.add_clip(
        "b",
        MockClip::video(1280, 720, 2.0, 30.0, 0.0).failing_after(10),
    );

    let request = StitchRequest::new(vec![a, b])
        .with_audio(MediaBlob::new(vec![0u8; 4]), AudioProcessingOptions::default());
    let (result, progress) = stitch_collecting(&backend, &request).await;

    let err = result.unwrap_err();
    assert!(matches!(err, StitchError::Decode { clip_index: 1, .. }));

    assert_eq!(backend.open_sources(), 0);
    assert_eq!(backend.count(|c| *c == Call::CloseSource("b".into())), 1);
    assert_eq!(backend.count(|c| *c == Call::CloseAudio), 1);
    assert_eq!(backend.count(|c| *c == Call::CloseVideo), 1);
    assert_eq!(backend.count(|c| *c == Call::Cancel), 1);
    assert_eq!(backend.count(|c| *c == Call::Finalize), 0);

    let terminal: Vec<_> = progress.iter().filter(|p| p.status.is_terminal()).collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].status, StitchStatus::Error);
    assert_eq!(terminal[0].error.as_deref(), Some(err.to_string().as_str()));
}

#[tokio::test]
async fn failing_cleanup_step_does_not_mask_the_error() {
    let mut backend = MockBackend::new();
    backend.fail_close_video = true;
    let clip = backend.add_clip("a", MockClip::video(1280, 720, 1.0, 30.0, 0.0));

    let (result, _) = stitch_collecting(&backend, &StitchRequest::new(vec![clip])).await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Encode error: flush failed");
    assert_eq!(backend.count(|c| *c == Call::Cancel), 1);
}

#[tokio::test]
async fn missing_output_after_finalize_is_an_error() {
    let mut backend = MockBackend::new();
    backend.output = None;
    let clip = backend.add_clip("a", MockClip::video(1280, 720, 1.0, 30.0, 0.0));

    let (result, progress) = stitch_collecting(&backend, &StitchRequest::new(vec![clip])).await;

    assert!(matches!(result.unwrap_err(), StitchError::MissingOutput));
    assert_eq!(backend.count(|c| *c == Call::Finalize), 1);
    assert_eq!(progress.last().unwrap().status, StitchStatus::Error);
}

#[tokio::test]
async fn progress_only_moves_forward() {
    let mut backend = MockBackend::new();
    backend.audio = Some(tone(1000, 1.0));
    let a = backend.add_clip("a", MockClip::video(1280, 720, 2.0, 60.0, 0.0));
    let b = backend.add_clip("b", MockClip::video(1280, 720, 2.0, 60.0, 0.0));

    let request = StitchRequest::new(vec![a, b])
        .with_audio(MediaBlob::new(vec![0u8; 4]), AudioProcessingOptions::default());
    let (result, progress) = stitch_collecting(&backend, &request).await;
    result.unwrap();

    assert!(progress.len() > 5);
    assert!(progress.windows(2).all(|w| w[1].progress >= w[0].progress));
    assert!(progress
        .iter()
        .any(|p| p.current_clip_index == Some(1)));
}

#[tokio::test]
async fn preflight_resolves_without_opening_anything() {
    let mut backend = MockBackend::new();
    let a = backend.add_clip("a", MockClip::video(1279, 719, 1.0, 30.0, 0.0));
    let b = backend.add_clip("b", MockClip::video(640, 480, 1.0, 30.0, 0.0));

    let report = check_device_support(&backend, &[a, b], &StitchSettings::default())
        .await
        .unwrap();

    assert_eq!((report.params.width, report.params.height), (1280, 720));
    assert_eq!(report.params.codec_profile.codec_string(), "avc1.640028");
    assert!((report.metadata.total_duration_secs - 2.0).abs() < 1e-9);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn cleanup_steps_run_once() {
    let backend = MockBackend::new();
    let params = clipstitch_model::EncodeParameters {
        width: 1280,
        height: 720,
        rotation: Default::default(),
        codec_profile: clipstitch_model::CodecProfile::LOW_RES,
        bitrate: 1,
        frame_rate: 60,
    };
    let container = backend.create_container(&params).await.unwrap();
    let mut guard = ContainerGuard::new(container);
    guard.register(CleanupStep::CancelContainer);
    guard.register(CleanupStep::CloseAudioTrack);
    guard.register(CleanupStep::CloseAudioTrack);
    assert_eq!(
        guard.pending(),
        &[CleanupStep::CancelContainer, CleanupStep::CloseAudioTrack]
    );

    let failed = guard.release().await;
    assert!(failed.is_empty());

    // Audio closes before the container is cancelled, each exactly once.
    let calls = backend.calls();
    assert_eq!(calls[1..], [Call::CloseAudio, Call::Cancel]);
}
