//! Full container/codec audio decode through `decodebin`.

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_engine::backend::AudioDecodeStrategy;
use clipstitch_model::{MediaBlob, PcmBuffer};
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;

use crate::pipeline::{
    app_sink, escape_path, launch, link_first_pad, pending_error, set_state, shutdown, TempMedia,
};

pub(crate) fn audio_decode_launch(location: &str) -> String {
    format!(
        "filesrc location=\"{location}\" ! decodebin name=dec \
         queue name=aqueue ! audioconvert ! \
         audio/x-raw,format=F32LE,layout=interleaved ! \
         appsink name=sink sync=false"
    )
}

/// Convert little-endian `f32` bytes to samples.
pub fn f32le_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Decodes any format GStreamer can read, one chunk per decoded buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstAudioDecodeStrategy;

#[async_trait::async_trait]
impl AudioDecodeStrategy for GstAudioDecodeStrategy {
    fn name(&self) -> &str {
        "gstreamer"
    }

    async fn decode(&self, audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>> {
        let audio = audio.clone();
        tokio::task::spawn_blocking(move || decode_blocking(&audio))
            .await
            .map_err(|e| StitchError::backend(format!("Audio decode task failed: {e}")))?
    }
}

fn decode_blocking(audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>> {
    let file = TempMedia::materialize(audio, "audio")?;
    let pipeline = launch("audio-decode", &audio_decode_launch(&escape_path(file.path())))?;
    let sink = app_sink(&pipeline, "sink")?;
    let started = link_first_pad(&pipeline, "dec", "aqueue", "audio/")
        .and_then(|_| set_state(&pipeline, gst::State::Playing));
    if let Err(e) = started {
        shutdown(&pipeline, "audio-decode");
        return Err(e);
    }

    let result = pull_chunks(&pipeline, &sink);
    shutdown(&pipeline, "audio-decode");
    let chunks = result?;

    tracing::debug!(
        audio = %audio.label(),
        chunks = chunks.len(),
        "Decoded audio with GStreamer"
    );
    Ok(chunks)
}

fn pull_chunks(pipeline: &gst::Pipeline, sink: &gst_app::AppSink) -> StitchResult<Vec<PcmBuffer>> {
    let mut chunks = Vec::new();
    loop {
        let Ok(sample) = sink.pull_sample() else {
            if sink.is_eos() {
                return Ok(chunks);
            }
            return Err(StitchError::audio_decode(
                pending_error(pipeline).unwrap_or_else(|| "decoder stopped early".to_string()),
            ));
        };

        let caps = sample
            .caps()
            .ok_or_else(|| StitchError::audio_decode("decoded sample has no caps"))?;
        let s = caps
            .structure(0)
            .ok_or_else(|| StitchError::audio_decode("decoded caps are empty"))?;
        let rate = s
            .get::<i32>("rate")
            .map_err(|e| StitchError::audio_decode(format!("missing rate: {e}")))?;
        let channels = s
            .get::<i32>("channels")
            .map_err(|e| StitchError::audio_decode(format!("missing channels: {e}")))?;
        if rate <= 0 || channels <= 0 {
            return Err(StitchError::audio_decode(format!(
                "invalid audio format: {rate} Hz, {channels} channels"
            )));
        }

        let Some(buffer) = sample.buffer() else {
            continue;
        };
        let map = buffer
            .map_readable()
            .map_err(|e| StitchError::audio_decode(format!("unreadable buffer: {e}")))?;
        let samples = f32le_samples(map.as_slice());
        chunks.push(PcmBuffer::from_interleaved(
            rate as u32,
            channels as usize,
            &samples,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32le_samples_ignores_trailing_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-1.0f32).to_le_bytes());
        bytes.push(0xff);
        assert_eq!(f32le_samples(&bytes), vec![0.5, -1.0]);
    }

    #[test]
    fn test_audio_launch_requests_interleaved_float() {
        let launch = audio_decode_launch("/tmp/a.bin");
        assert!(launch.contains("format=F32LE,layout=interleaved"));
        assert!(launch.contains("appsink name=sink"));
        assert!(launch.contains("queue name=aqueue"));
        assert!(!launch.contains("decodebin !"));
    }
}
