//! Audio decode strategies.

use std::io::Cursor;

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{MediaBlob, PcmBuffer};

use crate::backend::AudioDecodeStrategy;

/// Ordered list of decoders; the first one that yields samples wins.
pub struct AudioDecoderChain {
    strategies: Vec<Box<dyn AudioDecodeStrategy>>,
}

impl AudioDecoderChain {
    pub fn new(strategies: Vec<Box<dyn AudioDecodeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Strategy names in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait::async_trait]
impl AudioDecodeStrategy for AudioDecoderChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn decode(&self, audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>> {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            match strategy.decode(audio).await {
                Ok(chunks) if chunks.iter().any(|c| c.frames() > 0) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        chunks = chunks.len(),
                        "Audio decoded"
                    );
                    return Ok(chunks);
                }
                Ok(_) => {
                    tracing::warn!(strategy = strategy.name(), "Audio decoder produced no samples");
                    failures.push(format!("{}: no samples", strategy.name()));
                }
                Err(e) => {
                    tracing::warn!(
                        strategy = strategy.name(),
                        error = %e,
                        "Audio decoder failed; trying next"
                    );
                    failures.push(format!("{}: {e}", strategy.name()));
                }
            }
        }

        if failures.is_empty() {
            return Err(StitchError::audio_decode("No audio decoders available"));
        }
        Err(StitchError::audio_decode(failures.join("; ")))
    }
}

/// Whole-file RIFF/WAVE decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecodeStrategy;

#[async_trait::async_trait]
impl AudioDecodeStrategy for WavDecodeStrategy {
    fn name(&self) -> &str {
        "wav"
    }

    async fn decode(&self, audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>> {
        decode_wav_bytes(audio.bytes()).map(|pcm| vec![pcm])
    }
}

/// Decode a complete WAV file into one PCM buffer.
pub fn decode_wav_bytes(bytes: &[u8]) -> StitchResult<PcmBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| StitchError::audio_decode(format!("Invalid WAV data: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| StitchError::audio_decode(format!("Failed reading WAV samples: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| {
                    StitchError::audio_decode(format!("Failed reading WAV samples: {e}"))
                })?
        }
    };

    Ok(PcmBuffer::from_interleaved(
        spec.sample_rate,
        spec.channels as usize,
        &samples,
    ))
}
