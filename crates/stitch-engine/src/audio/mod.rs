//! Audio preparation: decode, offset, loop, trim, and fade.
//!
//! The preparer turns one audio blob into a single PCM buffer covering the
//! target duration. Decoding tries each configured strategy in order; the
//! merged buffer is then shaped by [`envelope`].

pub mod decode;
pub mod envelope;

use clipstitch_common::error::{StitchError, StitchResult};
use clipstitch_model::{AudioProcessingOptions, DecodedAudio, MediaBlob, PcmBuffer};

use crate::backend::AudioDecodeStrategy;
use decode::AudioDecoderChain;
use envelope::{apply_fades, fit_fades, merge_chunks};

/// Named checkpoints reported while preparing audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMilestone {
    Decoding,
    Decoded,
    Merged,
    FadesApplied,
    Ready,
}

impl AudioMilestone {
    /// Completion percentage of the preparation step.
    pub fn percent(self) -> u8 {
        match self {
            Self::Decoding => 10,
            Self::Decoded => 40,
            Self::Merged => 70,
            Self::FadesApplied => 90,
            Self::Ready => 100,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Decoding => "Decoding audio",
            Self::Decoded => "Audio decoded",
            Self::Merged => "Audio merged to target duration",
            Self::FadesApplied => "Audio fades applied",
            Self::Ready => "Audio ready",
        }
    }
}

/// Decodes and shapes the audio track for one invocation.
pub struct AudioPreparer {
    decoder: AudioDecoderChain,
    min_duration_secs: f64,
}

impl AudioPreparer {
    pub fn new(decoders: Vec<Box<dyn AudioDecodeStrategy>>, min_duration_secs: f64) -> Self {
        Self {
            decoder: AudioDecoderChain::new(decoders),
            min_duration_secs: min_duration_secs.max(0.0),
        }
    }

    /// Prepare `audio` to cover `target_duration_secs` (0 = use the audio's own length).
    pub async fn prepare(
        &self,
        audio: &MediaBlob,
        target_duration_secs: f64,
        options: &AudioProcessingOptions,
        on_milestone: &(dyn Fn(AudioMilestone) + Sync),
    ) -> StitchResult<DecodedAudio> {
        on_milestone(AudioMilestone::Decoding);
        tracing::debug!(
            audio = %audio.label(),
            decoders = ?self.decoder.names(),
            "Decoding audio"
        );
        let chunks = self.decoder.decode(audio).await?;
        on_milestone(AudioMilestone::Decoded);

        let mut merged =
            merge_to_target(&chunks, target_duration_secs, options, self.min_duration_secs)?;
        on_milestone(AudioMilestone::Merged);

        fade_buffer(&mut merged, options);
        on_milestone(AudioMilestone::FadesApplied);

        let prepared = DecodedAudio::new(merged);

        tracing::info!(
            duration_secs = prepared.duration_secs,
            sample_rate = prepared.sample_rate,
            channels = prepared.buffer.channel_count(),
            offset_secs = options.offset_secs,
            fade_in_secs = options.fade_in_secs,
            fade_out_secs = options.fade_out_secs,
            "Audio prepared"
        );
        on_milestone(AudioMilestone::Ready);
        Ok(prepared)
    }
}

/// Merge decoded chunks into one buffer at the target length, applying the
/// offset and looping short audio. No fades.
pub fn merge_to_target(
    chunks: &[PcmBuffer],
    target_duration_secs: f64,
    options: &AudioProcessingOptions,
    min_duration_secs: f64,
) -> StitchResult<PcmBuffer> {
    let first = chunks
        .first()
        .ok_or_else(|| StitchError::audio_decode("Decoder returned no audio chunks"))?;
    let sample_rate = first.sample_rate();

    let source_secs: f64 = chunks.iter().map(PcmBuffer::duration_secs).sum();
    let requested = if target_duration_secs > 0.0 {
        target_duration_secs
    } else {
        source_secs
    };
    let duration_secs = requested.max(min_duration_secs);
    let total_frames = (duration_secs * sample_rate as f64).round() as usize;

    let offset_frames = if options.offset_secs.is_finite() {
        (options.offset_secs * sample_rate as f64).round() as i64
    } else {
        0
    };

    Ok(merge_chunks(chunks, total_frames, offset_frames))
}

/// Apply the requested fades, fitted to the buffer length.
pub fn fade_buffer(buffer: &mut PcmBuffer, options: &AudioProcessingOptions) {
    let fades = fit_fades(
        options.fade_in_secs,
        options.fade_out_secs,
        buffer.sample_rate(),
        buffer.frames(),
    );
    apply_fades(buffer, fades);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn tone(sample_rate: u32, secs: f64) -> PcmBuffer {
        let frames = (secs * sample_rate as f64) as usize;
        PcmBuffer::from_planar(sample_rate, vec![vec![0.8; frames], vec![-0.8; frames]])
    }

    #[test]
    fn test_offset_two_seconds_into_five() {
        let options = AudioProcessingOptions {
            offset_secs: 2.0,
            ..Default::default()
        };
        let audio = merge_to_target(&[tone(1000, 5.0)], 5.0, &options, 1.0).unwrap();
        assert!((audio.duration_secs() - 5.0).abs() < 1e-9);
        let left = audio.channel(0);
        assert!(left[..2000].iter().all(|s| *s == 0.0));
        assert!(left[2000..].iter().all(|s| *s == 0.8));
    }

    #[test]
    fn test_zero_target_uses_source_length() {
        let audio = merge_to_target(
            &[tone(1000, 1.5), tone(1000, 2.0)],
            0.0,
            &AudioProcessingOptions::default(),
            1.0,
        )
        .unwrap();
        assert_eq!(audio.frames(), 3500);
    }

    #[test]
    fn test_minimum_duration_floor() {
        let audio = merge_to_target(
            &[tone(1000, 0.25)],
            0.0,
            &AudioProcessingOptions::default(),
            1.0,
        )
        .unwrap();
        assert_eq!(audio.frames(), 1000);
        assert!(audio.channel(0).iter().all(|s| *s == 0.8));
    }

    #[test]
    fn test_merge_leaves_fading_to_its_own_step() {
        let options = AudioProcessingOptions {
            fade_in_secs: 1.0,
            fade_out_secs: 1.0,
            ..Default::default()
        };
        let mut merged = merge_to_target(&[tone(100, 3.0)], 3.0, &options, 1.0).unwrap();
        assert_eq!(merged.channel(0)[0], 0.8);
        assert_eq!(merged.channel(0)[299], 0.8);

        fade_buffer(&mut merged, &options);
        assert_eq!(merged.channel(0)[0], 0.0);
        assert_eq!(merged.channel(0)[299], 0.0);
        assert!((merged.channel(0)[150] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_chunk_list_fails() {
        assert!(merge_to_target(&[], 5.0, &AudioProcessingOptions::default(), 1.0).is_err());
    }

    #[tokio::test]
    async fn test_milestones_increase_monotonically() {
        struct Fixed;

        #[async_trait::async_trait]
        impl AudioDecodeStrategy for Fixed {
            fn name(&self) -> &str {
                "fixed"
            }

            async fn decode(&self, _audio: &MediaBlob) -> StitchResult<Vec<PcmBuffer>> {
                Ok(vec![tone(100, 10.0)])
            }
        }

        let seen = Mutex::new(Vec::new());
        let preparer = AudioPreparer::new(vec![Box::new(Fixed)], 1.0);
        let options = AudioProcessingOptions {
            fade_in_secs: 1.0,
            ..Default::default()
        };
        let audio = preparer
            .prepare(&MediaBlob::new(vec![0u8]), 10.0, &options, &|m| {
                seen.lock().unwrap().push(m.percent())
            })
            .await
            .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![10, 40, 70, 90, 100]);

        let left = audio.buffer.channel(0);
        assert_eq!(left[0], 0.0);
        assert!((left[100] - 0.8).abs() < 1e-6);
    }
}
