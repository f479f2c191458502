//! Decoded PCM audio and audio processing options.

use serde::{Deserialize, Serialize};

/// Planar multichannel PCM audio with `f32` samples in `[-1.0, 1.0]`.
///
/// Every channel holds the same number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Build from planar channel data. Channels are truncated to the
    /// shortest one so the frame count is consistent.
    pub fn from_planar(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in &mut channels {
            channel.truncate(frames);
        }
        Self {
            sample_rate: sample_rate.max(1),
            channels,
        }
    }

    /// Build from interleaved samples.
    pub fn from_interleaved(sample_rate: u32, channel_count: usize, samples: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        Self::from_planar(sample_rate, channels)
    }

    /// A silent buffer of `frames` frames.
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: vec![vec![0.0; frames]; channel_count.max(1)],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Shorten to at most `frames` frames.
    pub fn truncate_frames(&mut self, frames: usize) {
        for channel in &mut self.channels {
            channel.truncate(frames);
        }
    }

    /// Interleave `len` frames starting at `start` into `out`.
    pub fn interleave_into(&self, start: usize, len: usize, out: &mut Vec<f32>) {
        let end = (start + len).min(self.frames());
        out.reserve((end.saturating_sub(start)) * self.channels.len());
        for frame in start..end {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
    }
}

/// Audio ready to be muxed: one merged buffer and its duration.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub buffer: PcmBuffer,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

impl DecodedAudio {
    pub fn new(buffer: PcmBuffer) -> Self {
        Self {
            sample_rate: buffer.sample_rate(),
            duration_secs: buffer.duration_secs(),
            buffer,
        }
    }

    /// Trim to at most `max_secs`, keeping `duration_secs` in sync.
    pub fn trim_to(&mut self, max_secs: f64) {
        let max_frames = (max_secs.max(0.0) * self.sample_rate as f64).round() as usize;
        if max_frames < self.buffer.frames() {
            self.buffer.truncate_frames(max_frames);
            self.duration_secs = self.buffer.duration_secs();
        }
    }
}

/// Offset and fade settings applied while preparing audio, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioProcessingOptions {
    /// Positive delays the audio (leading silence); negative skips into it.
    #[serde(default)]
    pub offset_secs: f64,

    #[serde(default)]
    pub fade_in_secs: f64,

    #[serde(default)]
    pub fade_out_secs: f64,
}
