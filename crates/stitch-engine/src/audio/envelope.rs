//! Buffer merging, looping, and fade envelopes.

use clipstitch_model::PcmBuffer;

/// Merge decoded chunks into one buffer of exactly `total_frames` frames.
///
/// The output takes the sample rate and channel count of the first chunk.
/// A positive `offset_frames` leaves that much silence at the front; a
/// negative one skips that many source frames. When the source runs out
/// before the buffer is full, the chunks are repeated from their start
/// (a hard loop).
pub fn merge_chunks(chunks: &[PcmBuffer], total_frames: usize, offset_frames: i64) -> PcmBuffer {
    let Some(first) = chunks.first() else {
        return PcmBuffer::silent(1, 1, total_frames);
    };
    let mut merged = PcmBuffer::silent(first.sample_rate(), first.channel_count(), total_frames);

    let mut write_pos = offset_frames.max(0) as usize;
    let mut skip = offset_frames.min(0).unsigned_abs() as usize;

    for chunk in chunks {
        if write_pos >= total_frames {
            break;
        }
        let frames = chunk.frames();
        if skip >= frames {
            skip -= frames;
            continue;
        }
        let count = (frames - skip).min(total_frames - write_pos);
        copy_frames(chunk, skip, &mut merged, write_pos, count);
        write_pos += count;
        skip = 0;
    }

    let source_frames: usize = chunks.iter().map(PcmBuffer::frames).sum();
    if source_frames > 0 && write_pos < total_frames {
        tracing::debug!(
            filled = write_pos,
            total = total_frames,
            "Audio shorter than target; looping"
        );
        while write_pos < total_frames {
            for chunk in chunks {
                if write_pos >= total_frames {
                    break;
                }
                let count = chunk.frames().min(total_frames - write_pos);
                copy_frames(chunk, 0, &mut merged, write_pos, count);
                write_pos += count;
            }
        }
    }

    merged
}

fn copy_frames(src: &PcmBuffer, src_start: usize, dst: &mut PcmBuffer, dst_start: usize, count: usize) {
    if count == 0 || src.channel_count() == 0 {
        return;
    }
    let last_src_channel = src.channel_count() - 1;
    for (index, out) in dst.channels_mut().iter_mut().enumerate() {
        let input = src.channel(index.min(last_src_channel));
        out[dst_start..dst_start + count].copy_from_slice(&input[src_start..src_start + count]);
    }
}

/// Fade lengths in frames after fitting them into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeFrames {
    pub fade_in: usize,
    pub fade_out: usize,
}

/// Convert fade durations to frame counts, scaling both down
/// proportionally when together they exceed the buffer.
///
/// Frame counts are computed in `f64`, so arbitrarily long fades cannot
/// overflow; the result always fits in `total_frames`.
pub fn fit_fades(fade_in_secs: f64, fade_out_secs: f64, sample_rate: u32, total_frames: usize) -> FadeFrames {
    let usable = |secs: f64| if secs.is_finite() && secs > 0.0 { secs } else { 0.0 };
    let in_secs = usable(fade_in_secs);
    let out_secs = usable(fade_out_secs);
    let rate = f64::from(sample_rate);
    let total = total_frames as f64;

    let in_frames = (in_secs * rate).round();
    let out_frames = (out_secs * rate).round();
    if in_frames + out_frames <= total {
        return FadeFrames {
            fade_in: in_frames as usize,
            fade_out: out_frames as usize,
        };
    }

    // Halved before summing so two huge durations cannot reach infinity.
    let share_in = (in_secs / 2.0) / (in_secs / 2.0 + out_secs / 2.0);
    let scaled_in = ((share_in * total).round() as usize).min(total_frames);
    FadeFrames {
        fade_in: scaled_in,
        fade_out: total_frames - scaled_in,
    }
}

/// Apply linear fade-in (0→1) and fade-out (1→0) ramps in place.
pub fn apply_fades(buffer: &mut PcmBuffer, fades: FadeFrames) {
    let total = buffer.frames();
    let fade_in = fades.fade_in.min(total);
    let fade_out = fades.fade_out.min(total);

    for channel in buffer.channels_mut() {
        for (i, sample) in channel.iter_mut().take(fade_in).enumerate() {
            *sample *= i as f32 / fade_in as f32;
        }
        let tail_start = total - fade_out;
        for (i, sample) in channel[tail_start..].iter_mut().enumerate() {
            *sample *= (fade_out - 1 - i) as f32 / fade_out as f32;
        }
    }
}
