//! Output frame grid and the monotonic write cursor.
//!
//! Each clip is laid back-to-back on a single fixed-rate timeline: a clip
//! starts one frame after the last written frame, its own timestamps are
//! shifted so its first sample sits at zero, and every sample is snapped to
//! the nearest grid slot. Samples landing on an already-used slot are
//! dropped, so the output is strictly increasing at exactly the target rate.

use clipstitch_common::clock::FrameRate;

/// Write cursor over the output frame grid.
#[derive(Debug, Clone)]
pub struct FrameGrid {
    rate: FrameRate,
    /// Last written slot; -1 before any write so slot 0 is admissible.
    highest_slot: i64,
}

/// Where a sample landed on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Write the sample at this slot. Each frame ends exactly where the next slot starts.
    Write {
        slot: i64,
        timestamp_ns: u64,
        duration_ns: u64,
    },
    /// The slot is already taken; drop the sample.
    Duplicate { slot: i64 },
}

/// Per-clip normalization state.
#[derive(Debug, Clone, Copy)]
pub struct ClipSegment {
    base_secs: f64,
    min_timestamp_secs: Option<f64>,
}

impl FrameGrid {
    pub fn new(rate: FrameRate) -> Self {
        Self {
            rate,
            highest_slot: -1,
        }
    }

    /// Last written slot, or -1 if nothing has been written.
    pub fn highest_slot(&self) -> i64 {
        self.highest_slot
    }

    /// Duration covered by written frames.
    pub fn written_duration_secs(&self) -> f64 {
        self.rate.slot_to_secs(self.highest_slot + 1)
    }

    /// Begin a clip directly after the last written frame.
    pub fn start_clip(&self) -> ClipSegment {
        ClipSegment {
            base_secs: self.rate.slot_to_secs(self.highest_slot + 1),
            min_timestamp_secs: None,
        }
    }

    /// Snap a timeline position to its slot and test it against the cursor.
    ///
    /// Returns the slot when it lies strictly after the last written one.
    fn quantize_and_test(&self, adjusted_secs: f64) -> Option<i64> {
        let slot = self.rate.nearest_slot(adjusted_secs);
        (slot > self.highest_slot).then_some(slot)
    }

    /// Record a write at `slot`.
    fn commit(&mut self, slot: i64) {
        debug_assert!(slot > self.highest_slot, "grid slots must increase");
        self.highest_slot = self.highest_slot.max(slot);
    }

    /// Place one sample of `segment` and advance the cursor when it is written.
    pub fn place(&mut self, segment: &mut ClipSegment, original_secs: f64) -> Placement {
        let min = *segment.min_timestamp_secs.get_or_insert(original_secs);
        let normalized = original_secs - min;
        let adjusted = segment.base_secs + normalized;

        match self.quantize_and_test(adjusted) {
            Some(slot) => {
                self.commit(slot);
                let timestamp_ns = self.rate.slot_to_ns(slot);
                Placement::Write {
                    slot,
                    timestamp_ns,
                    duration_ns: self.rate.slot_to_ns(slot + 1) - timestamp_ns,
                }
            }
            None => Placement::Duplicate {
                slot: self.rate.nearest_slot(adjusted),
            },
        }
    }
}
