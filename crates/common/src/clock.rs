//! Time-base utilities for stream re-timing.
//!
//! Every written video frame sits on a fixed grid of `1/fps` slots. Grid
//! positions are kept as integer slot indices and only converted to
//! seconds or nanoseconds at the edges, so timestamps stay exact
//! multiples of the frame interval.

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A fixed output frame rate in whole frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate(u32);

impl FrameRate {
    /// Create a frame rate, clamping to at least 1 fps.
    pub fn new(fps: u32) -> Self {
        Self(fps.max(1))
    }

    /// Frames per second.
    pub fn fps(self) -> u32 {
        self.0
    }

    /// Nearest grid slot for a timestamp in seconds.
    pub fn nearest_slot(self, secs: f64) -> i64 {
        (secs * self.0 as f64).round() as i64
    }

    /// Timestamp of a grid slot in seconds.
    pub fn slot_to_secs(self, slot: i64) -> f64 {
        slot as f64 / self.0 as f64
    }

    /// Timestamp of a grid slot in nanoseconds. Negative slots clamp to 0.
    pub fn slot_to_ns(self, slot: i64) -> u64 {
        let slot = slot.max(0) as u128;
        (slot * NANOS_PER_SEC as u128 / self.0 as u128) as u64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(60)
    }
}

/// Convert a nanosecond value to seconds.
pub fn ns_to_secs(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_SEC as f64
}

/// Gate for periodic progress reports driven by a running counter.
///
/// Fires on the first call and then once every `stride` units.
#[derive(Debug)]
pub struct ProgressThrottle {
    stride: u64,
    last_fired: Option<u64>,
}

impl ProgressThrottle {
    /// Create a throttle that fires every `stride` units (at least 1).
    pub fn new(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
            last_fired: None,
        }
    }

    /// Check whether a report is due at `count`.
    /// Returns true and updates internal state if ready.
    pub fn should_fire(&mut self, count: u64) -> bool {
        match self.last_fired {
            None => {
                self.last_fired = Some(count);
                true
            }
            Some(last) if count >= last + self.stride => {
                self.last_fired = Some(count);
                true
            }
            _ => false,
        }
    }
}
