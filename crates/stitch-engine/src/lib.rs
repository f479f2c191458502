//! ClipStitch Engine
//!
//! Joins independently produced clips (and an optional soundtrack) into
//! one MP4 with a gap-free, fixed-rate video timeline.
//!
//! # Pipeline
//!
//! ```text
//! clips ──► probe ──► resolve ──┐
//!                               │ (capability gate)
//! audio ──► decode ──► shape ───┤
//!                               ▼
//!                      container.start
//!                               │
//!                   write + close audio track
//!                               │
//!        per clip: decode ─► snap to grid ─► write video
//!                               │
//!                  close video ─► finalize ─► MP4 bytes
//! ```
//!
//! All media work goes through the traits in [`backend`]; the
//! `clipstitch-gst` crate provides the GStreamer implementation.

pub mod audio;
pub mod backend;
pub mod grid;
pub mod preflight;
pub mod probe;
pub mod progress;
pub mod resolve;
pub mod session;
pub mod settings;
pub mod stitch;

pub use backend::*;
pub use preflight::{check_device_support, PreflightReport};
pub use settings::StitchSettings;
pub use stitch::{stitch_videos, StitchRequest, StitchStats};
