//! ClipStitch Data Model
//!
//! Defines the data contracts shared by the stitching pipeline:
//! - **Media:** Opaque clip blobs and the metadata probed from them
//! - **Encode:** Resolved output resolution, bitrate, codec profile, and frame rate
//! - **Audio:** Planar PCM buffers and audio processing options
//! - **Progress:** The single progress value exposed to callers, and the final output
//!
//! All values are created fresh per stitch invocation; nothing here is
//! shared between invocations.

pub mod audio;
pub mod encode;
pub mod media;
pub mod progress;

pub use audio::*;
pub use encode::*;
pub use media::*;
pub use progress::*;
