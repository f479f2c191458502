//! ClipStitch Common Utilities
//!
//! Shared infrastructure for all ClipStitch crates:
//! - Error types and result aliases
//! - Time-base utilities for placing samples on a fixed frame grid
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
