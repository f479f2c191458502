//! Progress reporting and stitch output.

use serde::{Deserialize, Serialize};

/// MIME type of every stitch output.
pub const OUTPUT_MIME_TYPE: &str = "video/mp4";

/// Lifecycle of a stitch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchStatus {
    Idle,
    Processing,
    Complete,
    Error,
}

impl StitchStatus {
    /// `complete` and `error` end an invocation; there is no resume.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Progress report delivered to the caller's callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchProgress {
    pub status: StitchStatus,

    /// Human-readable description of the current step.
    pub message: String,

    /// Overall progress in percent [0, 100].
    pub progress: f64,

    /// Zero-based index of the clip being processed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_clip_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_clips: Option<usize>,

    /// Error message for `error` reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StitchProgress {
    pub fn idle() -> Self {
        Self {
            status: StitchStatus::Idle,
            message: String::new(),
            progress: 0.0,
            current_clip_index: None,
            total_clips: None,
            error: None,
        }
    }
}

/// Progress callback. Runs synchronously and must not block.
pub type ProgressCallback = Box<dyn Fn(StitchProgress) + Send + Sync>;

/// The stitched MP4 file.
#[derive(Clone, PartialEq, Eq)]
pub struct StitchOutput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl StitchOutput {
    pub fn mp4(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: OUTPUT_MIME_TYPE,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for StitchOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StitchOutput")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_serializes_without_empty_fields() {
        let json = serde_json::to_string(&StitchProgress::idle()).unwrap();
        assert_eq!(json, r#"{"status":"idle","message":"","progress":0.0}"#);
    }

    #[test]
    fn test_terminal_states() {
        assert!(StitchStatus::Complete.is_terminal());
        assert!(StitchStatus::Error.is_terminal());
        assert!(!StitchStatus::Processing.is_terminal());
    }

    #[test]
    fn test_output_mime() {
        let output = StitchOutput::mp4(vec![0, 0, 0, 24]);
        assert_eq!(output.mime_type, "video/mp4");
        assert_eq!(output.len(), 4);
    }
}
