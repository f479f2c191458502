//! Error types shared across ClipStitch crates.

/// Top-level error type for ClipStitch operations.
#[derive(Debug, thiserror::Error)]
pub enum StitchError {
    #[error("No videos to stitch")]
    NoClips,

    #[error("Device cannot encode {message}")]
    UnsupportedConfiguration { message: String },

    #[error("Probe error: {message}")]
    Probe { message: String },

    #[error("Decode error in clip {clip_index}: {message}")]
    Decode { clip_index: usize, message: String },

    #[error("Audio decode error: {message}")]
    AudioDecode { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Mux error: {message}")]
    Mux { message: String },

    #[error("Output buffer missing after finalize")]
    MissingOutput,

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StitchError.
pub type StitchResult<T> = Result<T, StitchError>;

impl StitchError {
    pub fn unsupported_configuration(msg: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn decode(clip_index: usize, msg: impl Into<String>) -> Self {
        Self::Decode {
            clip_index,
            message: msg.into(),
        }
    }

    pub fn audio_decode(msg: impl Into<String>) -> Self {
        Self::AudioDecode {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux {
            message: msg.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error was raised before any encoder or container was allocated.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NoClips | Self::UnsupportedConfiguration { .. } | Self::Config { .. }
        )
    }
}
