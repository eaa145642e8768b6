//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing or decoding video.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Decode failed: {message}")]
    Decode {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a decode failure error.
    pub fn decode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Decode {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame(message.into())
    }

    pub fn preprocess_failed(message: impl Into<String>) -> Self {
        Self::Preprocess(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the input itself could not be decoded (as opposed to a
    /// missing tool or an I/O fault on our side).
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            MediaError::Decode { .. }
                | MediaError::FfprobeFailed { .. }
                | MediaError::InvalidVideo(_)
                | MediaError::JsonParse(_)
        )
    }
}
