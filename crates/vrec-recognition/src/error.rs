//! Recognition pipeline errors.

use thiserror::Error;

use vrec_media::MediaError;
use vrec_ocr::OcrError;

pub type PipelineResult<T> = Result<T, RecognitionError>;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Recognition timed out after {0} seconds")]
    TimeoutExceeded(u64),

    #[error("Recognition cancelled")]
    Cancelled,

    /// A single frame could not be classified. Absorbed by the dispatcher.
    #[error("Classification failed for frame {frame}: {message}")]
    ClassificationWorkerFailure { frame: u64, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecognitionError {
    pub fn worker_failure(frame: u64, message: impl Into<String>) -> Self {
        Self::ClassificationWorkerFailure {
            frame,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The video could not be probed or decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, RecognitionError::Media(e) if e.is_decode_error())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RecognitionError::TimeoutExceeded(_))
    }
}
