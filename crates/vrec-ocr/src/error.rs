//! OCR error types.

use thiserror::Error;

pub type OcrResult<T> = Result<T, OcrError>;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR binary not found: {0}")]
    BinaryNotFound(String),

    #[error("OCR failed: {message}")]
    Failed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("OCR timed out after {0} seconds")]
    Timeout(u64),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("Invalid OCR output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::Failed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }
}
