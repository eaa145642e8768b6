//! Worker error types.
//!
//! The display form of each variant is what gets persisted as a job's
//! exception text. [`WorkerError::Cancelled`] is never persisted: an
//! interrupted job keeps its claim until it goes stale.

use thiserror::Error;

use vrec_db::DbError;
use vrec_recognition::RecognitionError;
use vrec_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("StorageNotFound: {0}")]
    StorageNotFound(String),

    #[error("DecodeError: {0}")]
    Decode(String),

    #[error("TimeoutExceeded: recognition did not finish within {0} seconds")]
    TimeoutExceeded(u64),

    #[error("RepeatExceeded: {repeats} of {max_repeats} attempts already used")]
    RepeatExceeded { repeats: u32, max_repeats: u32 },

    #[error("Cancelled: worker shutting down")]
    Cancelled,

    #[error("Recognition failed: {0}")]
    Recognition(RecognitionError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Job store error: {0}")]
    Db(#[from] DbError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Text stored in the job's exception column.
    pub fn exception_text(&self) -> String {
        self.to_string()
    }

    /// Whether the attempt was interrupted rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::StorageNotFound(_) => "storage_not_found",
            WorkerError::Decode(_) => "decode",
            WorkerError::TimeoutExceeded(_) => "timeout",
            WorkerError::RepeatExceeded { .. } => "repeat_exceeded",
            WorkerError::Cancelled => "cancelled",
            WorkerError::Recognition(_) => "recognition",
            WorkerError::Storage(_) => "storage",
            WorkerError::Db(_) => "db",
            WorkerError::ConfigError(_) => "config",
        }
    }
}

impl From<RecognitionError> for WorkerError {
    fn from(e: RecognitionError) -> Self {
        match e {
            RecognitionError::TimeoutExceeded(secs) => WorkerError::TimeoutExceeded(secs),
            RecognitionError::Cancelled => WorkerError::Cancelled,
            e if e.is_decode_error() => WorkerError::Decode(e.to_string()),
            e => WorkerError::Recognition(e),
        }
    }
}

impl From<StorageError> for WorkerError {
    fn from(e: StorageError) -> Self {
        if e.is_not_found() {
            WorkerError::StorageNotFound(e.to_string())
        } else {
            WorkerError::Storage(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use vrec_media::MediaError;

    use super::*;

    #[test]
    fn test_recognition_errors_map_to_job_errors() {
        let timeout: WorkerError = RecognitionError::TimeoutExceeded(1800).into();
        assert_eq!(
            timeout.exception_text(),
            "TimeoutExceeded: recognition did not finish within 1800 seconds"
        );

        let decode: WorkerError = RecognitionError::Media(MediaError::InvalidVideo("empty".into())).into();
        assert!(matches!(decode, WorkerError::Decode(_)));
        assert!(decode.exception_text().starts_with("DecodeError: "));

        let cancelled: WorkerError = RecognitionError::Cancelled.into();
        assert!(cancelled.is_cancelled());
        assert!(!timeout.is_cancelled());
    }

    #[test]
    fn test_missing_video_maps_to_storage_not_found() {
        let err: WorkerError = StorageError::not_found("2024/a.mp4").into();
        assert_eq!(err.kind(), "storage_not_found");
        assert!(err.exception_text().starts_with("StorageNotFound: "));

        let err: WorkerError = StorageError::UnknownBackend("S3".into()).into();
        assert_eq!(err.kind(), "storage");
    }
}
