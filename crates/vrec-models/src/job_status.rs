//! Job and storage lifecycle statuses.
//!
//! Statuses are persisted as their `as_str` form, which is also the serde
//! representation.

use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recognition job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum JobStatus {
    /// Job row exists, video not yet stored
    #[default]
    Created,
    /// Video stored and waiting for (or undergoing) recognition
    Uploaded,
    /// Recognition finished successfully
    Recognized,
    /// Recognition failed; see the exception text
    Exception,
    /// Job removed by the ingest side
    Deleted,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "Created",
            JobStatus::Uploaded => "Uploaded",
            JobStatus::Recognized => "Recognized",
            JobStatus::Exception => "Exception",
            JobStatus::Deleted => "Deleted",
        }
    }

    /// Check if this is a terminal state for recognition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Recognized | JobStatus::Exception | JobStatus::Deleted
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(JobStatus::Created),
            "Uploaded" => Ok(JobStatus::Uploaded),
            "Recognized" => Ok(JobStatus::Recognized),
            "Exception" => Ok(JobStatus::Exception),
            "Deleted" => Ok(JobStatus::Deleted),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// Status of the stored video backing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum StorageStatus {
    #[default]
    Uploaded,
    Deleted,
    Error,
}

impl StorageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageStatus::Uploaded => "Uploaded",
            StorageStatus::Deleted => "Deleted",
            StorageStatus::Error => "Error",
        }
    }
}

impl std::fmt::Display for StorageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Uploaded" => Ok(StorageStatus::Uploaded),
            "Deleted" => Ok(StorageStatus::Deleted),
            "Error" => Ok(StorageStatus::Error),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// Unknown status string read from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown status: {0}")]
pub struct StatusParseError(pub String);
