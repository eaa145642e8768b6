//! Recognition job records.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::job_status::{JobStatus, StorageStatus};
use crate::rules::RuleSet;

/// Primary key of a job row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl JobId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recognition job as stored in the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Row id
    pub id: JobId,

    /// Identifier assigned by the ingest side
    pub external_job_id: String,

    pub status: JobStatus,

    pub storage_status: StorageStatus,

    /// Storage backend holding the video (`Default` for the local store)
    pub storage_name: String,

    /// Location of the video inside its storage backend
    pub video_ref: String,

    pub created_at: DateTime<Utc>,

    /// Set on every claim; cleared never
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition_started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition_completed_at: Option<DateTime<Utc>>,

    pub rule_set: RuleSet,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognition_text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_text: Option<String>,

    /// Number of claims made so far
    #[serde(default)]
    pub number_of_repeats: u32,
}

impl Job {
    /// Whether an earlier claim has exceeded `stale_timeout` without a
    /// terminal write. A job that was never claimed is not stale.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_timeout: Duration) -> bool {
        match self.recognition_started_at {
            Some(started) => now - started > stale_timeout,
            None => false,
        }
    }

    /// Whether a scheduler pass may select this job.
    pub fn is_eligible(&self, now: DateTime<Utc>, stale_timeout: Duration, max_repeats: u32) -> bool {
        self.status == JobStatus::Uploaded
            && self.storage_status == StorageStatus::Uploaded
            && (self.recognition_started_at.is_none() || self.is_stale(now, stale_timeout))
            && self.number_of_repeats <= max_repeats
    }

    /// Whether claiming once more would exceed `max_repeats`.
    pub fn repeats_exhausted(&self, max_repeats: u32) -> bool {
        self.number_of_repeats + 1 > max_repeats
    }
}

/// Fields supplied when the ingest side registers a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub external_job_id: String,
    pub storage_name: String,
    pub video_ref: String,
    pub rule_set: RuleSet,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub storage_status: StorageStatus,
}

impl NewJob {
    /// A job whose video is already stored and ready for recognition.
    pub fn uploaded(video_ref: impl Into<String>, rule_set: RuleSet) -> Self {
        Self {
            external_job_id: Uuid::new_v4().to_string(),
            storage_name: "Default".to_string(),
            video_ref: video_ref.into(),
            rule_set,
            status: JobStatus::Uploaded,
            storage_status: StorageStatus::Uploaded,
        }
    }

    pub fn with_storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = storage_name.into();
        self
    }

    /// Materialize the row a store would create.
    pub fn into_job(self, id: JobId, created_at: DateTime<Utc>) -> Job {
        Job {
            id,
            external_job_id: self.external_job_id,
            status: self.status,
            storage_status: self.storage_status,
            storage_name: self.storage_name,
            video_ref: self.video_ref,
            created_at,
            recognition_started_at: None,
            recognition_completed_at: None,
            rule_set: self.rule_set,
            recognition_text: None,
            exception_text: None,
            number_of_repeats: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded_job() -> Job {
        NewJob::uploaded("video.mp4", RuleSet::default_triage()).into_job(JobId(1), Utc::now())
    }

    #[test]
    fn test_fresh_uploaded_job_is_eligible() {
        let job = uploaded_job();
        assert!(job.is_eligible(Utc::now(), Duration::seconds(1800), 3));
        assert!(!job.is_stale(Utc::now(), Duration::seconds(1800)));
    }

    #[test]
    fn test_running_job_becomes_eligible_once_stale() {
        let mut job = uploaded_job();
        job.number_of_repeats = 1;
        job.recognition_started_at = Some(Utc::now() - Duration::seconds(200));

        assert!(!job.is_eligible(Utc::now(), Duration::seconds(300), 3));
        assert!(job.is_eligible(Utc::now(), Duration::seconds(100), 3));
    }

    #[test]
    fn test_repeat_boundary() {
        let mut job = uploaded_job();
        job.number_of_repeats = 3;
        job.recognition_started_at = Some(Utc::now() - Duration::seconds(4000));

        // Selected at the ceiling, but the next claim would exceed it.
        assert!(job.is_eligible(Utc::now(), Duration::seconds(1800), 3));
        assert!(job.repeats_exhausted(3));

        job.number_of_repeats = 2;
        assert!(!job.repeats_exhausted(3));

        job.number_of_repeats = 4;
        assert!(!job.is_eligible(Utc::now(), Duration::seconds(1800), 3));
    }

    #[test]
    fn test_other_statuses_are_not_eligible() {
        let mut job = uploaded_job();
        job.status = JobStatus::Created;
        assert!(!job.is_eligible(Utc::now(), Duration::seconds(1800), 3));

        let mut job = uploaded_job();
        job.storage_status = StorageStatus::Deleted;
        assert!(!job.is_eligible(Utc::now(), Duration::seconds(1800), 3));
    }
}
