//! Structured logging for one recognition attempt.
//!
//! Every event is emitted inside the attempt's span, so the job id,
//! attempt number and storage backend are attached once rather than
//! repeated on each line.

use tracing::{error, info, warn, Span};

use vrec_db::{Claim, DbError};
use vrec_models::{Job, JobId};
use vrec_recognition::RecognitionOutcome;

use crate::error::WorkerError;

/// Lifecycle events of a claimed job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    attempt: u32,
    storage: String,
    video_ref: String,
}

impl JobLogger {
    /// Logger for `job` running under `claim`.
    pub fn new(job: &Job, claim: &Claim) -> Self {
        Self {
            job_id: job.id,
            attempt: claim.attempt,
            storage: job.storage_name.clone(),
            video_ref: job.video_ref.clone(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Span wrapping the attempt, including pipeline logs.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "recognition_job",
            job_id = %self.job_id,
            attempt = self.attempt,
            storage = %self.storage,
        )
    }

    pub fn started(&self) {
        info!(video_ref = %self.video_ref, "Recognition attempt started");
    }

    pub fn fetched(&self, bytes: usize) {
        info!(bytes, "Fetched video");
    }

    pub fn recognized(&self, outcome: &RecognitionOutcome, elapsed_secs: f64) {
        info!(
            frames = outcome.stats.frames,
            failed_frames = outcome.stats.failed_frames,
            phrases = outcome.result.found_phrases.len(),
            elapsed_secs,
            "Job recognized"
        );
    }

    pub fn failed(&self, err: &WorkerError) {
        error!(kind = err.kind(), error = %err, "Job failed");
    }

    /// Shutdown interrupted the attempt; the job keeps its claim.
    pub fn interrupted(&self) {
        warn!("Attempt interrupted by shutdown, job left for stale re-selection");
    }

    /// Another scheduler re-claimed the job before `what` was written.
    pub fn claim_lost(&self, what: &str) {
        warn!("Claim lost before the {} was stored", what);
    }

    pub fn store_failed(&self, what: &str, err: &DbError) {
        error!(error = %err, "Failed to store the {}", what);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vrec_models::{NewJob, RuleSet};

    use super::*;

    #[test]
    fn test_logger_carries_claim_attempt() {
        let job = NewJob::uploaded("2024/a.mp4", RuleSet::default_triage()).into_job(JobId(42), Utc::now());
        let claim = Claim {
            job_id: job.id,
            started_at: Utc::now(),
            attempt: 2,
        };

        let logger = JobLogger::new(&job, &claim);
        assert_eq!(logger.job_id(), JobId(42));
        assert_eq!(logger.attempt(), 2);
    }
}
