//! Job store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use vrec_models::{Job, JobId, NewJob};

use crate::error::DbResult;

/// Which jobs a scheduler pass may pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    /// A claim older than this without a terminal write is considered dead.
    pub stale_timeout: Duration,
    /// Claims allowed per job.
    pub max_repeats: u32,
    /// Jobs returned per pass.
    pub limit: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            stale_timeout: Duration::seconds(1800),
            max_repeats: 3,
            limit: 16,
        }
    }
}

/// A successful claim. Terminal writes are accepted only while the row
/// still carries `started_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    /// 1-based claim count after this claim.
    pub attempt: u32,
}

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(Claim),
    /// Claiming again would exceed the ceiling; the job was moved to
    /// Exception instead.
    RepeatExceeded { repeats: u32, max_repeats: u32 },
    /// The row changed since it was selected; someone else owns it now.
    Lost,
}

/// Exception text written when the repeat ceiling is hit.
pub fn repeat_exceeded_message(repeats: u32, max_repeats: u32) -> String {
    format!(
        "RepeatExceeded: recognition already attempted {} times (limit {})",
        repeats, max_repeats
    )
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Register a new job.
    async fn insert(&self, job: NewJob) -> DbResult<Job>;

    async fn get(&self, id: JobId) -> DbResult<Option<Job>>;

    /// Uploaded jobs never claimed or whose claim went stale, within the
    /// repeat ceiling, oldest first.
    async fn select_eligible(&self, policy: &SelectionPolicy, now: DateTime<Utc>) -> DbResult<Vec<Job>>;

    /// Claim `job` if its row is unchanged since it was read.
    async fn try_claim(&self, job: &Job, max_repeats: u32, now: DateTime<Utc>) -> DbResult<ClaimOutcome>;

    /// Mark the claimed job Recognized. `false` if the claim was lost.
    async fn complete(&self, claim: &Claim, recognition_text: &str, now: DateTime<Utc>) -> DbResult<bool>;

    /// Mark the claimed job Exception. `false` if the claim was lost.
    async fn fail(&self, claim: &Claim, exception_text: &str, now: DateTime<Utc>) -> DbResult<bool>;
}
