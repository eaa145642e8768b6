//! In-process job store.
//!
//! Same compare-and-set rules as the Postgres store, guarded by one mutex.
//! Used by tests and by single-process deployments without a database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use vrec_models::{Job, JobId, JobStatus, NewJob, StorageStatus};

use crate::error::DbResult;
use crate::repository::{repeat_exceeded_message, Claim, ClaimOutcome, JobRepository, SelectionPolicy};

#[derive(Debug, Default)]
struct Jobs {
    next_id: i64,
    rows: BTreeMap<JobId, Job>,
}

/// [`JobRepository`] backed by a map in memory. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryJobRepository {
    jobs: Mutex<Jobs>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored job. Test setup only needs this to age claims.
    pub async fn put(&self, job: Job) {
        let mut jobs = self.jobs.lock().await;
        jobs.next_id = jobs.next_id.max(job.id.get());
        jobs.rows.insert(job.id, job);
    }

    /// Snapshot of every job, ordered by id.
    pub async fn all(&self) -> Vec<Job> {
        self.jobs.lock().await.rows.values().cloned().collect()
    }
}

/// The row still looks exactly like the snapshot the caller selected.
fn unchanged(current: &Job, seen: &Job) -> bool {
    current.status == JobStatus::Uploaded
        && current.storage_status == StorageStatus::Uploaded
        && current.recognition_started_at == seen.recognition_started_at
        && current.number_of_repeats == seen.number_of_repeats
}

fn holds_claim(current: &Job, claim: &Claim) -> bool {
    current.status == JobStatus::Uploaded && current.recognition_started_at == Some(claim.started_at)
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn insert(&self, job: NewJob) -> DbResult<Job> {
        let mut jobs = self.jobs.lock().await;
        jobs.next_id += 1;
        let id = JobId(jobs.next_id);
        let job = job.into_job(id, Utc::now());
        jobs.rows.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> DbResult<Option<Job>> {
        Ok(self.jobs.lock().await.rows.get(&id).cloned())
    }

    async fn select_eligible(&self, policy: &SelectionPolicy, now: DateTime<Utc>) -> DbResult<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut eligible: Vec<Job> = jobs
            .rows
            .values()
            .filter(|job| job.is_eligible(now, policy.stale_timeout, policy.max_repeats))
            .cloned()
            .collect();
        eligible.sort_by_key(|job| (job.created_at, job.id));
        eligible.truncate(policy.limit);
        Ok(eligible)
    }

    async fn try_claim(&self, job: &Job, max_repeats: u32, now: DateTime<Utc>) -> DbResult<ClaimOutcome> {
        let mut jobs = self.jobs.lock().await;
        let Some(current) = jobs.rows.get_mut(&job.id) else {
            return Ok(ClaimOutcome::Lost);
        };
        if !unchanged(current, job) {
            return Ok(ClaimOutcome::Lost);
        }

        if current.repeats_exhausted(max_repeats) {
            current.status = JobStatus::Exception;
            current.recognition_completed_at = Some(now);
            current.exception_text = Some(repeat_exceeded_message(current.number_of_repeats, max_repeats));
            return Ok(ClaimOutcome::RepeatExceeded {
                repeats: current.number_of_repeats,
                max_repeats,
            });
        }

        current.recognition_started_at = Some(now);
        current.number_of_repeats += 1;
        Ok(ClaimOutcome::Claimed(Claim {
            job_id: current.id,
            started_at: now,
            attempt: current.number_of_repeats,
        }))
    }

    async fn complete(&self, claim: &Claim, recognition_text: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let mut jobs = self.jobs.lock().await;
        match jobs.rows.get_mut(&claim.job_id) {
            Some(current) if holds_claim(current, claim) => {
                current.status = JobStatus::Recognized;
                current.recognition_text = Some(recognition_text.to_string());
                current.recognition_completed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, claim: &Claim, exception_text: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let mut jobs = self.jobs.lock().await;
        match jobs.rows.get_mut(&claim.job_id) {
            Some(current) if holds_claim(current, claim) => {
                current.status = JobStatus::Exception;
                current.exception_text = Some(exception_text.to_string());
                current.recognition_completed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use vrec_models::RuleSet;

    use super::*;

    fn upload(name: &str) -> NewJob {
        NewJob::uploaded(name, RuleSet::default_triage())
    }

    fn policy() -> SelectionPolicy {
        SelectionPolicy {
            stale_timeout: Duration::seconds(1800),
            max_repeats: 3,
            limit: 10,
        }
    }

    #[tokio::test]
    async fn test_select_returns_fresh_uploads_oldest_first() {
        let repo = MemoryJobRepository::new();
        let a = repo.insert(upload("a.mp4")).await.unwrap();
        let b = repo.insert(upload("b.mp4")).await.unwrap();

        let selected = repo.select_eligible(&policy(), Utc::now()).await.unwrap();
        let ids: Vec<_> = selected.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_select_respects_limit() {
        let repo = MemoryJobRepository::new();
        for i in 0..5 {
            repo.insert(upload(&format!("{i}.mp4"))).await.unwrap();
        }
        let policy = SelectionPolicy { limit: 2, ..policy() };
        assert_eq!(repo.select_eligible(&policy, Utc::now()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fresh_claim_hides_job_until_stale() {
        let repo = MemoryJobRepository::new();
        let job = repo.insert(upload("a.mp4")).await.unwrap();
        let now = Utc::now();

        let outcome = repo.try_claim(&job, 3, now).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed(c) if c.attempt == 1));

        assert!(repo.select_eligible(&policy(), now).await.unwrap().is_empty());
        let later = now + Duration::seconds(1801);
        assert_eq!(repo.select_eligible(&policy(), later).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let repo = Arc::new(MemoryJobRepository::new());
        let job = repo.insert(upload("a.mp4")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            let job = job.clone();
            handles.push(tokio::spawn(async move {
                repo.try_claim(&job, 3, Utc::now()).await.unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ClaimOutcome::Claimed(_)) {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
        assert_eq!(repo.get(job.id).await.unwrap().unwrap().number_of_repeats, 1);
    }

    #[tokio::test]
    async fn test_exhausted_job_moves_to_exception() {
        let repo = MemoryJobRepository::new();
        let mut job = repo.insert(upload("a.mp4")).await.unwrap();
        let now = Utc::now();
        job.number_of_repeats = 3;
        job.recognition_started_at = Some(now - Duration::hours(2));
        repo.put(job.clone()).await;

        let selected = repo.select_eligible(&policy(), now).await.unwrap();
        assert_eq!(selected.len(), 1);

        let outcome = repo.try_claim(&selected[0], 3, now).await.unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::RepeatExceeded {
                repeats: 3,
                max_repeats: 3
            }
        );

        let stored = repo.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Exception);
        assert_eq!(stored.number_of_repeats, 3);
        assert_eq!(stored.recognition_completed_at, Some(now));
        assert!(stored.exception_text.unwrap().starts_with("RepeatExceeded"));
    }

    #[tokio::test]
    async fn test_complete_requires_current_claim() {
        let repo = MemoryJobRepository::new();
        let job = repo.insert(upload("a.mp4")).await.unwrap();
        let t0 = Utc::now();

        let ClaimOutcome::Claimed(first) = repo.try_claim(&job, 3, t0).await.unwrap() else {
            panic!("expected claim");
        };

        // The first claim goes stale and another scheduler takes over.
        let stale_view = repo.get(job.id).await.unwrap().unwrap();
        let t1 = t0 + Duration::seconds(1801);
        let ClaimOutcome::Claimed(second) = repo.try_claim(&stale_view, 3, t1).await.unwrap() else {
            panic!("expected reclaim");
        };
        assert_eq!(second.attempt, 2);

        assert!(!repo.complete(&first, "late", t1).await.unwrap());
        assert!(repo.complete(&second, "error", t1).await.unwrap());
        assert!(!repo.fail(&second, "boom", t1).await.unwrap());

        let stored = repo.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Recognized);
        assert_eq!(stored.recognition_text.as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn test_deleted_storage_is_never_selected() {
        let repo = MemoryJobRepository::new();
        let mut job = repo.insert(upload("a.mp4")).await.unwrap();
        job.storage_status = StorageStatus::Deleted;
        repo.put(job).await;

        assert!(repo.select_eligible(&policy(), Utc::now()).await.unwrap().is_empty());
    }
}
