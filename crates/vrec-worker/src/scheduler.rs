//! Job scheduler.
//!
//! Each pass selects eligible jobs, claims as many as there are free
//! execution slots and spawns them. Several schedulers may poll the same
//! store; the conditional claim guarantees each claim has one owner.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vrec_db::{ClaimOutcome, JobRepository};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics::{record_job_claimed, record_job_failed};
use crate::processor::JobProcessor;

/// What one pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub selected: usize,
    pub claimed: usize,
    /// Jobs moved to Exception because their repeats ran out.
    pub repeat_exceeded: usize,
    /// Jobs another scheduler claimed first.
    pub lost: usize,
}

/// Polls the job store and runs claimed jobs with bounded concurrency.
pub struct JobScheduler {
    config: WorkerConfig,
    repo: Arc<dyn JobRepository>,
    processor: Arc<JobProcessor>,
    job_semaphore: Arc<Semaphore>,
    max_jobs: usize,
    shutdown: watch::Sender<bool>,
    name: String,
}

impl JobScheduler {
    pub fn new(config: WorkerConfig, repo: Arc<dyn JobRepository>, processor: Arc<JobProcessor>) -> Self {
        let max_jobs = config.max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            repo,
            processor,
            job_semaphore: Arc::new(Semaphore::new(max_jobs)),
            max_jobs,
            shutdown,
            name: format!("scheduler-{}", Uuid::new_v4()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll until shutdown, then wait for interrupted jobs to wind down.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            scheduler = %self.name,
            max_jobs = self.max_jobs,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting job scheduler"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping scheduler");
                    }
                }
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(report) if report.claimed > 0 || report.repeat_exceeded > 0 => {
                            debug!(
                                selected = report.selected,
                                claimed = report.claimed,
                                repeat_exceeded = report.repeat_exceeded,
                                lost = report.lost,
                                "Scheduler pass"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Scheduler pass failed"),
                    }
                }
            }
        }

        info!("Waiting for in-flight jobs to finish...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_idle())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "In-flight jobs did not finish before shutdown timeout"
            );
        }

        info!("Job scheduler stopped");
        Ok(())
    }

    /// One selection and claim pass.
    pub async fn poll_once(&self) -> WorkerResult<PollReport> {
        let free = self.job_semaphore.available_permits();
        if free == 0 || *self.shutdown.borrow() {
            return Ok(PollReport::default());
        }

        let policy = self.config.selection_policy(free);
        let jobs = self.repo.select_eligible(&policy, Utc::now()).await?;
        let mut report = PollReport {
            selected: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            let Ok(permit) = Arc::clone(&self.job_semaphore).try_acquire_owned() else {
                break;
            };

            match self.repo.try_claim(&job, policy.max_repeats, Utc::now()).await? {
                ClaimOutcome::Claimed(claim) => {
                    report.claimed += 1;
                    record_job_claimed();
                    debug!(job_id = %job.id, attempt = claim.attempt, "Claimed job");

                    let processor = Arc::clone(&self.processor);
                    let cancel = self.shutdown.subscribe();
                    tokio::spawn(async move {
                        let _permit = permit;
                        processor.execute(job, claim, cancel).await;
                    });
                }
                ClaimOutcome::RepeatExceeded { repeats, max_repeats } => {
                    report.repeat_exceeded += 1;
                    let err = WorkerError::RepeatExceeded { repeats, max_repeats };
                    record_job_failed(err.kind());
                    warn!(job_id = %job.id, error = %err, "Job failed without recognition");
                }
                ClaimOutcome::Lost => {
                    report.lost += 1;
                    debug!(job_id = %job.id, "Job claimed by another scheduler");
                }
            }
        }

        Ok(report)
    }

    /// Wait until no claimed job is executing.
    pub async fn wait_idle(&self) {
        while self.job_semaphore.available_permits() < self.max_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Stop polling and interrupt in-flight jobs. Interrupted jobs keep
    /// their claim and are retried once it goes stale.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
