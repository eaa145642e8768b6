//! Execution of one claimed job.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::Instrument;

use vrec_db::{Claim, JobRepository};
use vrec_models::{Job, RecognitionSettings};
use vrec_recognition::{CancelGuard, RecognitionOutcome, VideoRecognizer};
use vrec_storage::{VideoLocation, VideoStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics::{record_job_completed, record_job_failed, record_job_interrupted};

/// How a claimed job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Recognized,
    Failed,
    /// Shutdown stopped the attempt. Nothing was written; the job stays
    /// `Uploaded` and is picked up again once its claim goes stale.
    Interrupted,
    /// Another scheduler took the job over before the result was written.
    ClaimLost,
    /// The terminal write itself failed; the claim will go stale.
    StoreFailed,
}

/// Fetches, recognises and records one job at a time.
pub struct JobProcessor {
    repo: Arc<dyn JobRepository>,
    store: Arc<dyn VideoStore>,
    recognizer: Arc<dyn VideoRecognizer>,
    recognition_timeout: Duration,
    settings: RecognitionSettings,
}

impl JobProcessor {
    /// Stored jobs carry no settings, so every job runs with
    /// [`WorkerConfig::recognition_settings`].
    pub fn new(
        repo: Arc<dyn JobRepository>,
        store: Arc<dyn VideoStore>,
        recognizer: Arc<dyn VideoRecognizer>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            repo,
            store,
            recognizer,
            recognition_timeout: config.recognition_timeout,
            settings: config.recognition_settings(),
        }
    }

    /// Run `job` under `claim` and persist the result or the failure.
    ///
    /// `cancel` flipping to `true` aborts the pipeline without a terminal
    /// write.
    pub async fn execute(&self, job: Job, claim: Claim, cancel: watch::Receiver<bool>) -> JobOutcome {
        let logger = JobLogger::new(&job, &claim);
        let span = logger.span();
        self.execute_logged(job, claim, cancel, logger)
            .instrument(span)
            .await
    }

    async fn execute_logged(
        &self,
        job: Job,
        claim: Claim,
        cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) -> JobOutcome {
        logger.started();
        let started = Instant::now();

        match self.recognize(&job, cancel, &logger).await {
            Ok(outcome) => {
                let summary = outcome.result.summary();
                match self.repo.complete(&claim, &summary, Utc::now()).await {
                    Ok(true) => {
                        let elapsed = started.elapsed().as_secs_f64();
                        record_job_completed(elapsed);
                        logger.recognized(&outcome, elapsed);
                        JobOutcome::Recognized
                    }
                    Ok(false) => {
                        logger.claim_lost("result");
                        JobOutcome::ClaimLost
                    }
                    Err(e) => {
                        logger.store_failed("result", &e);
                        JobOutcome::StoreFailed
                    }
                }
            }
            Err(e) if e.is_cancelled() => {
                record_job_interrupted();
                logger.interrupted();
                JobOutcome::Interrupted
            }
            Err(e) => {
                logger.failed(&e);
                record_job_failed(e.kind());
                match self.repo.fail(&claim, &e.exception_text(), Utc::now()).await {
                    Ok(true) => JobOutcome::Failed,
                    Ok(false) => {
                        logger.claim_lost("failure");
                        JobOutcome::ClaimLost
                    }
                    Err(store_err) => {
                        logger.store_failed("failure", &store_err);
                        JobOutcome::StoreFailed
                    }
                }
            }
        }
    }

    /// Fetch and recognise under one budget.
    async fn recognize(
        &self,
        job: &Job,
        cancel: watch::Receiver<bool>,
        logger: &JobLogger,
    ) -> WorkerResult<RecognitionOutcome> {
        let mut guard = CancelGuard::with_budget(self.recognition_timeout).with_cancel(cancel);

        let location = VideoLocation::from(job);
        let video = guard.run(self.store.fetch(&location)).await??;
        logger.fetched(video.len());

        let outcome = self
            .recognizer
            .recognize(Arc::from(video), &job.rule_set, &self.settings, guard)
            .await?;
        Ok(outcome)
    }
}
