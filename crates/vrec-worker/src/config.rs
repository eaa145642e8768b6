//! Worker configuration.

use std::time::Duration;

use vrec_db::SelectionPolicy;
use vrec_models::RecognitionSettings;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrently executing jobs
    pub max_concurrent_jobs: usize,
    /// Delay between scheduler passes
    pub poll_interval: Duration,
    /// Age after which an unfinished claim may be taken over
    pub stale_timeout: Duration,
    /// Claims allowed per job
    pub max_repeats: u32,
    /// Hard budget for fetching and recognising one job
    pub recognition_timeout: Duration,
    /// Frames classified in parallel per job (defaults to core count)
    pub recognition_concurrency: Option<usize>,
    /// How long shutdown waits for interrupted jobs to stop
    pub shutdown_timeout: Duration,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            poll_interval: Duration::from_millis(1000),
            stale_timeout: Duration::from_secs(1800),
            max_repeats: 3,
            recognition_timeout: Duration::from_secs(1800),
            recognition_concurrency: None,
            shutdown_timeout: Duration::from_secs(30),
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            poll_interval: Duration::from_millis(
                std::env::var("RECOGNITION_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            stale_timeout: Duration::from_secs(
                std::env::var("RECOGNITION_JOB_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            max_repeats: std::env::var("RECOGNITION_JOB_MAX_REPEATS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            recognition_timeout: Duration::from_secs(
                std::env::var("RECOGNITION_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            recognition_concurrency: std::env::var("RECOGNITION_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok()),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            metrics_port: std::env::var("WORKER_METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Selection rules for one pass with `limit` free slots.
    pub fn selection_policy(&self, limit: usize) -> SelectionPolicy {
        SelectionPolicy {
            stale_timeout: chrono::Duration::from_std(self.stale_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(1800)),
            max_repeats: self.max_repeats,
            limit,
        }
    }

    /// Settings applied to stored jobs, which carry rules but no settings.
    pub fn recognition_settings(&self) -> RecognitionSettings {
        RecognitionSettings {
            concurrency: self.recognition_concurrency,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_policy_carries_limits() {
        let config = WorkerConfig {
            stale_timeout: Duration::from_secs(60),
            max_repeats: 5,
            ..Default::default()
        };
        let policy = config.selection_policy(4);
        assert_eq!(policy.stale_timeout, chrono::Duration::seconds(60));
        assert_eq!(policy.max_repeats, 5);
        assert_eq!(policy.limit, 4);
    }

    #[test]
    fn test_stored_jobs_use_default_settings() {
        let config = WorkerConfig {
            recognition_concurrency: Some(2),
            ..Default::default()
        };
        let settings = config.recognition_settings();
        assert_eq!(settings.concurrency, Some(2));
        assert_eq!(settings.comparing_similarity_for_phrases, None);
    }
}
