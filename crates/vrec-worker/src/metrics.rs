//! Job metrics and the optional Prometheus exporter.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_COMPLETED_TOTAL: &str = "vrec_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vrec_jobs_failed_total";
    pub const JOBS_CLAIMED_TOTAL: &str = "vrec_jobs_claimed_total";
    pub const JOBS_INTERRUPTED_TOTAL: &str = "vrec_jobs_interrupted_total";
    pub const JOB_DURATION_SECONDS: &str = "vrec_job_duration_seconds";
}

/// Serve `/metrics` on `port`. Must be called inside the runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
}

pub fn record_job_claimed() {
    counter!(names::JOBS_CLAIMED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "recognized").record(duration_secs);
}

pub fn record_job_failed(reason: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_job_interrupted() {
    counter!(names::JOBS_INTERRUPTED_TOTAL).increment(1);
}
