//! Recognition metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_CLASSIFIED_TOTAL: &str = "vrec_frames_classified_total";
    pub const FRAME_FAILURES_TOTAL: &str = "vrec_frame_failures_total";
    pub const RECOGNITION_DURATION_SECONDS: &str = "vrec_recognition_duration_seconds";
}

/// Record a finished dispatch round.
pub fn record_round(frames: usize, failures: usize) {
    counter!(names::FRAMES_CLASSIFIED_TOTAL).increment(frames as u64);
    if failures > 0 {
        counter!(names::FRAME_FAILURES_TOTAL).increment(failures as u64);
    }
}

/// Record a whole pipeline run.
pub fn record_recognition(outcome: &'static str, duration_secs: f64) {
    histogram!(names::RECOGNITION_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}
