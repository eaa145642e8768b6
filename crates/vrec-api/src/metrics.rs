//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vrec_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vrec_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vrec_http_requests_in_flight";

    // Recognition metrics
    pub const RECOGNITION_REQUESTS_TOTAL: &str = "vrec_recognition_requests_total";
    pub const RECOGNITION_REQUEST_DURATION_SECONDS: &str = "vrec_recognition_request_duration_seconds";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a synchronous recognition by outcome.
pub fn record_recognition_request(outcome: &'static str, duration_secs: f64) {
    counter!(names::RECOGNITION_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::RECOGNITION_REQUEST_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Route template for labels; unmatched paths share one label.
fn path_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = path_label(&request);
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_path_label() {
        let request = Request::builder()
            .uri("/videos/123/anything")
            .body(Body::empty())
            .unwrap();
        assert_eq!(path_label(&request), "unmatched");
    }
}
