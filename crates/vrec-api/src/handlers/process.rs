//! Synchronous recognition handler.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::info;
use validator::Validate;

use vrec_models::{ProcessRequest, ProcessResponse};
use vrec_recognition::CancelGuard;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_recognition_request;
use crate::state::AppState;

/// Recognise the rules of the request in the inline video.
pub async fn process_video(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<Json<ProcessResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    let video = decode_video(&request.video_body)?;
    let rules = request.rule_set();
    let settings = request.recognition_settings;

    let guard = CancelGuard::with_budget(state.config.recognition_timeout)
        .with_cancel(state.shutdown_signal());
    let started = Instant::now();

    let outcome = state
        .recognizer
        .recognize(Arc::from(video), &rules, &settings, guard)
        .await
        .map_err(ApiError::from);
    record_recognition_request(
        match &outcome {
            Ok(_) => "ok",
            Err(ApiError::Timeout(_)) => "timeout",
            Err(ApiError::Unprocessable(_)) => "undecodable",
            Err(_) => "error",
        },
        started.elapsed().as_secs_f64(),
    );
    let outcome = outcome?;

    info!(
        frames = outcome.stats.frames,
        failed_frames = outcome.stats.failed_frames,
        phrases = outcome.result.found_phrases.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Processed recognition request"
    );

    Ok(Json(outcome.result.into()))
}

fn decode_video(body: &str) -> ApiResult<Vec<u8>> {
    let video = STANDARD
        .decode(body.trim())
        .map_err(|e| ApiError::bad_request(format!("VideoBody is not valid base64: {}", e)))?;
    if video.is_empty() {
        return Err(ApiError::bad_request("VideoBody is empty"));
    }
    Ok(video)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_video() {
        assert_eq!(decode_video("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_video(" aGVsbG8=\n").unwrap(), b"hello");
        assert!(matches!(decode_video("not base64!"), Err(ApiError::BadRequest(_))));
    }
}
