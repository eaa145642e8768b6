//! Router tests with a scripted recognizer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use vrec_api::{create_router, ApiConfig, AppState};
use vrec_media::MediaError;
use vrec_models::{RecognitionResult, RecognitionSettings, RuleSet};
use vrec_recognition::{
    CancelGuard, DispatchStats, PipelineResult, RecognitionError, RecognitionOutcome, VideoRecognizer,
};

/// Treats the video bytes as a script: `broken` fails to decode, `slow`
/// never finishes, anything else marks every key.
struct ScriptedRecognizer;

#[async_trait]
impl VideoRecognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        video: Arc<[u8]>,
        rules: &RuleSet,
        settings: &RecognitionSettings,
        mut guard: CancelGuard,
    ) -> PipelineResult<RecognitionOutcome> {
        match &video[..] {
            b"broken" => Err(RecognitionError::Media(MediaError::decode_failed(
                "moov atom not found",
                None,
                Some(1),
            ))),
            b"slow" => {
                guard.run(std::future::pending::<()>()).await?;
                Err(RecognitionError::internal("pending future completed"))
            }
            _ => {
                let mut result = RecognitionResult::empty_for(rules);
                for phrase in &rules.search_phrases {
                    result.insert_phrase(format!("{} shown at similarity {}", phrase, settings.similarity_threshold()));
                }
                for key in &rules.url_contains {
                    result.mark_url(key);
                }
                Ok(RecognitionOutcome {
                    result,
                    stats: DispatchStats {
                        frames: 2,
                        rounds: 1,
                        failed_frames: 0,
                    },
                })
            }
        }
    }
}

fn app_with(config: ApiConfig) -> Router {
    create_router(AppState::with_recognizer(config, Arc::new(ScriptedRecognizer)), None)
}

fn app() -> Router {
    app_with(ApiConfig::default())
}

fn post_process(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthcheck_endpoint() {
    let response = app()
        .oneshot(Request::builder().uri("/healthcheck/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"result": 1}));
}

#[tokio::test]
async fn test_health_endpoint() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let response = app()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_process_returns_flags_for_every_key() {
    let response = app()
        .oneshot(post_process(json!({
            "VideoBody": "dmlkZW8=",
            "SearchPhraseIdentifiers": ["error"],
            "URLContains": ["wpadmin"],
            "TextContains": ["MySQL", "MariaDB"],
            "RecognitionSettings": {"comparingSimilarityForPhrases": 90}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["SearchPhrasesFound"], json!(["error shown at similarity 90"]));
    assert_eq!(body["URLContainsResults"], json!({"wpadmin": true}));
    assert_eq!(body["TextContainsResults"], json!({"MariaDB": false, "MySQL": false}));
}

#[tokio::test]
async fn test_invalid_base64_is_bad_request() {
    let response = app()
        .oneshot(post_process(json!({"VideoBody": "%%% not base64 %%%"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("base64"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/process/")
        .header("content-type", "application/json")
        .body(Body::from("{\"VideoBody\": "))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn test_out_of_range_setting_is_rejected() {
    let response = app()
        .oneshot(post_process(json!({
            "VideoBody": "dmlkZW8=",
            "RecognitionSettings": {"comparingSimilarityForPhrases": 150}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_undecodable_video_is_unprocessable() {
    // "broken"
    let response = app()
        .oneshot(post_process(json!({"VideoBody": "YnJva2Vu", "TextContains": ["MySQL"]})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("moov atom"));
}

#[tokio::test]
async fn test_recognition_budget_expiry_is_gateway_timeout() {
    let config = ApiConfig {
        recognition_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    // "slow"
    let response = app_with(config)
        .oneshot(post_process(json!({"VideoBody": "c2xvdw=="})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_shutdown_cancels_running_request() {
    let state = AppState::with_recognizer(ApiConfig::default(), Arc::new(ScriptedRecognizer));
    let app = create_router(state.clone(), None);

    let request = tokio::spawn(app.oneshot(post_process(json!({"VideoBody": "c2xvdw=="}))));
    tokio::time::sleep(Duration::from_millis(50)).await;
    state.begin_shutdown();

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = ApiConfig {
        max_body_size: 64,
        ..Default::default()
    };
    let body = json!({"VideoBody": "A".repeat(256)}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/process/")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app_with(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
