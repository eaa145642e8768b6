//! Videos fetched from a remote HTTP store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::error::{StorageError, StorageResult};
use crate::token::FetchToken;
use crate::{VideoLocation, VideoStore};

/// Configuration for the remote store.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    /// Base URL; videos are served under `{base_url}/videos/{ref}`
    pub base_url: Option<String>,
    /// Secret for signing fetch tokens
    pub signing_secret: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Lifetime of a fetch token
    pub token_expiry: Duration,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            signing_secret: None,
            timeout: Duration::from_secs(120),
            token_expiry: Duration::from_secs(300),
        }
    }
}

impl RemoteStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("VIDEO_REMOTE_BASE_URL").ok(),
            signing_secret: std::env::var("VIDEO_REMOTE_SIGNING_SECRET").ok(),
            timeout: Duration::from_secs(
                std::env::var("VIDEO_REMOTE_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            token_expiry: Duration::from_secs(
                std::env::var("VIDEO_REMOTE_TOKEN_EXPIRY_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }

    /// Whether enough is configured to build an [`HttpVideoStore`].
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.signing_secret.is_some()
    }
}

/// Downloads videos with a signed, expiring token in the query string.
#[derive(Debug, Clone)]
pub struct HttpVideoStore {
    http: Client,
    base_url: Url,
    signing_secret: String,
    token_expiry: Duration,
}

impl HttpVideoStore {
    pub fn new(config: RemoteStoreConfig) -> StorageResult<Self> {
        let base_url = config
            .base_url
            .ok_or_else(|| StorageError::config_error("VIDEO_REMOTE_BASE_URL is not set"))?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| StorageError::config_error(format!("Invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::config_error(format!(
                "Base URL cannot have paths: {}",
                base_url
            )));
        }
        let signing_secret = config
            .signing_secret
            .ok_or_else(|| StorageError::config_error("VIDEO_REMOTE_SIGNING_SECRET is not set"))?;

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url,
            signing_secret,
            token_expiry: config.token_expiry,
        })
    }

    /// Signed download URL for `video_ref`.
    pub fn signed_url(&self, video_ref: &str) -> StorageResult<Url> {
        let token = FetchToken::new(video_ref, self.token_expiry).sign(&self.signing_secret)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::config_error("Base URL cannot have paths"))?
            .pop_if_empty()
            .push("videos")
            .extend(video_ref.split('/').filter(|s| !s.is_empty()));
        url.query_pairs_mut().append_pair("token", &token);
        Ok(url)
    }
}

#[async_trait]
impl VideoStore for HttpVideoStore {
    async fn fetch(&self, location: &VideoLocation) -> StorageResult<Vec<u8>> {
        let url = self.signed_url(&location.video_ref)?;
        debug!(storage = %location.storage_name, video_ref = %location.video_ref, "Fetching remote video");

        let response = self.http.get(url).send().await?;
        match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(StorageError::not_found(location.video_ref.clone())),
            status => {
                warn!(%status, video_ref = %location.video_ref, "Remote video fetch failed");
                Err(StorageError::download_failed(format!(
                    "{} fetching {}",
                    status, location.video_ref
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(base_url: &str) -> HttpVideoStore {
        HttpVideoStore::new(RemoteStoreConfig {
            base_url: Some(base_url.to_string()),
            signing_secret: Some("s3cret".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_signed_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/2024/rec-1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4 bytes".to_vec()))
            .mount(&server)
            .await;

        let bytes = store(&server.uri())
            .fetch(&VideoLocation::new("Amazon S3", "2024/rec-1.mp4"))
            .await
            .unwrap();
        assert_eq!(bytes, b"mp4 bytes");

        let requests = server.received_requests().await.unwrap();
        let token = requests[0]
            .url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.to_string())
            .unwrap();
        let verified = FetchToken::verify(&token, "s3cret").unwrap().unwrap();
        assert_eq!(verified.key, "2024/rec-1.mp4");
    }

    #[tokio::test]
    async fn test_missing_video_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = store(&server.uri())
            .fetch(&VideoLocation::new("Amazon S3", "gone.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = store(&server.uri())
            .fetch(&VideoLocation::new("Amazon S3", "a.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DownloadFailed(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_requires_base_url_and_secret() {
        assert!(HttpVideoStore::new(RemoteStoreConfig::default()).is_err());
        assert!(!RemoteStoreConfig::default().is_configured());
    }

    #[test]
    fn test_signed_url_keeps_base_path() {
        let url = store("http://videos.internal/api/").signed_url("a/b.mp4").unwrap();
        assert_eq!(url.path(), "/api/videos/a/b.mp4");
        assert!(url.query().unwrap().starts_with("token="));
    }
}
