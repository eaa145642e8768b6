//! Dispatch fetches to the backend named by the job.

use async_trait::async_trait;
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalVideoStore;
use crate::remote::{HttpVideoStore, RemoteStoreConfig};
use crate::{VideoLocation, VideoStore};

/// Storage name served from the local directory.
pub const DEFAULT_STORAGE_NAME: &str = "Default";

/// Local store for [`DEFAULT_STORAGE_NAME`], remote store for everything else.
#[derive(Debug, Clone)]
pub struct StorageRouter {
    local: LocalVideoStore,
    remote: Option<HttpVideoStore>,
}

impl StorageRouter {
    pub fn new(local: LocalVideoStore, remote: Option<HttpVideoStore>) -> Self {
        Self { local, remote }
    }

    /// Build from `VIDEO_STORAGE_DIR` and the remote store variables. The
    /// remote store is optional; without it only local jobs can be served.
    pub fn from_env() -> StorageResult<Self> {
        let root = std::env::var("VIDEO_STORAGE_DIR")
            .unwrap_or_else(|_| "/var/lib/vrec/videos".to_string());
        let remote_config = RemoteStoreConfig::from_env();
        let remote = if remote_config.is_configured() {
            Some(HttpVideoStore::new(remote_config)?)
        } else {
            None
        };
        info!(
            local_root = %root,
            remote = remote.is_some(),
            "Configured video storage"
        );
        Ok(Self::new(LocalVideoStore::new(root), remote))
    }
}

#[async_trait]
impl VideoStore for StorageRouter {
    async fn fetch(&self, location: &VideoLocation) -> StorageResult<Vec<u8>> {
        if location.storage_name.is_empty() || location.storage_name == DEFAULT_STORAGE_NAME {
            return self.local.fetch(location).await;
        }
        match &self.remote {
            Some(remote) => remote.fetch(location).await,
            None => Err(StorageError::UnknownBackend(location.storage_name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_goes_to_local() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.mp4"), b"local").await.unwrap();

        let router = StorageRouter::new(LocalVideoStore::new(dir.path()), None);
        let bytes = router
            .fetch(&VideoLocation::new(DEFAULT_STORAGE_NAME, "a.mp4"))
            .await
            .unwrap();
        assert_eq!(bytes, b"local");
    }

    #[tokio::test]
    async fn test_remote_name_without_remote_store() {
        let dir = tempfile::tempdir().unwrap();
        let router = StorageRouter::new(LocalVideoStore::new(dir.path()), None);
        let err = router
            .fetch(&VideoLocation::new("Amazon S3", "a.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownBackend(_)));
        assert!(!err.is_not_found());
    }
}
