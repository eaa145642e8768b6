//! Videos stored in a local directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::{VideoLocation, VideoStore};

/// Reads `video_ref` relative to a root directory.
#[derive(Debug, Clone)]
pub struct LocalVideoStore {
    root: PathBuf,
}

impl LocalVideoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `video_ref` inside the root, rejecting anything that could
    /// escape it.
    pub fn resolve(&self, video_ref: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(video_ref);
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if video_ref.is_empty() || escapes {
            return Err(StorageError::InvalidKey(video_ref.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl VideoStore for LocalVideoStore {
    async fn fetch(&self, location: &VideoLocation) -> StorageResult<Vec<u8>> {
        let path = self.resolve(&location.video_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "Read local video");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::not_found(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
