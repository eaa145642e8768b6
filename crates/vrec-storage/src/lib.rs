//! Video retrieval for recognition jobs.
//!
//! Jobs name the storage backend holding their video. `Default` is a local
//! directory; any other name is fetched over HTTP from a remote store using
//! a short-lived HMAC-signed token.

pub mod error;
pub mod local;
pub mod remote;
pub mod router;
pub mod token;

use async_trait::async_trait;
use vrec_models::Job;

pub use error::{StorageError, StorageResult};
pub use local::LocalVideoStore;
pub use remote::{HttpVideoStore, RemoteStoreConfig};
pub use router::{StorageRouter, DEFAULT_STORAGE_NAME};
pub use token::FetchToken;

/// Where a job's video lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLocation {
    pub storage_name: String,
    pub video_ref: String,
}

impl VideoLocation {
    pub fn new(storage_name: impl Into<String>, video_ref: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
            video_ref: video_ref.into(),
        }
    }
}

impl From<&Job> for VideoLocation {
    fn from(job: &Job) -> Self {
        Self::new(job.storage_name.clone(), job.video_ref.clone())
    }
}

/// Fetches the full video bytes for a location.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn fetch(&self, location: &VideoLocation) -> StorageResult<Vec<u8>>;
}
