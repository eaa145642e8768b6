//! Short-lived signed tokens authorising a single video fetch.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Token payload: the object key and an expiry (Unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchToken {
    pub key: String,
    pub exp: u64,
}

impl FetchToken {
    /// Token for `key` valid for `expiry` from now.
    pub fn new(key: impl Into<String>, expiry: Duration) -> Self {
        Self {
            key: key.into(),
            exp: unix_now() + expiry.as_secs(),
        }
    }

    pub fn is_expired(&self) -> bool {
        unix_now() >= self.exp
    }

    fn encode(&self) -> StorageResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| {
            StorageError::config_error(format!("Failed to serialize fetch token: {}", e))
        })?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// `payload.signature`, both URL-safe base64.
    pub fn sign(&self, secret: &str) -> StorageResult<String> {
        let payload = self.encode()?;
        let mut mac = mac_for(secret)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify a signed token.
    ///
    /// Returns `None` if the token is malformed, expired, or the signature
    /// does not match. Returns an error only for an unusable secret.
    pub fn verify(signed: &str, secret: &str) -> StorageResult<Option<Self>> {
        let Some((payload, sig_encoded)) = signed.split_once('.') else {
            return Ok(None);
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(sig_encoded) else {
            return Ok(None);
        };

        let mut mac = mac_for(secret)?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            return Ok(None);
        }

        let token = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<FetchToken>(&bytes).ok());
        Ok(token.filter(|t| !t.is_expired()))
    }
}

fn mac_for(secret: &str) -> StorageResult<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StorageError::config_error(format!("Invalid HMAC key: {}", e)))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
