//! Stored platform credentials.
//!
//! Adapters read and write credentials through the `CredentialStore` trait;
//! the daemon persists them as a JSON file so reconnecting an account
//! survives restarts, and tests use the in-memory store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use clipcast_models::Destination;

use crate::error::PublishResult;

/// Refresh a credential once its remaining lifetime drops below this.
pub const CREDENTIAL_REFRESH_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Account metadata captured when the user connected the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountMeta {
    /// Platform-side account or channel ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Display name shown in the UI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// An access credential for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token expiry
    pub expires_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountMeta>,
}

impl StoredCredential {
    /// Whether the access token expires within the given window.
    pub fn expires_within(&self, window: Duration) -> bool {
        let remaining = self.expires_at - Utc::now();
        remaining <= chrono::Duration::seconds(window.as_secs() as i64)
    }

    /// Whether the token is inside the refresh threshold.
    pub fn needs_refresh(&self) -> bool {
        self.expires_within(CREDENTIAL_REFRESH_THRESHOLD)
    }
}

/// Read/write access to per-destination credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, destination: Destination) -> PublishResult<Option<StoredCredential>>;
    async fn save(
        &self,
        destination: Destination,
        credential: StoredCredential,
    ) -> PublishResult<()>;
}

/// In-memory credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<HashMap<Destination, StoredCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a credential, for construction and tests.
    pub async fn insert(&self, destination: Destination, credential: StoredCredential) {
        self.inner.write().await.insert(destination, credential);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, destination: Destination) -> PublishResult<Option<StoredCredential>> {
        Ok(self.inner.read().await.get(&destination).cloned())
    }

    async fn save(
        &self,
        destination: Destination,
        credential: StoredCredential,
    ) -> PublishResult<()> {
        self.inner.write().await.insert(destination, credential);
        Ok(())
    }
}

/// Credential store persisted as a single JSON file.
///
/// Writes go through a temp file and rename so a crash mid-write never
/// leaves a truncated credential file.
pub struct JsonFileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonFileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> PublishResult<HashMap<String, StoredCredential>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, all: &HashMap<String, StoredCredential>) -> PublishResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(all)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for JsonFileCredentialStore {
    async fn get(&self, destination: Destination) -> PublishResult<Option<StoredCredential>> {
        let all = self.read_all().await?;
        Ok(all.get(destination.as_str()).cloned())
    }

    async fn save(
        &self,
        destination: Destination,
        credential: StoredCredential,
    ) -> PublishResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(destination.as_str().to_string(), credential);
        self.write_all(&all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_expiring_in(seconds: i64) -> StoredCredential {
        StoredCredential {
            access_token: "token".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Utc::now() + chrono::Duration::seconds(seconds),
            account: None,
        }
    }

    #[test]
    fn refresh_threshold_is_ten_minutes() {
        assert!(credential_expiring_in(5 * 60).needs_refresh());
        assert!(credential_expiring_in(-10).needs_refresh());
        assert!(!credential_expiring_in(11 * 60).needs_refresh());
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryCredentialStore::new();
        assert!(store.get(Destination::Tiktok).await.unwrap().is_none());

        let credential = credential_expiring_in(3600);
        store
            .save(Destination::Tiktok, credential.clone())
            .await
            .unwrap();

        let loaded = store.get(Destination::Tiktok).await.unwrap().unwrap();
        assert_eq!(loaded, credential);
        assert!(store.get(Destination::YoutubeShorts).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_round_trips_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCredentialStore::new(dir.path().join("credentials.json"));

        assert!(store.get(Destination::Tiktok).await.unwrap().is_none());

        let tiktok = credential_expiring_in(3600);
        let youtube = credential_expiring_in(7200);
        store.save(Destination::Tiktok, tiktok.clone()).await.unwrap();
        store
            .save(Destination::YoutubeShorts, youtube.clone())
            .await
            .unwrap();

        assert_eq!(store.get(Destination::Tiktok).await.unwrap(), Some(tiktok));
        assert_eq!(
            store.get(Destination::YoutubeShorts).await.unwrap(),
            Some(youtube)
        );
    }
}
