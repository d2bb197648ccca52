//! Platform upload adapters.
//!
//! One adapter per destination, all speaking the same three-step contract:
//! produce a valid credential, start a publish job for hosted media, poll
//! the job until the platform reports a terminal state. The scheduler owns
//! sequencing and retries; adapters own wire formats and token refresh.

pub mod instagram;
pub mod tiktok;
pub mod youtube;

pub use instagram::InstagramAdapter;
pub use tiktok::TikTokAdapter;
pub use youtube::YouTubeAdapter;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use clipcast_models::{Destination, PostContent};

use crate::credentials::StoredCredential;
use crate::error::PublishResult;

/// Platform-side identifier of an in-progress publish job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalJobId(String);

impl ExternalJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    /// The job reached a final state; stop polling
    pub terminal: bool,
    /// Meaningful only when terminal
    pub success: bool,
    /// Upload progress 0-100 where the platform reports one
    pub progress: Option<u8>,
    /// Published video ID on success
    pub video_id: Option<String>,
    /// Platform failure detail
    pub message: Option<String>,
}

impl PollOutcome {
    pub fn pending(progress: Option<u8>) -> Self {
        Self {
            terminal: false,
            success: false,
            progress,
            video_id: None,
            message: None,
        }
    }

    pub fn succeeded(video_id: Option<String>) -> Self {
        Self {
            terminal: true,
            success: true,
            progress: Some(100),
            video_id,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            terminal: true,
            success: false,
            progress: None,
            video_id: None,
            message: Some(message.into()),
        }
    }
}

/// Destination-specific publish protocol.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn destination(&self) -> Destination;

    /// Return a credential good for the whole upload, refreshing through
    /// the platform's OAuth endpoint when the stored one is near expiry.
    /// `force_refresh` bypasses the freshness check after an auth rejection.
    async fn valid_credential(&self, force_refresh: bool) -> PublishResult<StoredCredential>;

    /// Start a publish job for media hosted at `media_url`.
    async fn begin_publish(
        &self,
        credential: &StoredCredential,
        content: &PostContent,
        media_url: &str,
    ) -> PublishResult<ExternalJobId>;

    /// Check on a previously started job.
    async fn poll_status(
        &self,
        credential: &StoredCredential,
        job: &ExternalJobId,
    ) -> PublishResult<PollOutcome>;
}

/// The configured adapters, looked up by destination at dispatch time.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn get(&self, destination: Destination) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.destination() == destination)
            .cloned()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.adapters.iter().map(|a| a.destination()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// Shared refresh discipline for all adapters.
///
/// Fast path returns the stored credential while it stays outside the
/// refresh threshold. The slow path is single-flight: concurrent callers
/// serialize on `refresh_lock`, and whoever enters second re-reads the
/// store instead of refreshing again. The refreshed credential is saved
/// before being returned.
pub(crate) async fn fresh_credential<R, Fut>(
    destination: Destination,
    store: &dyn crate::credentials::CredentialStore,
    refresh_lock: &tokio::sync::Mutex<()>,
    force_refresh: bool,
    refresh: R,
) -> PublishResult<StoredCredential>
where
    R: FnOnce(StoredCredential) -> Fut,
    Fut: std::future::Future<Output = PublishResult<StoredCredential>>,
{
    let stored = store.get(destination).await?.ok_or_else(|| {
        crate::error::PublishError::credential(destination, "account not connected")
    })?;

    if !force_refresh && !stored.needs_refresh() {
        return Ok(stored);
    }

    let _guard = refresh_lock.lock().await;
    let current = store.get(destination).await?.unwrap_or(stored);
    if !force_refresh && !current.needs_refresh() {
        return Ok(current);
    }

    let refreshed = refresh(current).await?;
    store.save(destination, refreshed.clone()).await?;
    tracing::info!("Refreshed {} credential", destination);
    Ok(refreshed)
}

/// Map a non-success platform response onto a publish error, pulling the
/// body in for diagnosis. Auth rejections become credential errors so the
/// failure is attributed to the connection, not the upload.
pub(crate) async fn api_error(
    destination: Destination,
    context: &str,
    response: reqwest::Response,
) -> crate::error::PublishError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        crate::error::PublishError::credential(
            destination,
            format!("{} rejected with {}: {}", context, status, body),
        )
    } else {
        crate::error::PublishError::platform_rejected(
            destination,
            format!("{} failed with {}: {}", context, status, body),
        )
    }
}

/// "#tag1 #tag2" suffix, or an empty string when there are no hashtags.
pub(crate) fn format_hashtags(hashtags: &[String]) -> String {
    hashtags
        .iter()
        .map(|t| format!("#{}", t.trim_start_matches('#')))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title plus hashtags, the single-field caption most platforms take.
pub(crate) fn caption_for(content: &PostContent) -> String {
    let tags = format_hashtags(&content.hashtags);
    match (content.title.is_empty(), tags.is_empty()) {
        (false, false) => format!("{} {}", content.title, tags),
        (false, true) => content.title.clone(),
        (true, _) => tags,
    }
}
