//! YouTube Shorts adapter.
//!
//! YouTube has no pull-from-URL ingest, so this adapter relays the media:
//! fetch the rendered file, open a resumable upload session, PUT the bytes.
//! The upload answers with the video ID; transcoding continues on Google's
//! side and is polled through `processingDetails` until it settles.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use clipcast_models::{Destination, PostContent};

use crate::adapters::{
    api_error, fresh_credential, ExternalJobId, PlatformAdapter, PollOutcome,
};
use crate::config::PlatformSettings;
use crate::credentials::{CredentialStore, StoredCredential};
use crate::error::{PublishError, PublishResult};
use crate::retry::{retry_async, RetryConfig};

pub struct YouTubeAdapter {
    http: reqwest::Client,
    settings: PlatformSettings,
    credentials: Arc<dyn CredentialStore>,
    refresh_lock: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    processing_details: Option<ProcessingDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingDetails {
    #[serde(default)]
    processing_status: Option<String>,
    #[serde(default)]
    processing_failure_reason: Option<String>,
}

impl YouTubeAdapter {
    pub fn new(settings: PlatformSettings, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            credentials,
            refresh_lock: Mutex::new(()),
        }
    }

    fn endpoint(base: &url::Url, suffix: &str) -> String {
        format!("{}/{}", base.as_str().trim_end_matches('/'), suffix)
    }

    async fn refresh(&self, current: StoredCredential) -> PublishResult<StoredCredential> {
        let refresh_token = current.refresh_token.clone().ok_or_else(|| {
            PublishError::credential(
                Destination::YoutubeShorts,
                "no refresh token stored; reconnect the account",
            )
        })?;

        let config = RetryConfig::new("youtube token refresh");
        let token: TokenResponse = retry_async(&config, || async {
            let response = self
                .http
                .post(Self::endpoint(&self.settings.auth_base, "token"))
                .form(&[
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(
                    api_error(Destination::YoutubeShorts, "token refresh", response).await,
                );
            }
            Ok(response.json::<TokenResponse>().await?)
        })
        .await
        .into_result()?;

        Ok(StoredCredential {
            access_token: token.access_token,
            // Google does not rotate refresh tokens on refresh
            refresh_token: Some(refresh_token),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            account: current.account,
        })
    }

    /// Open a resumable upload session; the session URL comes back in the
    /// Location header.
    async fn open_upload_session(
        &self,
        credential: &StoredCredential,
        content: &PostContent,
    ) -> PublishResult<String> {
        let metadata = json!({
            "snippet": {
                "title": content.title,
                "description": content.description,
                "tags": content.hashtags,
                "categoryId": "22",
            },
            "status": {
                "privacyStatus": "public",
                "selfDeclaredMadeForKids": false,
            },
        });

        let response = self
            .http
            .post(Self::endpoint(
                &self.settings.api_base,
                "upload/youtube/v3/videos",
            ))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&credential.access_token)
            .json(&metadata)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "upload session", response).await);
        }

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PublishError::platform_rejected(
                    self.destination(),
                    "upload session response carried no Location header",
                )
            })
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn destination(&self) -> Destination {
        Destination::YoutubeShorts
    }

    async fn valid_credential(&self, force_refresh: bool) -> PublishResult<StoredCredential> {
        fresh_credential(
            self.destination(),
            self.credentials.as_ref(),
            &self.refresh_lock,
            force_refresh,
            |current| self.refresh(current),
        )
        .await
    }

    async fn begin_publish(
        &self,
        credential: &StoredCredential,
        content: &PostContent,
        media_url: &str,
    ) -> PublishResult<ExternalJobId> {
        // Shorts-length media, buffered whole before the PUT
        let media = self.http.get(media_url).send().await?;
        if !media.status().is_success() {
            return Err(api_error(self.destination(), "media fetch", media).await);
        }
        let bytes = media.bytes().await?;

        let session_url = self.open_upload_session(credential, content).await?;

        let response = self
            .http
            .put(&session_url)
            .bearer_auth(&credential.access_token)
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "media upload", response).await);
        }

        let uploaded: UploadedVideo = response.json().await?;
        info!("YouTube accepted video {}", uploaded.id);
        Ok(ExternalJobId::new(uploaded.id))
    }

    async fn poll_status(
        &self,
        credential: &StoredCredential,
        job: &ExternalJobId,
    ) -> PublishResult<PollOutcome> {
        let response = self
            .http
            .get(Self::endpoint(&self.settings.api_base, "youtube/v3/videos"))
            .query(&[("part", "processingDetails,status"), ("id", job.as_str())])
            .bearer_auth(&credential.access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "processing status", response).await);
        }

        let listing: VideoListResponse = response.json().await?;
        let item = listing.items.into_iter().next().ok_or_else(|| {
            PublishError::platform_rejected(
                self.destination(),
                format!("video {} not found after upload", job),
            )
        })?;

        let details = item.processing_details.unwrap_or(ProcessingDetails {
            processing_status: None,
            processing_failure_reason: None,
        });
        Ok(match details.processing_status.as_deref() {
            // "terminated" means processing info is gone, not that the video is
            Some("succeeded") | Some("terminated") => PollOutcome::succeeded(Some(item.id)),
            Some("failed") => PollOutcome::failed(
                details
                    .processing_failure_reason
                    .unwrap_or_else(|| "YouTube processing failed".to_string()),
            ),
            _ => PollOutcome::pending(None),
        })
    }
}
