//! TikTok adapter.
//!
//! Content Posting API direct post: the video is pulled from a hosted URL
//! (`PULL_FROM_URL`), so media never streams through the daemon. Publishing
//! is asynchronous on TikTok's side; init returns a publish ID which is
//! polled until the post reaches `PUBLISH_COMPLETE` or `FAILED`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use clipcast_models::{Destination, PostContent};

use crate::adapters::{
    api_error, caption_for, fresh_credential, ExternalJobId, PlatformAdapter, PollOutcome,
};
use crate::config::PlatformSettings;
use crate::credentials::{CredentialStore, StoredCredential};
use crate::error::{PublishError, PublishResult};
use crate::retry::{retry_async, RetryConfig};

pub struct TikTokAdapter {
    http: reqwest::Client,
    settings: PlatformSettings,
    credentials: Arc<dyn CredentialStore>,
    refresh_lock: Mutex<()>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct InitData {
    publish_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    fail_reason: Option<String>,
    // Field name as TikTok spells it
    #[serde(default)]
    publicaly_available_post_id: Vec<serde_json::Value>,
}

impl TikTokAdapter {
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
                Destination::Tiktok,
                "no refresh token stored; reconnect the account",
            )
        })?;

        let config = RetryConfig::new("tiktok token refresh");
        let token: TokenResponse = retry_async(&config, || async {
            let response = self
                .http
                .post(Self::endpoint(&self.settings.auth_base, "v2/oauth/token/"))
                .form(&[
                    ("client_key", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(api_error(Destination::Tiktok, "token refresh", response).await);
            }
            Ok(response.json::<TokenResponse>().await?)
        })
        .await
        .into_result()?;

        Ok(StoredCredential {
            access_token: token.access_token,
            // TikTok rotates refresh tokens; keep the old one if none came back
            refresh_token: token.refresh_token.or(Some(refresh_token)),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            account: current.account,
        })
    }

    fn unwrap_data<T>(&self, envelope: ApiEnvelope<T>, context: &str) -> PublishResult<T> {
        if let Some(error) = &envelope.error {
            if !error.code.is_empty() && error.code != "ok" {
                return Err(PublishError::platform_rejected(
                    self.destination(),
                    format!("{}: {} ({})", context, error.message, error.code),
                ));
            }
        }
        envelope.data.ok_or_else(|| {
            PublishError::platform_rejected(
                self.destination(),
                format!("{}: response carried no data", context),
            )
        })
    }
}

#[async_trait]
impl PlatformAdapter for TikTokAdapter {
    fn destination(&self) -> Destination {
        Destination::Tiktok
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
        let body = json!({
            "post_info": {
                "title": caption_for(content),
                "privacy_level": "PUBLIC_TO_EVERYONE",
            },
            "source_info": {
                "source": "PULL_FROM_URL",
                "video_url": media_url,
            },
        });

        let response = self
            .http
            .post(Self::endpoint(
                &self.settings.api_base,
                "v2/post/publish/video/init/",
            ))
            .bearer_auth(&credential.access_token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "publish init", response).await);
        }

        let envelope: ApiEnvelope<InitData> = response.json().await?;
        let data = self.unwrap_data(envelope, "publish init")?;
        info!("TikTok accepted publish job {}", data.publish_id);
        Ok(ExternalJobId::new(data.publish_id))
    }

    async fn poll_status(
        &self,
        credential: &StoredCredential,
        job: &ExternalJobId,
    ) -> PublishResult<PollOutcome> {
        let response = self
            .http
            .post(Self::endpoint(
                &self.settings.api_base,
                "v2/post/publish/status/fetch/",
            ))
            .bearer_auth(&credential.access_token)
            .json(&json!({ "publish_id": job.as_str() }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "status fetch", response).await);
        }

        let envelope: ApiEnvelope<StatusData> = response.json().await?;
        let data = self.unwrap_data(envelope, "status fetch")?;

        Ok(match data.status.as_str() {
            "PUBLISH_COMPLETE" => {
                let video_id = data
                    .publicaly_available_post_id
                    .first()
                    .map(|v| v.to_string().trim_matches('"').to_string());
                PollOutcome::succeeded(video_id)
            }
            "FAILED" => PollOutcome::failed(
                data.fail_reason
                    .unwrap_or_else(|| "TikTok reported FAILED".to_string()),
            ),
            _ => PollOutcome::pending(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> PlatformSettings {
        PlatformSettings {
            client_id: "client-key".to_string(),
            client_secret: "client-secret".to_string(),
            api_base: server.uri().parse().unwrap(),
            auth_base: server.uri().parse().unwrap(),
        }
    }

    fn credential_expiring_in(secs: i64) -> StoredCredential {
        StoredCredential {
            access_token: "old-token".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_at: Utc::now() + Duration::seconds(secs),
            account: None,
        }
    }

    async fn adapter_with_credential(
        server: &MockServer,
        credential: StoredCredential,
    ) -> TikTokAdapter {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(Destination::Tiktok, credential).await;
        TikTokAdapter::new(settings_for(server), store)
    }

    #[tokio::test]
    async fn fresh_credentials_skip_the_token_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let adapter = adapter_with_credential(&server, credential_expiring_in(3600)).await;
        let credential = adapter.valid_credential(false).await.unwrap();
        assert_eq!(credential.access_token, "old-token");
    }

    #[tokio::test]
    async fn near_expiry_refreshes_and_saves() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token/"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-token",
                "refresh_token": "refresh-2",
                "expires_in": 86400
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        store
            .insert(Destination::Tiktok, credential_expiring_in(60))
            .await;
        let adapter = TikTokAdapter::new(settings_for(&server), store.clone());

        let refreshed = adapter.valid_credential(false).await.unwrap();
        assert_eq!(refreshed.access_token, "new-token");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh-2"));
        assert!(!refreshed.needs_refresh());

        // Saved through the store, not just returned
        let saved = store.get(Destination::Tiktok).await.unwrap().unwrap();
        assert_eq!(saved.access_token, "new-token");
    }

    #[tokio::test]
    async fn begin_publish_returns_the_publish_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/video/init/"))
            .and(body_partial_json(json!({
                "source_info": {
                    "source": "PULL_FROM_URL",
                    "video_url": "https://cdn.example.com/final.mp4"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "publish_id": "pub-123" },
                "error": { "code": "ok", "message": "" }
            })))
            .mount(&server)
            .await;

        let adapter = adapter_with_credential(&server, credential_expiring_in(3600)).await;
        let credential = adapter.valid_credential(false).await.unwrap();
        let content =
            PostContent::new("Big reveal").with_hashtags(vec!["podcast".to_string()]);

        let job = adapter
            .begin_publish(&credential, &content, "https://cdn.example.com/final.mp4")
            .await
            .unwrap();
        assert_eq!(job.as_str(), "pub-123");
    }

    #[tokio::test]
    async fn poll_maps_platform_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/status/fetch/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "status": "PROCESSING_UPLOAD" },
                "error": { "code": "ok", "message": "" }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/status/fetch/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "status": "PUBLISH_COMPLETE",
                    "publicaly_available_post_id": [7345123456789_i64]
                },
                "error": { "code": "ok", "message": "" }
            })))
            .mount(&server)
            .await;

        let adapter = adapter_with_credential(&server, credential_expiring_in(3600)).await;
        let credential = adapter.valid_credential(false).await.unwrap();
        let job = ExternalJobId::new("pub-123");

        let pending = adapter.poll_status(&credential, &job).await.unwrap();
        assert!(!pending.terminal);

        let done = adapter.poll_status(&credential, &job).await.unwrap();
        assert!(done.terminal && done.success);
        assert_eq!(done.video_id.as_deref(), Some("7345123456789"));
    }

    #[tokio::test]
    async fn error_envelopes_become_platform_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/post/publish/video/init/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {
                    "code": "spam_risk_too_many_posts",
                    "message": "daily post cap reached"
                }
            })))
            .mount(&server)
            .await;

        let adapter = adapter_with_credential(&server, credential_expiring_in(3600)).await;
        let credential = adapter.valid_credential(false).await.unwrap();

        let err = adapter
            .begin_publish(&credential, &PostContent::new("t"), "https://cdn.example.com/v.mp4")
            .await
            .unwrap_err();
        match err {
            PublishError::PlatformRejected { message, .. } => {
                assert!(message.contains("spam_risk_too_many_posts"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
