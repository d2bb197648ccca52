//! Instagram Reels adapter.
//!
//! Graph API content publishing: create a media container pointing at the
//! hosted video, wait for Instagram to ingest it, then publish the
//! container. The container ID is the external job; a poll that finds the
//! container `FINISHED` publishes it in the same call, so success and the
//! final media ID arrive together.
//!
//! Long-lived tokens have no refresh token; they renew through the
//! `fb_exchange_token` grant using the current token itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::info;

use clipcast_models::{Destination, PostContent};

use crate::adapters::{
    api_error, format_hashtags, fresh_credential, ExternalJobId, PlatformAdapter, PollOutcome,
};
use crate::config::PlatformSettings;
use crate::credentials::{CredentialStore, StoredCredential};
use crate::error::{PublishError, PublishResult};
use crate::retry::{retry_async, RetryConfig};

pub struct InstagramAdapter {
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
struct CreatedObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    status_code: Option<String>,
}

impl InstagramAdapter {
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

    fn ig_user_id<'a>(&self, credential: &'a StoredCredential) -> PublishResult<&'a str> {
        credential
            .account
            .as_ref()
            .and_then(|a| a.account_id.as_deref())
            .ok_or_else(|| {
                PublishError::credential(
                    self.destination(),
                    "connected account is missing its Instagram user id",
                )
            })
    }

    async fn refresh(&self, current: StoredCredential) -> PublishResult<StoredCredential> {
        let config = RetryConfig::new("instagram token exchange");
        let token: TokenResponse = retry_async(&config, || async {
            let response = self
                .http
                .get(Self::endpoint(&self.settings.auth_base, "oauth/access_token"))
                .query(&[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", self.settings.client_id.as_str()),
                    ("client_secret", self.settings.client_secret.as_str()),
                    ("fb_exchange_token", current.access_token.as_str()),
                ])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(
                    api_error(Destination::InstagramReels, "token exchange", response).await,
                );
            }
            Ok(response.json::<TokenResponse>().await?)
        })
        .await
        .into_result()?;

        Ok(StoredCredential {
            access_token: token.access_token,
            refresh_token: None,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
            account: current.account,
        })
    }

    fn caption_for_reel(content: &PostContent) -> String {
        let mut parts = Vec::new();
        if !content.title.is_empty() {
            parts.push(content.title.clone());
        }
        if !content.description.is_empty() {
            parts.push(content.description.clone());
        }
        let tags = format_hashtags(&content.hashtags);
        if !tags.is_empty() {
            parts.push(tags);
        }
        parts.join("\n\n")
    }

    async fn publish_container(
        &self,
        credential: &StoredCredential,
        container_id: &str,
    ) -> PublishResult<String> {
        let user_id = self.ig_user_id(credential)?;
        let response = self
            .http
            .post(Self::endpoint(
                &self.settings.api_base,
                &format!("{}/media_publish", user_id),
            ))
            .query(&[
                ("creation_id", container_id),
                ("access_token", credential.access_token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "media publish", response).await);
        }

        let published: CreatedObject = response.json().await?;
        info!("Instagram published media {}", published.id);
        Ok(published.id)
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn destination(&self) -> Destination {
        Destination::InstagramReels
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
        let user_id = self.ig_user_id(credential)?;
        let caption = Self::caption_for_reel(content);

        let response = self
            .http
            .post(Self::endpoint(
                &self.settings.api_base,
                &format!("{}/media", user_id),
            ))
            .query(&[
                ("media_type", "REELS"),
                ("video_url", media_url),
                ("caption", caption.as_str()),
                ("access_token", credential.access_token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "container create", response).await);
        }

        let container: CreatedObject = response.json().await?;
        info!("Instagram accepted media container {}", container.id);
        Ok(ExternalJobId::new(container.id))
    }

    async fn poll_status(
        &self,
        credential: &StoredCredential,
        job: &ExternalJobId,
    ) -> PublishResult<PollOutcome> {
        let response = self
            .http
            .get(Self::endpoint(&self.settings.api_base, job.as_str()))
            .query(&[
                ("fields", "status_code"),
                ("access_token", credential.access_token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(self.destination(), "container status", response).await);
        }

        let status: ContainerStatus = response.json().await?;
        Ok(match status.status_code.as_deref() {
            Some("FINISHED") => {
                let media_id = self.publish_container(credential, job.as_str()).await?;
                PollOutcome::succeeded(Some(media_id))
            }
            Some("PUBLISHED") => PollOutcome::succeeded(None),
            Some("ERROR") => {
                PollOutcome::failed("Instagram reported ERROR for the media container")
            }
            Some("EXPIRED") => {
                PollOutcome::failed("media container expired before it was published")
            }
            _ => PollOutcome::pending(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{AccountMeta, MemoryCredentialStore};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> PlatformSettings {
        PlatformSettings {
            client_id: "app-id".to_string(),
            client_secret: "app-secret".to_string(),
            api_base: server.uri().parse().unwrap(),
            auth_base: server.uri().parse().unwrap(),
        }
    }

    fn connected_credential(expires_in_secs: i64) -> StoredCredential {
        StoredCredential {
            access_token: "ig-token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            account: Some(AccountMeta {
                account_id: Some("ig-99".to_string()),
                display_name: Some("clipcast".to_string()),
            }),
        }
    }

    async fn adapter_with(server: &MockServer, credential: StoredCredential) -> InstagramAdapter {
        let store = Arc::new(MemoryCredentialStore::new());
        store.insert(Destination::InstagramReels, credential).await;
        InstagramAdapter::new(settings_for(server), store)
    }

    #[tokio::test]
    async fn near_expiry_exchanges_the_long_lived_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("grant_type", "fb_exchange_token"))
            .and(query_param("fb_exchange_token", "ig-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ig-token-2",
                "token_type": "bearer",
                "expires_in": 5184000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter_with(&server, connected_credential(120)).await;
        let refreshed = adapter.valid_credential(false).await.unwrap();
        assert_eq!(refreshed.access_token, "ig-token-2");
        // Account metadata survives the exchange
        assert_eq!(
            refreshed
                .account
                .as_ref()
                .and_then(|a| a.account_id.as_deref()),
            Some("ig-99")
        );
    }

    #[tokio::test]
    async fn container_flow_publishes_when_finished() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ig-99/media"))
            .and(query_param("media_type", "REELS"))
            .and(query_param(
                "video_url",
                "https://cdn.example.com/final.mp4",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "container-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/container-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": "IN_PROGRESS"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/container-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": "FINISHED"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ig-99/media_publish"))
            .and(query_param("creation_id", "container-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "media-7"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_with(&server, connected_credential(5184000)).await;
        let credential = adapter.valid_credential(false).await.unwrap();
        let content = PostContent::new("Reel").with_hashtags(vec!["pod".to_string()]);

        let job = adapter
            .begin_publish(&credential, &content, "https://cdn.example.com/final.mp4")
            .await
            .unwrap();
        assert_eq!(job.as_str(), "container-1");

        let pending = adapter.poll_status(&credential, &job).await.unwrap();
        assert!(!pending.terminal);

        let done = adapter.poll_status(&credential, &job).await.unwrap();
        assert!(done.terminal && done.success);
        assert_eq!(done.video_id.as_deref(), Some("media-7"));
    }

    #[tokio::test]
    async fn missing_account_id_is_a_credential_error() {
        let server = MockServer::start().await;
        let mut credential = connected_credential(5184000);
        credential.account = None;
        let adapter = adapter_with(&server, credential.clone()).await;

        let err = adapter
            .begin_publish(&credential, &PostContent::new("t"), "https://cdn.example.com/v.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Credential { .. }));
    }

    #[tokio::test]
    async fn error_containers_fail_the_poll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/container-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status_code": "ERROR"
            })))
            .mount(&server)
            .await;

        let adapter = adapter_with(&server, connected_credential(5184000)).await;
        let credential = adapter.valid_credential(false).await.unwrap();

        let outcome = adapter
            .poll_status(&credential, &ExternalJobId::new("container-9"))
            .await
            .unwrap();
        assert!(outcome.terminal && !outcome.success);
    }
}
