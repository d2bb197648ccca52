//! Render service client.
//!
//! The scheduler hands a `RenderRequest` to the render service, which cuts
//! the clip and hosts the finished media file. The service is async: submit
//! returns a job ID and the client polls until the job reaches a terminal
//! status.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use clipcast_models::RenderRequest;

use crate::config::RenderServiceConfig;
use crate::error::{PublishError, PublishResult};

/// Output of a finished render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMedia {
    /// Hosted URL of the rendered video
    pub media_url: String,
}

/// Renders a clip into a hosted media file, reporting progress along the way.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    async fn render(
        &self,
        request: &RenderRequest,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> PublishResult<RenderedMedia>;
}

#[derive(Debug, Deserialize)]
struct CreateRenderResponse {
    id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RenderJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
struct RenderStatusResponse {
    status: RenderJobStatus,
    #[serde(default)]
    progress: Option<u8>,
    #[serde(default)]
    output_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the render service.
pub struct HttpRenderService {
    http: reqwest::Client,
    config: RenderServiceConfig,
}

impl HttpRenderService {
    pub fn new(config: RenderServiceConfig) -> PublishResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.as_str().trim_end_matches('/'),
            suffix
        )
    }

    async fn submit(&self, request: &RenderRequest) -> PublishResult<String> {
        let response = self
            .http
            .post(self.endpoint("renders"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::render_failed(format!(
                "render service returned {}: {}",
                status, body
            )));
        }

        let created: CreateRenderResponse = response.json().await?;
        Ok(created.id)
    }

    async fn poll(&self, job_id: &str) -> PublishResult<RenderStatusResponse> {
        let response = self
            .http
            .get(self.endpoint(&format!("renders/{}", job_id)))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::render_failed(format!(
                "render status for {} returned {}: {}",
                job_id, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ClipRenderer for HttpRenderService {
    async fn render(
        &self,
        request: &RenderRequest,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> PublishResult<RenderedMedia> {
        let job_id = self.submit(request).await?;
        info!("Submitted render job {}", job_id);

        loop {
            tokio::time::sleep(self.config.poll_interval).await;

            let status = self.poll(&job_id).await?;
            match status.status {
                RenderJobStatus::Queued | RenderJobStatus::Processing => {
                    if let Some(p) = status.progress {
                        progress(p.min(100));
                    }
                }
                RenderJobStatus::Completed => {
                    let media_url = status.output_url.ok_or_else(|| {
                        PublishError::render_failed(format!(
                            "render job {} completed without an output URL",
                            job_id
                        ))
                    })?;
                    debug!("Render job {} finished: {}", job_id, media_url);
                    return Ok(RenderedMedia { media_url });
                }
                RenderJobStatus::Failed => {
                    return Err(PublishError::render_failed(
                        status
                            .error
                            .unwrap_or_else(|| format!("render job {} failed", job_id)),
                    ));
                }
            }
        }
    }
}
