//! Daemon configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use url::Url;

use clipcast_models::Destination;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between platform status polls
    pub poll_interval: Duration,
    /// Pause between queue checks while the queue is empty
    pub idle_interval: Duration,
    /// Hard ceiling on one render+upload attempt
    pub attempt_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            idle_interval: Duration::from_secs(3),
            attempt_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("PUBLISH_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            idle_interval: Duration::from_secs(
                std::env::var("PUBLISH_IDLE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            ),
            attempt_timeout: Duration::from_secs(
                std::env::var("PUBLISH_ATTEMPT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30 * 60),
            ),
        }
    }
}

/// Render service endpoint configuration.
#[derive(Debug, Clone)]
pub struct RenderServiceConfig {
    /// Base URL of the render service
    pub base_url: Url,
    /// Interval between render status polls
    pub poll_interval: Duration,
    /// Timeout for individual HTTP calls to the service
    pub request_timeout: Duration,
}

impl Default for RenderServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_render_url(),
            poll_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn default_render_url() -> Url {
    Url::parse("http://localhost:3123").expect("static URL")
}

impl RenderServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: env_url("RENDER_SERVICE_URL").unwrap_or_else(default_render_url),
            poll_interval: Duration::from_secs(
                std::env::var("RENDER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            ),
            request_timeout: Duration::from_secs(
                std::env::var("RENDER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// OAuth app settings for one destination platform.
#[derive(Clone)]
pub struct PlatformSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Base URL of the platform API
    pub api_base: Url,
    /// Base URL of the token endpoint, where it differs from the API
    pub auth_base: Url,
}

// The client secret stays out of startup logs
impl fmt::Debug for PlatformSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_base", &self.api_base.as_str())
            .field("auth_base", &self.auth_base.as_str())
            .finish()
    }
}

/// Full daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub scheduler: SchedulerConfig,
    pub render: RenderServiceConfig,
    /// Path of the posts snapshot file
    pub state_path: PathBuf,
    /// Path of the stored platform credentials
    pub credentials_path: PathBuf,
    /// Path of the clip project file posts are resolved against
    pub project_path: PathBuf,
    pub tiktok: Option<PlatformSettings>,
    pub youtube: Option<PlatformSettings>,
    pub instagram: Option<PlatformSettings>,
}

impl DaemonConfig {
    /// Create config from environment variables.
    ///
    /// Platform settings are present only when the destination's client ID
    /// and secret are both set; unconfigured destinations simply get no
    /// adapter registered.
    pub fn from_env() -> Self {
        Self {
            scheduler: SchedulerConfig::from_env(),
            render: RenderServiceConfig::from_env(),
            state_path: env_path("PUBLISH_STATE_PATH", "publish-state.json"),
            credentials_path: env_path("PUBLISH_CREDENTIALS_PATH", "platform-credentials.json"),
            project_path: env_path("CLIPCAST_PROJECT", "project.json"),
            tiktok: platform_from_env(
                Destination::Tiktok,
                "TIKTOK",
                "https://open.tiktokapis.com",
                "https://open.tiktokapis.com",
            ),
            youtube: platform_from_env(
                Destination::YoutubeShorts,
                "YOUTUBE",
                "https://www.googleapis.com",
                "https://oauth2.googleapis.com",
            ),
            instagram: platform_from_env(
                Destination::InstagramReels,
                "INSTAGRAM",
                "https://graph.facebook.com/v21.0",
                "https://graph.facebook.com/v21.0",
            ),
        }
    }

    /// Destinations with platform settings configured.
    pub fn configured_destinations(&self) -> Vec<Destination> {
        let mut destinations = Vec::new();
        if self.tiktok.is_some() {
            destinations.push(Destination::Tiktok);
        }
        if self.youtube.is_some() {
            destinations.push(Destination::YoutubeShorts);
        }
        if self.instagram.is_some() {
            destinations.push(Destination::InstagramReels);
        }
        destinations
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            render: RenderServiceConfig::default(),
            state_path: PathBuf::from("publish-state.json"),
            credentials_path: PathBuf::from("platform-credentials.json"),
            project_path: PathBuf::from("project.json"),
            tiktok: None,
            youtube: None,
            instagram: None,
        }
    }
}

fn platform_from_env(
    destination: Destination,
    prefix: &str,
    default_api: &str,
    default_auth: &str,
) -> Option<PlatformSettings> {
    let client_id = std::env::var(format!("{}_CLIENT_ID", prefix)).ok()?;
    let client_secret = std::env::var(format!("{}_CLIENT_SECRET", prefix)).ok()?;

    if client_id.is_empty() || client_secret.is_empty() {
        warn!(
            "Ignoring {} credentials: client ID or secret is empty",
            destination
        );
        return None;
    }

    Some(PlatformSettings {
        client_id,
        client_secret,
        api_base: env_url(&format!("{}_API_BASE", prefix))
            .unwrap_or_else(|| Url::parse(default_api).expect("static URL")),
        auth_base: env_url(&format!("{}_AUTH_BASE", prefix))
            .unwrap_or_else(|| Url::parse(default_auth).expect("static URL")),
    })
}

fn env_url(var: &str) -> Option<Url> {
    let raw = std::env::var(var).ok()?;
    match Url::parse(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", var, raw, e);
            None
        }
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
