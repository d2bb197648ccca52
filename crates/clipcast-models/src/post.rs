//! Posts and the publish status state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::AspectRatio;

/// Unique identifier for a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    /// Generate a new random post ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported publish destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Tiktok,
    YoutubeShorts,
    InstagramReels,
}

impl Destination {
    pub const ALL: &'static [Destination] = &[
        Destination::Tiktok,
        Destination::YoutubeShorts,
        Destination::InstagramReels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Tiktok => "tiktok",
            Destination::YoutubeShorts => "youtube_shorts",
            Destination::InstagramReels => "instagram_reels",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Destination {
    type Err = DestinationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiktok" => Ok(Destination::Tiktok),
            "youtube_shorts" | "youtube" => Ok(Destination::YoutubeShorts),
            "instagram_reels" | "instagram" => Ok(Destination::InstagramReels),
            _ => Err(DestinationParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown destination: {0}")]
pub struct DestinationParseError(String);

/// User-editable content attached to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate, Default)]
pub struct PostContent {
    /// Title or primary caption text
    #[validate(length(max = 150))]
    pub title: String,

    /// Longer description where the destination supports one
    #[serde(default)]
    #[validate(length(max = 2200))]
    pub description: String,

    /// Hashtags without the leading '#'
    #[serde(default)]
    #[validate(length(max = 30))]
    pub hashtags: Vec<String>,
}

impl PostContent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            hashtags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hashtags(mut self, hashtags: Vec<String>) -> Self {
        self.hashtags = hashtags;
        self
    }
}

/// Category of a publish failure.
///
/// All kinds land in the same `failed` state; the kind is recorded so the
/// stored error stays attributable (and a future policy could treat
/// transient failures differently).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Malformed configuration (bad timeline, unknown destination)
    Configuration,
    /// Credential refresh failed; the account must be reconnected
    Credential,
    /// Transient network failure during init or polling
    Network,
    /// The platform reported a terminal publish failure
    PlatformRejected,
    /// The render service reported a terminal failure
    Render,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Credential => "credential",
            FailureKind::Network => "network",
            FailureKind::PlatformRejected => "platform_rejected",
            FailureKind::Render => "render",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Publish status of a post, with per-state payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PostStatus {
    /// Not scheduled
    #[default]
    Idle,
    /// Waiting in the derived queue
    Queued { queued_at: DateTime<Utc> },
    /// Render in progress
    Rendering {
        #[serde(default)]
        progress: u8,
        started_at: DateTime<Utc>,
    },
    /// Upload in progress
    Uploading {
        #[serde(default)]
        progress: u8,
        media_url: String,
    },
    /// Published successfully
    Completed {
        published_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        video_id: Option<String>,
    },
    /// Publish attempt failed
    Failed {
        error: String,
        kind: FailureKind,
        #[serde(default)]
        retry_count: u32,
        failed_at: DateTime<Utc>,
    },
}

impl PostStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            PostStatus::Idle => StatusKind::Idle,
            PostStatus::Queued { .. } => StatusKind::Queued,
            PostStatus::Rendering { .. } => StatusKind::Rendering,
            PostStatus::Uploading { .. } => StatusKind::Uploading,
            PostStatus::Completed { .. } => StatusKind::Completed,
            PostStatus::Failed { .. } => StatusKind::Failed,
        }
    }

    /// Rendering or uploading.
    pub fn is_in_flight(&self) -> bool {
        self.kind().is_in_flight()
    }
}

/// Status discriminant, used for transition checks and views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Idle,
    Queued,
    Rendering,
    Uploading,
    Completed,
    Failed,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Idle => "idle",
            StatusKind::Queued => "queued",
            StatusKind::Rendering => "rendering",
            StatusKind::Uploading => "uploading",
            StatusKind::Completed => "completed",
            StatusKind::Failed => "failed",
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, StatusKind::Rendering | StatusKind::Uploading)
    }

    /// The legal transition table. Everything not listed here is rejected
    /// by the store; no transition may skip states.
    pub fn can_transition(self, to: StatusKind) -> bool {
        use StatusKind::*;
        matches!(
            (self, to),
            (Idle, Queued)
                | (Queued, Rendering)
                | (Rendering, Uploading)
                | (Rendering, Failed)
                | (Uploading, Completed)
                | (Uploading, Failed)
                | (Failed, Queued)
                | (Queued, Idle)
        )
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scheduled (clip, destination) publish job.
///
/// Identity is immutable; only `status`, `content` and `enabled` mutate.
/// The publish store owns the authoritative list of posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Post {
    /// Unique post ID
    pub id: PostId,

    /// Publish destination
    pub destination: Destination,

    /// Clip this post publishes, if already cut
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_id: Option<String>,

    /// Output format
    #[serde(default)]
    pub format: AspectRatio,

    /// User-editable content
    pub content: PostContent,

    /// Disabled posts are skipped by the derived queue
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Current publish status
    #[serde(default)]
    pub status: PostStatus,

    /// Retries initiated so far; each `failed -> queued` transition
    /// increments this, and the next failure stamps it onto its payload
    #[serde(default)]
    pub retry_count: u32,

    /// Creation timestamp, the FIFO ordering key
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Post {
    /// Create a new idle post.
    pub fn new(destination: Destination, content: PostContent) -> Self {
        Self {
            id: PostId::new(),
            destination,
            clip_id: None,
            format: AspectRatio::default(),
            content,
            enabled: true,
            status: PostStatus::Idle,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_clip(mut self, clip_id: impl Into<String>) -> Self {
        self.clip_id = Some(clip_id.into());
        self
    }

    pub fn with_format(mut self, format: AspectRatio) -> Self {
        self.format = format;
        self
    }

    pub fn status_kind(&self) -> StatusKind {
        self.status.kind()
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }

    /// Project this post into the status shape consumed by the UI.
    pub fn status_view(&self) -> PostStatusView {
        let (processing, upload, video_id, error) = match &self.status {
            PostStatus::Idle | PostStatus::Queued { .. } => (0, 0, None, None),
            PostStatus::Rendering { progress, .. } => (*progress, 0, None, None),
            PostStatus::Uploading { progress, .. } => (100, *progress, None, None),
            PostStatus::Completed { video_id, .. } => (100, 100, video_id.clone(), None),
            PostStatus::Failed { error, .. } => (0, 0, None, Some(error.clone())),
        };

        PostStatusView {
            id: self.id.clone(),
            status: self.status.kind(),
            processing_progress: processing,
            upload_progress: upload,
            video_id,
            error_message: error,
            retry_count: self.retry_count,
        }
    }
}

/// Job status as queried by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PostStatusView {
    pub id: PostId,
    pub status: StatusKind,
    /// Render progress 0-100
    pub processing_progress: u8,
    /// Upload progress 0-100
    pub upload_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
}
