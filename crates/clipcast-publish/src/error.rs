//! Publish error types.

use std::time::Duration;
use thiserror::Error;

use clipcast_compose::ComposeError;
use clipcast_models::{Destination, FailureKind, PostId, StatusKind};

/// Errors from the publish store, scheduler and platform adapters.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential error for {destination}: {message}")]
    Credential {
        destination: Destination,
        message: String,
    },

    #[error("{destination} rejected the publish: {message}")]
    PlatformRejected {
        destination: Destination,
        message: String,
    },

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Publish attempt timed out after {0:?}")]
    AttemptTimeout(Duration),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: StatusKind, to: StatusKind },

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Composition failed: {0}")]
    Compose(#[from] ComposeError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PublishResult<T> = Result<T, PublishError>;

impl PublishError {
    pub fn configuration(message: impl Into<String>) -> Self {
        PublishError::Configuration(message.into())
    }

    pub fn credential(destination: Destination, message: impl Into<String>) -> Self {
        PublishError::Credential {
            destination,
            message: message.into(),
        }
    }

    pub fn platform_rejected(destination: Destination, message: impl Into<String>) -> Self {
        PublishError::PlatformRejected {
            destination,
            message: message.into(),
        }
    }

    pub fn render_failed(message: impl Into<String>) -> Self {
        PublishError::RenderFailed(message.into())
    }

    /// The failure category recorded on a post when this error lands it in
    /// the failed state.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PublishError::Configuration(_)
            | PublishError::Compose(_)
            | PublishError::IllegalTransition { .. }
            | PublishError::PostNotFound(_)
            | PublishError::Json(_) => FailureKind::Configuration,
            PublishError::Credential { .. } => FailureKind::Credential,
            PublishError::Http(_) | PublishError::Io(_) | PublishError::AttemptTimeout(_) => {
                FailureKind::Network
            }
            PublishError::PlatformRejected { .. } => FailureKind::PlatformRejected,
            PublishError::RenderFailed(_) => FailureKind::Render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_kinds_map_by_variant() {
        assert_eq!(
            PublishError::configuration("bad timeline").failure_kind(),
            FailureKind::Configuration
        );
        assert_eq!(
            PublishError::credential(Destination::Tiktok, "refresh failed").failure_kind(),
            FailureKind::Credential
        );
        assert_eq!(
            PublishError::platform_rejected(Destination::Tiktok, "video too long").failure_kind(),
            FailureKind::PlatformRejected
        );
        assert_eq!(
            PublishError::render_failed("encoder crashed").failure_kind(),
            FailureKind::Render
        );
        assert_eq!(
            PublishError::AttemptTimeout(Duration::from_secs(1800)).failure_kind(),
            FailureKind::Network
        );
    }
}
