//! Post list persistence.
//!
//! The store snapshots to a single JSON file. Writes go through a temp file
//! and rename so a crash mid-write leaves the previous snapshot intact.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use clipcast_models::Post;

use crate::error::{PublishError, PublishResult};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
    posts: Vec<Post>,
}

/// Load the persisted post list. A missing file is an empty store, not an
/// error; a version mismatch is refused rather than silently migrated.
pub async fn load_posts(path: &Path) -> PublishResult<Vec<Post>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)?;
    if envelope.version != SNAPSHOT_VERSION {
        return Err(PublishError::configuration(format!(
            "snapshot {} has version {}, expected {}",
            path.display(),
            envelope.version,
            SNAPSHOT_VERSION
        )));
    }
    Ok(envelope.posts)
}

/// Persist the post list atomically.
pub async fn save_posts(path: &Path, posts: &[Post]) -> PublishResult<()> {
    let envelope = SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        saved_at: Some(Utc::now()),
        posts: posts.to_vec(),
    };
    let bytes = serde_json::to_vec_pretty(&envelope)?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Saved {} posts to {}", posts.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipcast_models::{Destination, PostContent};

    #[tokio::test]
    async fn missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let posts = load_posts(&dir.path().join("absent.json")).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn posts_survive_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publish-state.json");

        let posts = vec![
            Post::new(Destination::Tiktok, PostContent::new("one")),
            Post::new(Destination::YoutubeShorts, PostContent::new("two")),
        ];
        save_posts(&path, &posts).await.unwrap();

        let loaded = load_posts(&path).await.unwrap();
        assert_eq!(loaded, posts);
        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn version_mismatch_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("publish-state.json");
        tokio::fs::write(&path, r#"{"version": 99, "posts": []}"#)
            .await
            .unwrap();

        let err = load_posts(&path).await.unwrap_err();
        assert!(matches!(err, PublishError::Configuration(_)));
    }
}
