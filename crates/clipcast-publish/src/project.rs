//! Clip project library.
//!
//! A project file is the bridge between the editor and the publish daemon:
//! each entry pairs a clip ID with the composition request that cuts it.
//! The scheduler resolves clips through `ClipSource` at dispatch time, so
//! the composition in force is the one current when the attempt starts.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use clipcast_compose::{assemble_render_plan, CompositionRequest};
use clipcast_models::{Post, RenderRequest};

use crate::error::{PublishError, PublishResult};

/// One publishable clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Composition the clip renders from
    pub composition: CompositionRequest,
}

/// A named collection of clips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipProject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub clips: Vec<ClipEntry>,
}

/// Resolves a post to the render request for its clip.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn render_request(&self, post: &Post) -> PublishResult<RenderRequest>;
}

/// Clip lookup backed by a JSON project file loaded at startup.
pub struct ProjectLibrary {
    project: ClipProject,
}

impl ProjectLibrary {
    pub fn new(project: ClipProject) -> Self {
        Self { project }
    }

    pub async fn load(path: &Path) -> PublishResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let project: ClipProject = serde_json::from_slice(&bytes)?;
        info!(
            "Loaded project '{}' with {} clips",
            project.name,
            project.clips.len()
        );
        Ok(Self::new(project))
    }

    pub fn entry(&self, clip_id: &str) -> Option<&ClipEntry> {
        self.project.clips.iter().find(|c| c.id == clip_id)
    }

    pub fn clip_ids(&self) -> Vec<&str> {
        self.project.clips.iter().map(|c| c.id.as_str()).collect()
    }
}

#[async_trait]
impl ClipSource for ProjectLibrary {
    async fn render_request(&self, post: &Post) -> PublishResult<RenderRequest> {
        let clip_id = post.clip_id.as_deref().ok_or_else(|| {
            PublishError::configuration(format!("post {} has no clip attached", post.id))
        })?;
        let entry = self.entry(clip_id).ok_or_else(|| {
            PublishError::configuration(format!("clip {} is not in the project", clip_id))
        })?;

        // The post's format wins over the stored composition, so one clip
        // can target portrait and landscape destinations from the same entry.
        let mut composition = entry.composition.clone();
        composition.format = post.format;
        Ok(assemble_render_plan(composition)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipcast_models::{AspectRatio, Destination, PostContent, Word};

    fn library_with_clip(clip_id: &str) -> ProjectLibrary {
        let composition = CompositionRequest {
            words: vec![Word::new("hello", 0.0, 0.5)],
            caption_style: Default::default(),
            clip_start_seconds: 10.0,
            clip_end_seconds: 12.5,
            fps: 30.0,
            format: AspectRatio::LANDSCAPE,
            audio_url: "https://cdn.example.com/episode.mp3".to_string(),
            background: Default::default(),
            tracks: Vec::new(),
            multicam: None,
        };
        ProjectLibrary::new(ClipProject {
            name: "episode 12".to_string(),
            clips: vec![ClipEntry {
                id: clip_id.to_string(),
                title: "cold open".to_string(),
                composition,
            }],
        })
    }

    #[tokio::test]
    async fn resolves_a_post_to_its_clip_plan() {
        let library = library_with_clip("clip-1");
        let post = Post::new(Destination::Tiktok, PostContent::new("title"))
            .with_clip("clip-1")
            .with_format(AspectRatio::PORTRAIT);

        let request = library.render_request(&post).await.unwrap();
        assert_eq!(request.plan.duration_in_frames, 75);
        // Post format overrides the stored landscape composition
        assert_eq!(request.plan.width, 1080);
        assert_eq!(request.plan.height, 1920);
    }

    #[tokio::test]
    async fn unknown_clips_are_configuration_errors() {
        let library = library_with_clip("clip-1");
        let post = Post::new(Destination::Tiktok, PostContent::new("title"))
            .with_clip("clip-404");

        let err = library.render_request(&post).await.unwrap_err();
        assert!(matches!(err, PublishError::Configuration(_)));
    }

    #[tokio::test]
    async fn posts_without_a_clip_are_configuration_errors() {
        let library = library_with_clip("clip-1");
        let post = Post::new(Destination::Tiktok, PostContent::new("title"));

        let err = library.render_request(&post).await.unwrap_err();
        assert!(matches!(err, PublishError::Configuration(_)));
    }
}
