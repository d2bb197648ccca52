//! The publish store.
//!
//! Authoritative, transition-checked record of every scheduled post. The
//! queue and the in-progress job are derived from post status at read time;
//! there is no second list that could drift out of sync. All mutation goes
//! through the legality check in `apply`, so every caller is guarded the
//! same way.

use std::sync::RwLock;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use clipcast_models::{
    Destination, FailureKind, Post, PostContent, PostId, PostStatus, PostStatusView, StatusKind,
};

use crate::error::{PublishError, PublishResult};
use crate::events::PublishEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Counts describing one publishing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub queued: usize,
    pub in_flight: usize,
}

impl RunSummary {
    /// Nothing queued and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.queued == 0 && self.in_flight == 0
    }
}

/// Owner of the post list.
///
/// Mutators take the write lock briefly and never await while holding it;
/// reads see either the previous or the new status of a post, never a torn
/// one. Change events go out on a broadcast channel after the lock drops.
pub struct PublishStore {
    posts: RwLock<Vec<Post>>,
    events: broadcast::Sender<PublishEvent>,
}

impl Default for PublishStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishStore {
    pub fn new() -> Self {
        Self::with_posts(Vec::new())
    }

    /// Build a store around an existing post list, e.g. a loaded snapshot.
    pub fn with_posts(posts: Vec<Post>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            posts: RwLock::new(posts),
            events,
        }
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<PublishEvent> {
        self.events.subscribe()
    }

    // Poisoning only marks a panic elsewhere; status writes are whole-value
    // assignments, so the guarded data stays consistent either way.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Post>> {
        self.posts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Post>> {
        self.posts.write().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: PublishEvent) {
        let _ = self.events.send(event);
    }

    fn emit_changed(&self, post: &Post) {
        self.emit(PublishEvent::PostChanged {
            post: post.status_view(),
        });
    }

    // ---- creation and content -------------------------------------------

    /// Create a new idle post.
    pub fn create_post(&self, destination: Destination, content: PostContent) -> Post {
        // The id is fresh, so insertion cannot collide.
        let post = Post::new(destination, content);
        self.write().push(post.clone());
        self.emit_changed(&post);
        post
    }

    /// Insert a caller-built post, e.g. one carrying a clip ID and format.
    pub fn add_post(&self, post: Post) -> PublishResult<Post> {
        {
            let mut posts = self.write();
            if posts.iter().any(|p| p.id == post.id) {
                return Err(PublishError::configuration(format!(
                    "duplicate post id {}",
                    post.id
                )));
            }
            posts.push(post.clone());
        }
        self.emit_changed(&post);
        Ok(post)
    }

    /// Replace a post's content. Allowed while idle or failed only; once a
    /// post is queued its content is fixed for the attempt.
    pub fn update_content(&self, id: &PostId, content: PostContent) -> PublishResult<Post> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            let kind = post.status_kind();
            if !matches!(kind, StatusKind::Idle | StatusKind::Failed) {
                return Err(PublishError::configuration(format!(
                    "content of post {} cannot change while {}",
                    id, kind
                )));
            }
            post.content = content;
            post.clone()
        };
        self.emit_changed(&updated);
        Ok(updated)
    }

    /// Toggle the enabled flag. A disabled post keeps its status but drops
    /// out of the derived queue.
    pub fn set_enabled(&self, id: &PostId, enabled: bool) -> PublishResult<Post> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            post.enabled = enabled;
            post.clone()
        };
        self.emit_changed(&updated);
        Ok(updated)
    }

    /// Delete a post. In-flight posts must reach a terminal state first.
    pub fn delete_post(&self, id: &PostId) -> PublishResult<()> {
        {
            let mut posts = self.write();
            let index = posts
                .iter()
                .position(|p| &p.id == id)
                .ok_or_else(|| PublishError::PostNotFound(id.clone()))?;
            if posts[index].is_in_flight() {
                return Err(PublishError::configuration(format!(
                    "post {} is publishing and cannot be deleted",
                    id
                )));
            }
            posts.remove(index);
        }
        self.emit(PublishEvent::PostRemoved { id: id.clone() });
        Ok(())
    }

    /// Remove every completed post. Returns how many were removed.
    pub fn remove_completed(&self) -> usize {
        let removed: Vec<PostId> = {
            let mut posts = self.write();
            let ids = posts
                .iter()
                .filter(|p| p.status_kind() == StatusKind::Completed)
                .map(|p| p.id.clone())
                .collect::<Vec<_>>();
            posts.retain(|p| p.status_kind() != StatusKind::Completed);
            ids
        };
        let count = removed.len();
        for id in removed {
            self.emit(PublishEvent::PostRemoved { id });
        }
        count
    }

    // ---- state machine ---------------------------------------------------

    /// Apply a status transition after checking it against the legal table.
    /// Illegal transitions are logged and rejected, leaving the post
    /// untouched.
    fn apply(&self, id: &PostId, next: PostStatus) -> PublishResult<Post> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            let from = post.status_kind();
            let to = next.kind();
            if !from.can_transition(to) {
                warn!("Rejecting illegal transition {} -> {} for post {}", from, to, id);
                return Err(PublishError::IllegalTransition { from, to });
            }
            post.status = next;
            post.clone()
        };
        self.emit_changed(&updated);
        Ok(updated)
    }

    /// Queue a post for publishing. A failed post re-queues as a retry.
    pub fn queue_post(&self, id: &PostId) -> PublishResult<Post> {
        let kind = {
            let posts = self.read();
            find(&posts, id)?.status_kind()
        };
        if kind == StatusKind::Failed {
            return self.retry_post(id);
        }
        self.apply(
            id,
            PostStatus::Queued {
                queued_at: Utc::now(),
            },
        )
    }

    /// Queue every enabled idle post. Returns how many were queued.
    pub fn queue_all(&self) -> usize {
        let ids: Vec<PostId> = self
            .read()
            .iter()
            .filter(|p| p.enabled && p.status_kind() == StatusKind::Idle)
            .map(|p| p.id.clone())
            .collect();

        let mut queued = 0;
        for id in &ids {
            if self.queue_post(id).is_ok() {
                queued += 1;
            }
        }
        queued
    }

    /// Re-queue a failed post, incrementing its retry count.
    pub fn retry_post(&self, id: &PostId) -> PublishResult<Post> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            let from = post.status_kind();
            if from != StatusKind::Failed {
                warn!(
                    "Rejecting illegal transition {} -> queued for post {}",
                    from, id
                );
                return Err(PublishError::IllegalTransition {
                    from,
                    to: StatusKind::Queued,
                });
            }
            post.retry_count += 1;
            post.status = PostStatus::Queued {
                queued_at: Utc::now(),
            };
            post.clone()
        };
        self.emit_changed(&updated);
        Ok(updated)
    }

    /// Cancel one queued post back to idle.
    pub fn cancel_post(&self, id: &PostId) -> PublishResult<Post> {
        self.apply(id, PostStatus::Idle)
    }

    /// Cancel all queued posts back to idle. An already-dispatched post is
    /// not interrupted; it runs to a terminal state.
    pub fn cancel_queued(&self) -> usize {
        let ids: Vec<PostId> = self
            .read()
            .iter()
            .filter(|p| p.status_kind() == StatusKind::Queued)
            .map(|p| p.id.clone())
            .collect();

        let mut cancelled = 0;
        for id in &ids {
            if self.cancel_post(id).is_ok() {
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Atomically claim the queue head for rendering.
    ///
    /// Returns `None` while another post is in flight (the single-flight
    /// guarantee) or when the queue is empty. FIFO by creation time, stable
    /// under ties by insertion order.
    pub fn claim_next(&self) -> Option<Post> {
        let claimed = {
            let mut posts = self.write();
            if posts.iter().any(|p| p.is_in_flight()) {
                return None;
            }
            let index = posts
                .iter()
                .enumerate()
                .filter(|(_, p)| p.enabled && p.status_kind() == StatusKind::Queued)
                .min_by_key(|(i, p)| (p.created_at, *i))
                .map(|(i, _)| i)?;
            posts[index].status = PostStatus::Rendering {
                progress: 0,
                started_at: Utc::now(),
            };
            posts[index].clone()
        };
        self.emit_changed(&claimed);
        Some(claimed)
    }

    /// Record render progress. Ignored unless the post is rendering.
    pub fn set_render_progress(&self, id: &PostId, progress: u8) -> PublishResult<()> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            match &mut post.status {
                PostStatus::Rendering { progress: p, .. } => {
                    *p = progress.min(100);
                    Some(post.clone())
                }
                _ => {
                    debug!("Dropping render progress for post {}: not rendering", id);
                    None
                }
            }
        };
        if let Some(post) = updated {
            self.emit_changed(&post);
        }
        Ok(())
    }

    /// Move a rendered post into uploading.
    pub fn mark_uploading(&self, id: &PostId, media_url: String) -> PublishResult<Post> {
        self.apply(
            id,
            PostStatus::Uploading {
                progress: 0,
                media_url,
            },
        )
    }

    /// Record upload progress. Ignored unless the post is uploading.
    pub fn set_upload_progress(&self, id: &PostId, progress: u8) -> PublishResult<()> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            match &mut post.status {
                PostStatus::Uploading { progress: p, .. } => {
                    *p = progress.min(100);
                    Some(post.clone())
                }
                _ => {
                    debug!("Dropping upload progress for post {}: not uploading", id);
                    None
                }
            }
        };
        if let Some(post) = updated {
            self.emit_changed(&post);
        }
        Ok(())
    }

    /// Mark an uploading post as published.
    pub fn mark_completed(&self, id: &PostId, video_id: Option<String>) -> PublishResult<Post> {
        self.apply(
            id,
            PostStatus::Completed {
                published_at: Utc::now(),
                video_id,
            },
        )
    }

    /// Mark an in-flight post as failed, stamping the current retry count
    /// onto the failure payload.
    pub fn mark_failed(
        &self,
        id: &PostId,
        error: impl Into<String>,
        kind: FailureKind,
    ) -> PublishResult<Post> {
        let updated = {
            let mut posts = self.write();
            let post = find_mut(&mut posts, id)?;
            let from = post.status_kind();
            if !from.can_transition(StatusKind::Failed) {
                warn!(
                    "Rejecting illegal transition {} -> failed for post {}",
                    from, id
                );
                return Err(PublishError::IllegalTransition {
                    from,
                    to: StatusKind::Failed,
                });
            }
            post.status = PostStatus::Failed {
                error: error.into(),
                kind,
                retry_count: post.retry_count,
                failed_at: Utc::now(),
            };
            post.clone()
        };
        self.emit_changed(&updated);
        Ok(updated)
    }

    /// Reset queued and in-flight posts to idle after a restart.
    ///
    /// In-flight work has no resumption point; the user re-submits. This is
    /// a load-time repair, not a runtime transition, so it bypasses the
    /// legality table. Returns how many posts were reset.
    pub fn reset_in_flight(&self) -> usize {
        let reset: Vec<Post> = {
            let mut posts = self.write();
            let mut touched = Vec::new();
            for post in posts.iter_mut() {
                if matches!(
                    post.status_kind(),
                    StatusKind::Queued | StatusKind::Rendering | StatusKind::Uploading
                ) {
                    post.status = PostStatus::Idle;
                    touched.push(post.clone());
                }
            }
            touched
        };
        if !reset.is_empty() {
            info!("Reset {} interrupted posts to idle", reset.len());
        }
        let count = reset.len();
        for post in reset {
            self.emit_changed(&post);
        }
        count
    }

    // ---- derived selectors ----------------------------------------------

    /// Snapshot of every post.
    pub fn list(&self) -> Vec<Post> {
        self.read().clone()
    }

    pub fn get(&self, id: &PostId) -> Option<Post> {
        self.read().iter().find(|p| &p.id == id).cloned()
    }

    /// The derived queue: enabled queued posts, FIFO by creation time.
    pub fn queue(&self) -> Vec<Post> {
        let posts = self.read();
        let mut queued: Vec<(usize, &Post)> = posts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.enabled && p.status_kind() == StatusKind::Queued)
            .map(|(i, p)| (i, p))
            .collect();
        queued.sort_by_key(|(i, p)| (p.created_at, *i));
        queued.into_iter().map(|(_, p)| p.clone()).collect()
    }

    /// The single in-flight post, if any.
    pub fn in_progress(&self) -> Option<Post> {
        self.read().iter().find(|p| p.is_in_flight()).cloned()
    }

    pub fn failed_posts(&self) -> Vec<Post> {
        self.read()
            .iter()
            .filter(|p| p.status_kind() == StatusKind::Failed)
            .cloned()
            .collect()
    }

    /// Status views for every post, the shape the UI consumes.
    pub fn status_views(&self) -> Vec<PostStatusView> {
        self.read().iter().map(|p| p.status_view()).collect()
    }

    pub fn run_summary(&self) -> RunSummary {
        let posts = self.read();
        let mut summary = RunSummary {
            completed: 0,
            failed: 0,
            queued: 0,
            in_flight: 0,
        };
        for post in posts.iter() {
            match post.status_kind() {
                StatusKind::Completed => summary.completed += 1,
                StatusKind::Failed => summary.failed += 1,
                StatusKind::Queued if post.enabled => summary.queued += 1,
                kind if kind.is_in_flight() => summary.in_flight += 1,
                _ => {}
            }
        }
        summary
    }

    /// Nothing queued and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.run_summary().is_drained()
    }

    /// Announce the end of a publishing run.
    pub fn emit_run_completed(&self) -> RunSummary {
        let summary = self.run_summary();
        info!(
            "Publish run complete: {} published, {} failed",
            summary.completed, summary.failed
        );
        self.emit(PublishEvent::RunCompleted {
            completed: summary.completed,
            failed: summary.failed,
        });
        summary
    }
}

fn find<'a>(posts: &'a [Post], id: &PostId) -> PublishResult<&'a Post> {
    posts
        .iter()
        .find(|p| &p.id == id)
        .ok_or_else(|| PublishError::PostNotFound(id.clone()))
}

fn find_mut<'a>(posts: &'a mut [Post], id: &PostId) -> PublishResult<&'a mut Post> {
    posts
        .iter_mut()
        .find(|p| &p.id == id)
        .ok_or_else(|| PublishError::PostNotFound(id.clone()))
}
