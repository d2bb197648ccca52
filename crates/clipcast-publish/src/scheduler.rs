//! The publish scheduler.
//!
//! Drains the derived queue one post at a time. Each attempt runs the full
//! chain: resolve the clip, render, hand the media to the destination
//! adapter, poll until the platform settles. Any error fails the post with
//! its category recorded and the loop moves on to the next queued post; a
//! wedged attempt is cut off by the attempt timeout.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use clipcast_models::Post;

use crate::adapters::AdapterRegistry;
use crate::config::SchedulerConfig;
use crate::error::{PublishError, PublishResult};
use crate::project::ClipSource;
use crate::render::ClipRenderer;
use crate::store::PublishStore;

pub struct PublishScheduler {
    config: SchedulerConfig,
    store: Arc<PublishStore>,
    clips: Arc<dyn ClipSource>,
    renderer: Arc<dyn ClipRenderer>,
    adapters: Arc<AdapterRegistry>,
    shutdown: watch::Sender<bool>,
}

impl PublishScheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<PublishStore>,
        clips: Arc<dyn ClipSource>,
        renderer: Arc<dyn ClipRenderer>,
        adapters: Arc<AdapterRegistry>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            store,
            clips,
            renderer,
            adapters,
            shutdown,
        }
    }

    /// Signal the run loop to stop. An attempt in flight is abandoned; the
    /// restart reset returns its post to idle.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Run until shutdown, processing at most one post at a time.
    pub async fn run(&self) {
        info!(
            "Publish scheduler started (poll interval: {:?}, attempt timeout: {:?})",
            self.config.poll_interval, self.config.attempt_timeout
        );
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut run_active = false;

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping scheduler");
                break;
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping scheduler");
                        break;
                    }
                }
                _ = self.tick(&mut run_active) => {}
            }
        }
    }

    /// One scheduling step: dispatch the queue head, or note the run's end.
    async fn tick(&self, run_active: &mut bool) {
        match self.store.claim_next() {
            Some(post) => {
                *run_active = true;
                self.execute(post).await;
            }
            None => {
                if *run_active && self.store.is_drained() {
                    *run_active = false;
                    self.store.emit_run_completed();
                }
                tokio::time::sleep(self.config.idle_interval).await;
            }
        }
    }

    async fn execute(&self, post: Post) {
        info!("Publishing post {} to {}", post.id, post.destination);

        let attempt = tokio::time::timeout(self.config.attempt_timeout, self.attempt(&post));
        let result = match attempt.await {
            Ok(result) => result,
            Err(_) => Err(PublishError::AttemptTimeout(self.config.attempt_timeout)),
        };

        match result {
            Ok(video_id) => {
                if let Err(e) = self.store.mark_completed(&post.id, video_id) {
                    error!("Failed to mark post {} completed: {}", post.id, e);
                } else {
                    info!("Post {} published to {}", post.id, post.destination);
                }
            }
            Err(e) => {
                error!("Publish attempt for post {} failed: {}", post.id, e);
                let kind = e.failure_kind();
                if let Err(store_err) = self.store.mark_failed(&post.id, e.to_string(), kind) {
                    error!(
                        "Failed to record failure for post {}: {}",
                        post.id, store_err
                    );
                }
            }
        }
    }

    /// The full publish chain for one claimed post.
    async fn attempt(&self, post: &Post) -> PublishResult<Option<String>> {
        let adapter = self.adapters.get(post.destination).ok_or_else(|| {
            PublishError::configuration(format!(
                "no adapter registered for {}",
                post.destination
            ))
        })?;

        let request = self.clips.render_request(post).await?;

        let store = self.store.clone();
        let post_id = post.id.clone();
        let media = self
            .renderer
            .render(&request, &move |progress| {
                let _ = store.set_render_progress(&post_id, progress);
            })
            .await?;

        self.store
            .mark_uploading(&post.id, media.media_url.clone())?;

        let credential = adapter.valid_credential(false).await?;
        let job = adapter
            .begin_publish(&credential, &post.content, &media.media_url)
            .await?;
        info!(
            "Post {} accepted by {} as job {}",
            post.id, post.destination, job
        );

        loop {
            tokio::time::sleep(self.config.poll_interval).await;

            let outcome = adapter.poll_status(&credential, &job).await?;
            if let Some(progress) = outcome.progress {
                let _ = self.store.set_upload_progress(&post.id, progress);
            }
            if outcome.terminal {
                if outcome.success {
                    return Ok(outcome.video_id);
                }
                return Err(PublishError::platform_rejected(
                    post.destination,
                    outcome
                        .message
                        .unwrap_or_else(|| "publish failed".to_string()),
                ));
            }
            debug!("Post {} still processing on {}", post.id, post.destination);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use clipcast_models::{
        AudioSource, Background, CaptionStyle, Destination, FailureKind, PostContent,
        PostStatus, RenderPlan, RenderRequest, StatusKind, WordTiming,
    };

    use crate::adapters::{ExternalJobId, PlatformAdapter, PollOutcome};
    use crate::credentials::StoredCredential;
    use crate::events::PublishEvent;
    use crate::render::RenderedMedia;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(10),
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn sample_request() -> RenderRequest {
        RenderRequest {
            plan: RenderPlan {
                words: vec![WordTiming::new("hi", 0, 15)],
                caption_style: CaptionStyle::default(),
                background: Background::default(),
                duration_in_frames: 150,
                fps: 30.0,
                width: 1080,
                height: 1920,
                tracks: Vec::new(),
                multicam: None,
            },
            audio: AudioSource {
                url: "https://cdn.example.com/audio.mp3".to_string(),
                start_frame: 0,
                end_frame: 150,
            },
        }
    }

    struct FakeClips;

    #[async_trait]
    impl ClipSource for FakeClips {
        async fn render_request(&self, _post: &Post) -> PublishResult<RenderRequest> {
            Ok(sample_request())
        }
    }

    struct FakeRenderer {
        fail: bool,
    }

    #[async_trait]
    impl ClipRenderer for FakeRenderer {
        async fn render(
            &self,
            _request: &RenderRequest,
            progress: &(dyn Fn(u8) + Send + Sync),
        ) -> PublishResult<RenderedMedia> {
            if self.fail {
                return Err(PublishError::render_failed("renderer down"));
            }
            progress(40);
            progress(100);
            Ok(RenderedMedia {
                media_url: "https://cdn.example.com/out.mp4".to_string(),
            })
        }
    }

    /// Succeeds after `pending_polls` pending responses; records the order
    /// in which posts arrive by title.
    struct FakeAdapter {
        destination: Destination,
        pending_polls: u32,
        polls: AtomicU32,
        published_titles: Mutex<Vec<String>>,
        reject: bool,
    }

    impl FakeAdapter {
        fn new(destination: Destination) -> Self {
            Self {
                destination,
                pending_polls: 1,
                polls: AtomicU32::new(0),
                published_titles: Mutex::new(Vec::new()),
                reject: false,
            }
        }

        fn rejecting(destination: Destination) -> Self {
            Self {
                reject: true,
                ..Self::new(destination)
            }
        }

        fn never_finishing(destination: Destination) -> Self {
            Self {
                pending_polls: u32::MAX,
                ..Self::new(destination)
            }
        }
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn destination(&self) -> Destination {
            self.destination
        }

        async fn valid_credential(&self, _force_refresh: bool) -> PublishResult<StoredCredential> {
            Ok(StoredCredential {
                access_token: "token".to_string(),
                refresh_token: None,
                expires_at: Utc::now() + chrono::Duration::hours(1),
                account: None,
            })
        }

        async fn begin_publish(
            &self,
            _credential: &StoredCredential,
            content: &PostContent,
            _media_url: &str,
        ) -> PublishResult<ExternalJobId> {
            self.published_titles
                .lock()
                .unwrap()
                .push(content.title.clone());
            self.polls.store(0, Ordering::SeqCst);
            Ok(ExternalJobId::new("job-1"))
        }

        async fn poll_status(
            &self,
            _credential: &StoredCredential,
            _job: &ExternalJobId,
        ) -> PublishResult<PollOutcome> {
            if self.reject {
                return Ok(PollOutcome::failed("video too long"));
            }
            let done = self.polls.fetch_add(1, Ordering::SeqCst) >= self.pending_polls;
            if done {
                Ok(PollOutcome::succeeded(Some("vid-1".to_string())))
            } else {
                Ok(PollOutcome::pending(Some(50)))
            }
        }
    }

    fn scheduler_with(
        store: Arc<PublishStore>,
        renderer: FakeRenderer,
        adapter: Arc<FakeAdapter>,
    ) -> PublishScheduler {
        let mut registry = AdapterRegistry::new();
        registry.register(adapter);
        PublishScheduler::new(
            test_config(),
            store,
            Arc::new(FakeClips),
            Arc::new(renderer),
            Arc::new(registry),
        )
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within deadline");
    }

    fn queued_post(store: &PublishStore, title: &str, offset_secs: i64) -> clipcast_models::PostId {
        let mut post = Post::new(Destination::Tiktok, PostContent::new(title)).with_clip("clip-1");
        post.created_at = Utc::now() + chrono::Duration::seconds(offset_secs);
        let post = store.add_post(post).unwrap();
        store.queue_post(&post.id).unwrap();
        post.id
    }

    #[tokio::test]
    async fn publishes_queued_posts_in_creation_order() {
        let store = Arc::new(PublishStore::new());
        let adapter = Arc::new(FakeAdapter::new(Destination::Tiktok));

        // Queue out of order; creation time decides
        let second = queued_post(&store, "second", 0);
        let first = queued_post(&store, "first", -60);

        let mut events = store.subscribe();
        let scheduler = Arc::new(scheduler_with(
            store.clone(),
            FakeRenderer { fail: false },
            adapter.clone(),
        ));
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        {
            let store = store.clone();
            wait_until(move || store.run_summary().completed == 2).await;
        }

        assert_eq!(
            *adapter.published_titles.lock().unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
        for id in [&first, &second] {
            let post = store.get(id).unwrap();
            assert_eq!(post.status_kind(), StatusKind::Completed);
            assert!(matches!(
                post.status,
                PostStatus::Completed { video_id: Some(ref v), .. } if v == "vid-1"
            ));
        }

        // The drained queue announces the run's end
        let mut saw_run_completed = false;
        for _ in 0..500 {
            match events.try_recv() {
                Ok(PublishEvent::RunCompleted { completed, failed }) => {
                    assert_eq!((completed, failed), (2, 0));
                    saw_run_completed = true;
                    break;
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(e) => panic!("event stream broke: {}", e),
            }
        }
        assert!(saw_run_completed);

        scheduler.shutdown();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn render_failures_land_in_failed_with_render_kind() {
        let store = Arc::new(PublishStore::new());
        let adapter = Arc::new(FakeAdapter::new(Destination::Tiktok));
        let id = queued_post(&store, "doomed", 0);

        let scheduler = Arc::new(scheduler_with(
            store.clone(),
            FakeRenderer { fail: true },
            adapter,
        ));
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        {
            let store = store.clone();
            let id = id.clone();
            wait_until(move || store.get(&id).unwrap().status_kind() == StatusKind::Failed).await;
        }

        let post = store.get(&id).unwrap();
        match post.status {
            PostStatus::Failed { ref error, kind, .. } => {
                assert!(error.contains("renderer down"));
                assert_eq!(kind, FailureKind::Render);
            }
            ref other => panic!("unexpected status {:?}", other),
        }

        scheduler.shutdown();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn platform_rejections_record_the_message() {
        let store = Arc::new(PublishStore::new());
        let adapter = Arc::new(FakeAdapter::rejecting(Destination::Tiktok));
        let id = queued_post(&store, "too long", 0);

        let scheduler = Arc::new(scheduler_with(
            store.clone(),
            FakeRenderer { fail: false },
            adapter,
        ));
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        {
            let store = store.clone();
            let id = id.clone();
            wait_until(move || store.get(&id).unwrap().status_kind() == StatusKind::Failed).await;
        }

        let post = store.get(&id).unwrap();
        match post.status {
            PostStatus::Failed { ref error, kind, .. } => {
                assert!(error.contains("video too long"));
                assert_eq!(kind, FailureKind::PlatformRejected);
            }
            ref other => panic!("unexpected status {:?}", other),
        }

        scheduler.shutdown();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn wedged_attempts_hit_the_timeout() {
        let store = Arc::new(PublishStore::new());
        let adapter = Arc::new(FakeAdapter::never_finishing(Destination::Tiktok));
        let id = queued_post(&store, "stuck", 0);

        let mut config = test_config();
        config.attempt_timeout = Duration::from_millis(50);
        let mut registry = AdapterRegistry::new();
        registry.register(adapter);
        let scheduler = Arc::new(PublishScheduler::new(
            config,
            store.clone(),
            Arc::new(FakeClips),
            Arc::new(FakeRenderer { fail: false }),
            Arc::new(registry),
        ));
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        {
            let store = store.clone();
            let id = id.clone();
            wait_until(move || store.get(&id).unwrap().status_kind() == StatusKind::Failed).await;
        }

        let post = store.get(&id).unwrap();
        match post.status {
            PostStatus::Failed { ref error, kind, .. } => {
                assert!(error.contains("timed out"));
                assert_eq!(kind, FailureKind::Network);
            }
            ref other => panic!("unexpected status {:?}", other),
        }

        scheduler.shutdown();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn missing_adapters_fail_as_configuration() {
        let store = Arc::new(PublishStore::new());
        let id = queued_post(&store, "nowhere to go", 0);

        // Empty registry: the destination is not configured
        let scheduler = Arc::new(PublishScheduler::new(
            test_config(),
            store.clone(),
            Arc::new(FakeClips),
            Arc::new(FakeRenderer { fail: false }),
            Arc::new(AdapterRegistry::new()),
        ));
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        {
            let store = store.clone();
            let id = id.clone();
            wait_until(move || store.get(&id).unwrap().status_kind() == StatusKind::Failed).await;
        }

        let post = store.get(&id).unwrap();
        match post.status {
            PostStatus::Failed { kind, .. } => assert_eq!(kind, FailureKind::Configuration),
            ref other => panic!("unexpected status {:?}", other),
        }

        // The failed post stays retryable
        store.retry_post(&id).unwrap();
        assert_eq!(store.get(&id).unwrap().retry_count, 1);

        scheduler.shutdown();
        runner.await.unwrap();
    }
}
