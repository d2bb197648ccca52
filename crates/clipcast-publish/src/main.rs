//! Publish daemon binary.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipcast_publish::adapters::{InstagramAdapter, TikTokAdapter, YouTubeAdapter};
use clipcast_publish::{
    snapshot, AdapterRegistry, DaemonConfig, HttpRenderService, JsonFileCredentialStore,
    ProjectLibrary, PublishScheduler, PublishStore,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipcast=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting clipcast-publishd");

    // Load configuration
    let config = DaemonConfig::from_env();
    info!("Daemon config: {:?}", config);

    // Restore post state
    let posts = match snapshot::load_posts(&config.state_path).await {
        Ok(posts) => posts,
        Err(e) => {
            error!("Failed to load post snapshot: {}", e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(PublishStore::with_posts(posts));
    let reset = store.reset_in_flight();
    if reset > 0 {
        info!("{} posts interrupted by the previous run were reset", reset);
    }

    // Load the clip project posts resolve against
    let library = match ProjectLibrary::load(&config.project_path).await {
        Ok(library) => library,
        Err(e) => {
            error!(
                "Failed to load project from {}: {}",
                config.project_path.display(),
                e
            );
            std::process::exit(1);
        }
    };

    // Platform adapters for the connected destinations
    let credentials = Arc::new(JsonFileCredentialStore::new(config.credentials_path.clone()));
    let mut registry = AdapterRegistry::new();
    if let Some(settings) = config.tiktok.clone() {
        registry.register(Arc::new(TikTokAdapter::new(settings, credentials.clone())));
    }
    if let Some(settings) = config.youtube.clone() {
        registry.register(Arc::new(YouTubeAdapter::new(settings, credentials.clone())));
    }
    if let Some(settings) = config.instagram.clone() {
        registry.register(Arc::new(InstagramAdapter::new(
            settings,
            credentials.clone(),
        )));
    }
    if registry.is_empty() {
        warn!("No platform configured; queued posts will fail until one is connected");
    } else {
        info!("Configured destinations: {:?}", registry.destinations());
    }

    let renderer = match HttpRenderService::new(config.render.clone()) {
        Ok(renderer) => renderer,
        Err(e) => {
            error!("Failed to create render service client: {}", e);
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(PublishScheduler::new(
        config.scheduler.clone(),
        store.clone(),
        Arc::new(library),
        Arc::new(renderer),
        Arc::new(registry),
    ));

    // Persist the post list after every change
    let snapshot_store = store.clone();
    let snapshot_path = config.state_path.clone();
    let mut events = store.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Snapshot writer skipped {} events", skipped);
                }
            }
            if let Err(e) = snapshot::save_posts(&snapshot_path, &snapshot_store.list()).await {
                warn!("Failed to save post snapshot: {}", e);
            }
        }
    });

    // Setup signal handlers
    let signal_scheduler = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_scheduler.shutdown();
    });

    // Run the scheduler until shutdown
    scheduler.run().await;

    // Final snapshot so nothing since the last event write is lost
    if let Err(e) = snapshot::save_posts(&config.state_path, &store.list()).await {
        error!("Failed to save final post snapshot: {}", e);
    }

    info!("Publish daemon shutdown complete");
}
