use std::path::Path;

use clipcast_compose::assemble_render_plan;
use clipcast_publish::{DaemonConfig, ProjectLibrary};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = DaemonConfig::from_env();

    println!(
        "publish-selfcheck: starting with state_path={}",
        config.state_path.display()
    );
    ensure_state_dir(&config.state_path).await?;
    ensure_project_assembles(&config).await?;
    ensure_destinations(&config)?;

    println!("publish-selfcheck: ok");
    Ok(())
}

async fn ensure_state_dir(state_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = state_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Every clip in the project must assemble into a valid render plan.
async fn ensure_project_assembles(config: &DaemonConfig) -> anyhow::Result<()> {
    let library = ProjectLibrary::load(&config.project_path)
        .await
        .map_err(|e| anyhow::anyhow!("project at {} unusable: {}", config.project_path.display(), e))?;

    let clip_ids: Vec<String> = library.clip_ids().iter().map(|s| s.to_string()).collect();
    for clip_id in &clip_ids {
        let entry = library
            .entry(clip_id)
            .ok_or_else(|| anyhow::anyhow!("clip {} vanished from the project", clip_id))?;
        assemble_render_plan(entry.composition.clone())
            .map_err(|e| anyhow::anyhow!("clip {} does not assemble: {}", clip_id, e))?;
    }

    println!(
        "publish-selfcheck: {} clips assemble cleanly",
        clip_ids.len()
    );
    Ok(())
}

fn ensure_destinations(config: &DaemonConfig) -> anyhow::Result<()> {
    let destinations = config.configured_destinations();
    if destinations.is_empty() {
        return Err(anyhow::anyhow!(
            "no destination configured: set TIKTOK_CLIENT_ID/TIKTOK_CLIENT_SECRET, \
             YOUTUBE_CLIENT_ID/YOUTUBE_CLIENT_SECRET or INSTAGRAM_CLIENT_ID/INSTAGRAM_CLIENT_SECRET"
        ));
    }
    println!("publish-selfcheck: destinations configured: {:?}", destinations);
    Ok(())
}
