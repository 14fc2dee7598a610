//! Global pause switch

use super::open_storage;
use anyhow::Result;
use app_profiler::config::ProfilerConfig;
use app_profiler::storage::EntriesRepository;
use colored::Colorize;

/// Execute the pause and resume commands
pub async fn set_paused(cfg: &ProfilerConfig, paused: bool) -> Result<()> {
    let storage = open_storage(cfg).await?;

    storage.set_recording_paused(paused).await?;

    if paused {
        println!("{}", "Recording paused".yellow().bold());
    } else {
        println!("{}", "✓ Recording resumed".green());
    }

    Ok(())
}
