//! Storage maintenance commands

use super::{format_number, open_storage};
use anyhow::Result;
use app_profiler::config::ProfilerConfig;
use app_profiler::storage::{prune_older_than, ClearableRepository};
use colored::Colorize;
use tracing::info;

/// Execute the clear command
pub async fn clear(cfg: &ProfilerConfig) -> Result<()> {
    let storage = open_storage(cfg).await?;

    storage.clear().await?;

    println!("{}", "✓ Profiler entries cleared".green());
    Ok(())
}

/// Execute the prune command
pub async fn prune(cfg: &ProfilerConfig, hours: Option<u64>) -> Result<()> {
    let hours = hours.unwrap_or(cfg.prune.hours);
    let storage = open_storage(cfg).await?;

    info!(hours, "Pruning profiler entries");
    let deleted = prune_older_than(&storage, hours).await?;

    if deleted == 0 {
        println!(
            "{}",
            format!("No entries older than {} hours", hours).dimmed()
        );
    } else {
        println!(
            "{} {} entries pruned",
            "✓".green(),
            format_number(deleted).bold()
        );
    }

    Ok(())
}

/// Execute the stats command
pub async fn stats(cfg: &ProfilerConfig) -> Result<()> {
    let storage = open_storage(cfg).await?;
    let stats = storage.stats().await?;

    println!("{}", "Profiler Storage Statistics".bold().underline());
    println!();
    println!("{:<30} {:>15}", "Entries:", format_number(stats.entry_count));
    println!("{:<30} {:>15}", "Tags:", format_number(stats.tag_count));
    println!(
        "{:<30} {:>15}",
        "Monitored Tags:",
        format_number(stats.monitored_tag_count)
    );
    println!();

    Ok(())
}
