//! Monitored tag commands

use super::open_storage;
use anyhow::Result;
use app_profiler::config::ProfilerConfig;
use app_profiler::monitor::MonitorRegistry;
use colored::Colorize;
use std::sync::Arc;

async fn open_registry(cfg: &ProfilerConfig) -> Result<MonitorRegistry> {
    let storage = open_storage(cfg).await?;
    Ok(MonitorRegistry::new(Arc::new(storage)))
}

/// Execute the monitor command
pub async fn monitor(cfg: &ProfilerConfig, tags: &[String]) -> Result<()> {
    let registry = open_registry(cfg).await?;

    for tag in registry.monitor(tags).await? {
        println!("{} Monitoring {}", "✓".green(), tag.cyan());
    }

    Ok(())
}

/// Execute the unmonitor command
pub async fn unmonitor(cfg: &ProfilerConfig, tags: &[String]) -> Result<()> {
    let registry = open_registry(cfg).await?;

    for tag in registry.stop_monitoring(tags).await? {
        println!("{} Stopped monitoring {}", "✓".green(), tag.cyan());
    }

    Ok(())
}

/// Execute the monitored command
pub async fn monitored(cfg: &ProfilerConfig) -> Result<()> {
    let registry = open_registry(cfg).await?;
    let tags = registry.monitoring().await?;

    if tags.is_empty() {
        println!("{}", "No tags are being monitored".yellow());
        return Ok(());
    }

    println!("{}", "Monitored Tags".bold().underline());
    for tag in tags {
        println!("  {}", tag.cyan());
    }

    Ok(())
}
