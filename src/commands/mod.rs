//! Command implementations for the CLI
//!
//! - serve: Serve the profiler API
//! - storage: clear, prune and stats
//! - monitor: monitor, unmonitor and monitored
//! - recording: pause and resume
//! - entries: list stored entries
//! - config: Configuration display and validation

pub mod config;
pub mod entries;
pub mod monitor;
pub mod recording;
pub mod serve;
pub mod storage;

use anyhow::{Context, Result};
use app_profiler::config::ProfilerConfig;
use app_profiler::storage::SqliteEntriesRepository;

/// Open the configured entry store
pub async fn open_storage(cfg: &ProfilerConfig) -> Result<SqliteEntriesRepository> {
    SqliteEntriesRepository::new(&cfg.storage.database_url, cfg.storage.chunk_size)
        .await
        .with_context(|| format!("Failed to open profiler storage at {}", cfg.storage.database_url))
}

/// Format large numbers with commas
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, ch) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }

    result.chars().rev().collect()
}
