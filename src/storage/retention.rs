//! Age-based retention
//!
//! `profiler prune` runs this once; `profiler serve` also runs it on an
//! interval so a long-lived dashboard keeps the store bounded.

use super::PrunableRepository;
use crate::error::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

#[derive(Debug, Clone, Copy)]
pub struct PruneSchedule {
    /// Entries older than this many hours are deleted
    pub keep_hours: u64,

    pub interval: Duration,
}

impl Default for PruneSchedule {
    fn default() -> Self {
        Self {
            keep_hours: 24,
            interval: Duration::from_secs(3600),
        }
    }
}

/// Delete entries recorded more than `hours` ago
pub async fn prune_older_than(storage: &dyn PrunableRepository, hours: u64) -> Result<u64> {
    let cutoff = i64::try_from(hours)
        .ok()
        .and_then(ChronoDuration::try_hours)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    storage.prune(cutoff).await
}

/// Spawn the background prune loop
///
/// # Example
///
/// ```ignore
/// spawn_prune_task(storage.clone(), PruneSchedule { keep_hours: 48, ..Default::default() });
/// ```
pub fn spawn_prune_task(
    storage: Arc<dyn PrunableRepository>,
    schedule: PruneSchedule,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        prune_loop(storage, schedule).await;
    })
}

async fn prune_loop(storage: Arc<dyn PrunableRepository>, schedule: PruneSchedule) {
    let mut interval = time::interval(schedule.interval);

    loop {
        interval.tick().await;

        match prune_older_than(storage.as_ref(), schedule.keep_hours).await {
            Ok(deleted) => {
                tracing::debug!(deleted, keep_hours = schedule.keep_hours, "Scheduled prune finished");
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled prune failed");
            }
        }
    }
}
