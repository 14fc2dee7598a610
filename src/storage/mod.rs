//! Entry storage
//!
//! The storage contract is split the same way the operator surfaces use it:
//! `EntriesRepository` is what the recording pipeline and the read API need,
//! `PrunableRepository` and `ClearableRepository` back the retention commands.
//!
//! Implementations must accept concurrent callers. No transaction spans more
//! than one call.

pub mod database;
pub mod retention;

pub use database::{DatabaseStats, SqliteEntriesRepository};
pub use retention::{prune_older_than, spawn_prune_task, PruneSchedule};

use crate::entry::{EntryResult, EntryType, EntryUpdate, IncomingEntry};
use crate::error::Result;
use crate::query::QueryOptions;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Default number of rows written or deleted per statement
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

#[async_trait]
pub trait EntriesRepository: Send + Sync {
    /// Fetch one entry with its tags
    async fn find(&self, uuid: &str) -> Result<EntryResult>;

    /// Entries of `entry_type` (all types when `None`) matching `options`,
    /// newest first
    async fn get(&self, entry_type: Option<EntryType>, options: &QueryOptions) -> Result<Vec<EntryResult>>;

    async fn store(&self, entries: &[IncomingEntry]) -> Result<()>;

    async fn update(&self, updates: &[EntryUpdate]) -> Result<()>;

    /// Refresh the cached monitored tags; failures leave an empty set
    async fn load_monitored_tags(&self);

    /// Whether any of `tags` is monitored, loading the cache on first use
    async fn is_monitoring(&self, tags: &[String]) -> bool;

    /// Like `is_monitoring` but never touches storage; `false` while the
    /// cache is not loaded
    fn is_monitoring_cached(&self, tags: &[String]) -> bool;

    async fn monitoring(&self) -> Result<Vec<String>>;

    async fn monitor(&self, tags: &[String]) -> Result<()>;

    async fn stop_monitoring(&self, tags: &[String]) -> Result<()>;

    /// Global pause switch shared by every process using this store
    async fn recording_paused(&self) -> Result<bool>;

    async fn set_recording_paused(&self, paused: bool) -> Result<()>;

    /// Per-flush cleanup
    async fn terminate(&self) {}
}

#[async_trait]
pub trait PrunableRepository: Send + Sync {
    /// Delete entries recorded before `before`; returns the number deleted
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait ClearableRepository: Send + Sync {
    /// Delete every entry and every monitored tag
    async fn clear(&self) -> Result<()>;
}
