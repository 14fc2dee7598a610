//! HTTP handlers for the profiler read and operator API

pub mod entries;
pub mod health;
pub mod monitoring;

use crate::monitor::MonitorRegistry;
use crate::storage::SqliteEntriesRepository;
use std::sync::Arc;

/// Shared state for the profiler API
#[derive(Clone)]
pub struct ProfilerState {
    pub storage: Arc<SqliteEntriesRepository>,
    pub monitor: MonitorRegistry,
    /// Mirrors the `enabled` config switch
    pub enabled: bool,
}

impl ProfilerState {
    pub fn new(storage: Arc<SqliteEntriesRepository>, enabled: bool) -> Self {
        Self {
            monitor: MonitorRegistry::new(storage.clone()),
            storage,
            enabled,
        }
    }
}
