//! Monitored tags
//!
//! Tags flagged here are recorded regardless of sampling. The set lives in
//! the entry storage; this is the operator-facing view of it.

use crate::error::Result;
use crate::storage::EntriesRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct MonitorRegistry {
    storage: Arc<dyn EntriesRepository>,
}

impl MonitorRegistry {
    pub fn new(storage: Arc<dyn EntriesRepository>) -> Self {
        Self { storage }
    }

    /// Flag tags for forced capture; blank tags are dropped
    pub async fn monitor(&self, tags: &[String]) -> Result<Vec<String>> {
        let tags = normalize(tags);
        if tags.is_empty() {
            return Ok(tags);
        }

        self.storage.monitor(&tags).await?;

        tracing::info!(tags = ?tags, "Monitoring tags");
        Ok(tags)
    }

    pub async fn stop_monitoring(&self, tags: &[String]) -> Result<Vec<String>> {
        let tags = normalize(tags);
        if tags.is_empty() {
            return Ok(tags);
        }

        self.storage.stop_monitoring(&tags).await?;

        tracing::info!(tags = ?tags, "Stopped monitoring tags");
        Ok(tags)
    }

    pub async fn monitoring(&self) -> Result<Vec<String>> {
        self.storage.monitoring().await
    }

    /// Cached check used while recording
    pub async fn is_monitoring(&self, tags: &[String]) -> bool {
        self.storage.is_monitoring(tags).await
    }
}

fn normalize(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !normalized.iter().any(|existing| existing == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}
