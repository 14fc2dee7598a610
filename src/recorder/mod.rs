//! Recording controller
//!
//! A [`Recorder`] is the staging area for one unit of work:
//!
//! ```text
//! start_recording()          (monitored tags loaded, pause flag read)
//!     ↓
//! record() / record_update() (queued in memory)
//!     ↓
//! flush()                    (one batch id, store, update, terminate)
//! ```
//!
//! Recorders are cheap and not shared between units of work. The storage
//! engine and the hooks are shared.

pub mod hooks;
pub mod scope;
pub mod worker;

pub use hooks::{
    ErrorReporter, PrincipalResolver, RecorderHooks, RecorderHooksBuilder, TracingErrorReporter,
};
pub use scope::{ScopeGate, UnitOfWork};
pub use worker::WorkerSession;

use crate::entry::incoming::EntryPoint;
use crate::entry::{EntryType, EntryUpdate, IncomingEntry};
use crate::storage::EntriesRepository;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct Recorder {
    storage: Arc<dyn EntriesRepository>,
    hooks: Arc<RecorderHooks>,
    recording: bool,
    entry_queue: Vec<IncomingEntry>,
    update_queue: Vec<EntryUpdate>,
}

impl Recorder {
    pub fn new(storage: Arc<dyn EntriesRepository>, hooks: Arc<RecorderHooks>) -> Self {
        Self {
            storage,
            hooks,
            recording: false,
            entry_queue: Vec::new(),
            update_queue: Vec::new(),
        }
    }

    /// Start recording unless the global pause flag is set
    ///
    /// Storage failures never abort startup: the monitored tags fall back to
    /// an empty set and an unreadable pause flag counts as not paused.
    pub async fn start_recording(&mut self) {
        self.storage.load_monitored_tags().await;

        let paused = match self.storage.recording_paused().await {
            Ok(paused) => paused,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read recording pause flag");
                false
            }
        };

        self.recording = !paused;
    }

    /// Start recording if `gate` approves `unit`; returns whether it did
    pub async fn start_for(&mut self, gate: &ScopeGate, unit: &UnitOfWork) -> bool {
        if !gate.approves(unit) {
            tracing::debug!(unit = ?unit, "Unit of work not recorded");
            return false;
        }

        self.start_recording().await;
        self.recording
    }

    /// Queued entries are kept
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Run `action` with recording suspended, then restore the prior state
    pub fn without_recording<F, R>(&mut self, action: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let was_recording = self.recording;
        self.recording = false;

        let result = action(self);

        self.recording = was_recording;
        result
    }

    pub fn record(&mut self, entry_type: EntryType, mut entry: IncomingEntry) {
        if !self.recording {
            return;
        }

        entry.entry_type = Some(entry_type);

        let tags = self.hooks.tags_for(&entry);
        entry.merge_tags(tags);

        if let Some(principal) = self.hooks.principal() {
            entry.set_user(&principal);
        }

        entry.monitored = self.storage.is_monitoring_cached(&entry.tags);

        let hooks = Arc::clone(&self.hooks);

        self.without_recording(|recorder| {
            if hooks.accepts(&entry) {
                recorder.entry_queue.push(entry.clone());
            }

            if let Some(hook) = &hooks.after_recording {
                hook(&*recorder, &entry);
            }
        });
    }

    pub fn record_update(&mut self, update: EntryUpdate) {
        if self.recording {
            self.update_queue.push(update);
        }
    }

    pub fn record_request(&mut self, entry: IncomingEntry) {
        self.record(EntryType::Request, entry);
    }

    pub fn record_query(&mut self, entry: IncomingEntry) {
        self.record(EntryType::Query, entry);
    }

    pub fn record_job(&mut self, entry: IncomingEntry) {
        self.record(EntryType::Job, entry);
    }

    pub fn record_exception(&mut self, entry: IncomingEntry) {
        self.record(EntryType::Exception, entry);
    }

    pub fn record_log(&mut self, entry: IncomingEntry) {
        self.record(EntryType::Log, entry);
    }

    pub fn record_dump(&mut self, entry: IncomingEntry) {
        self.record(EntryType::Dump, entry);
    }

    /// Whether any of `tags` is flagged for forced capture
    pub async fn is_monitoring(&self, tags: &[String]) -> bool {
        self.storage.is_monitoring(tags).await
    }

    pub async fn has_monitored_tag(&self, entry: &IncomingEntry) -> bool {
        self.is_monitoring(&entry.tags).await
    }

    pub fn queued_entries(&self) -> &[IncomingEntry] {
        &self.entry_queue
    }

    pub fn queued_updates(&self) -> &[EntryUpdate] {
        &self.update_queue
    }

    /// Drop queued entries without storing them
    pub fn discard_entries(&mut self) {
        self.entry_queue.clear();
    }

    /// Move the queues to storage
    ///
    /// Never fails: storage errors go to the error reporter and both queues
    /// are emptied either way.
    pub async fn flush(&mut self) {
        if self.entry_queue.is_empty() && self.update_queue.is_empty() {
            return;
        }

        let mut entries = std::mem::take(&mut self.entry_queue);
        let mut updates = std::mem::take(&mut self.update_queue);

        if !self.hooks.accepts_batch(&entries) {
            tracing::debug!(entries = entries.len(), "Batch rejected by filter");
            entries.clear();
        }

        let batch_id = Uuid::now_v7();
        stamp_batch(&mut entries, batch_id);

        for update in &mut updates {
            update.set("updated_batch_id", Value::String(batch_id.to_string()));
        }

        if let Err(e) = self.persist(&entries, &updates).await {
            self.hooks.report(&e);
        }
    }

    async fn persist(&self, entries: &[IncomingEntry], updates: &[EntryUpdate]) -> crate::error::Result<()> {
        if !entries.is_empty() {
            self.storage.store(entries).await?;
        }

        if !updates.is_empty() {
            self.storage.update(updates).await?;
        }

        self.storage.terminate().await;
        Ok(())
    }
}

/// Assign the batch id and point dumps at the batch's entry point
fn stamp_batch(entries: &mut [IncomingEntry], batch_id: Uuid) {
    let entry_point = EntryPoint::from_batch(entries);

    for entry in entries.iter_mut() {
        entry.batch_id = Some(batch_id);

        if entry.is_dump() {
            if let Some(entry_point) = &entry_point {
                entry.assign_entry_point(entry_point);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Principal;
    use crate::error::ProfilerError;
    use crate::query::QueryOptions;
    use crate::storage::SqliteEntriesRepository;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn create_storage() -> Arc<SqliteEntriesRepository> {
        Arc::new(
            SqliteEntriesRepository::new("sqlite::memory:", 1000)
                .await
                .unwrap(),
        )
    }

    fn entry(value: Value) -> IncomingEntry {
        IncomingEntry::from_value(value)
    }

    struct StaticPrincipal;

    impl PrincipalResolver for StaticPrincipal {
        fn resolve(&self) -> anyhow::Result<Option<Principal>> {
            Ok(Some(Principal::new("42")))
        }
    }

    #[derive(Default)]
    struct CountingReporter(AtomicUsize);

    impl ErrorReporter for CountingReporter {
        fn report(&self, _error: &ProfilerError) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_not_recording_is_noop() {
        let storage = create_storage().await;
        let mut recorder = Recorder::new(storage, Arc::new(RecorderHooks::default()));

        recorder.record_query(entry(json!({"sql": "select 1"})));
        recorder.record_update(EntryUpdate::new(Uuid::now_v7(), EntryType::Job, Map::new()));

        assert!(recorder.queued_entries().is_empty());
        assert!(recorder.queued_updates().is_empty());
    }

    #[tokio::test]
    async fn test_record_stamps_type_tags_and_principal() {
        let storage = create_storage().await;
        let hooks = RecorderHooks::builder()
            .tag(|entry| {
                entry
                    .content
                    .get("sql")
                    .map(|_| vec!["db".to_string()])
                    .unwrap_or_default()
            })
            .principal_resolver(Arc::new(StaticPrincipal))
            .build();
        let mut recorder = Recorder::new(storage, Arc::new(hooks));

        recorder.start_recording().await;
        recorder.record_query(entry(json!({"sql": "select 1"})));

        let queued = &recorder.queued_entries()[0];
        assert_eq!(queued.entry_type, Some(EntryType::Query));
        assert_eq!(queued.tags, vec!["db", "Auth:42"]);
        assert_eq!(queued.content["user"]["id"], "42");
    }

    #[tokio::test]
    async fn test_filtered_entries_are_not_queued() {
        let storage = create_storage().await;
        let hooks = RecorderHooks::builder()
            .filter(|entry| entry.entry_type != Some(EntryType::Cache))
            .build();
        let mut recorder = Recorder::new(storage, Arc::new(hooks));

        recorder.start_recording().await;
        recorder.record(EntryType::Cache, entry(json!({"key": "users"})));
        recorder.record_log(entry(json!({"message": "hello"})));

        assert_eq!(recorder.queued_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_after_recording_runs_without_recording() {
        let storage = create_storage().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let hooks = RecorderHooks::builder()
            .after_recording(move |recorder, _entry| {
                assert!(!recorder.is_recording());
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let mut recorder = Recorder::new(storage, Arc::new(hooks));

        recorder.start_recording().await;
        recorder.record_log(entry(json!({"message": "hello"})));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(recorder.is_recording());
    }

    #[tokio::test]
    async fn test_without_recording_restores_state() {
        let storage = create_storage().await;
        let mut recorder = Recorder::new(storage, Arc::new(RecorderHooks::default()));
        recorder.start_recording().await;

        recorder.without_recording(|inner| {
            inner.record_log(IncomingEntry::new(Map::new()));
        });

        assert!(recorder.is_recording());
        assert!(recorder.queued_entries().is_empty());
    }

    #[tokio::test]
    async fn test_paused_store_does_not_record() {
        let storage = create_storage().await;
        storage.set_recording_paused(true).await.unwrap();
        let mut recorder = Recorder::new(storage, Arc::new(RecorderHooks::default()));

        recorder.start_recording().await;

        assert!(!recorder.is_recording());
    }

    #[tokio::test]
    async fn test_start_for_respects_gate() {
        let storage = create_storage().await;
        let mut recorder = Recorder::new(storage, Arc::new(RecorderHooks::default()));
        let gate = ScopeGate::new(true);

        assert!(!recorder.start_for(&gate, &UnitOfWork::Command("queue:work".to_string())).await);
        assert!(recorder.start_for(&gate, &UnitOfWork::Request("/orders".to_string())).await);
    }

    #[tokio::test]
    async fn test_flush_assigns_one_batch_and_stamps_dumps() {
        let storage = create_storage().await;
        let mut recorder = Recorder::new(storage.clone(), Arc::new(RecorderHooks::default()));

        recorder.start_recording().await;
        recorder.record_request(entry(json!({"uri": "/orders"})));
        recorder.record_query(entry(json!({"sql": "select 1"})));
        recorder.record_dump(entry(json!({"dump": "x"})));
        recorder.flush().await;

        assert!(recorder.queued_entries().is_empty());

        let stored = storage.get(None, &QueryOptions::new()).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|e| e.batch_id == stored[0].batch_id));

        let dump = stored.iter().find(|e| e.entry_type == EntryType::Dump).unwrap();
        assert_eq!(dump.content["entry_point_type"], "request");
        assert_eq!(dump.content["entry_point_description"], "/orders");
    }

    #[tokio::test]
    async fn test_rejected_batch_still_applies_updates() {
        let storage = create_storage().await;

        let job = entry(json!({"status": "pending"}))
            .with_type(EntryType::Job)
            .with_batch_id(Uuid::now_v7());
        let job_uuid = job.uuid;
        storage.store(&[job]).await.unwrap();

        let hooks = RecorderHooks::builder().filter_batch(|_| false).build();
        let mut recorder = Recorder::new(storage.clone(), Arc::new(hooks));

        recorder.start_recording().await;
        recorder.record_log(entry(json!({"message": "dropped"})));
        recorder.record_update(EntryUpdate::new(
            job_uuid,
            EntryType::Job,
            json!({"status": "processed"}).as_object().cloned().unwrap(),
        ));
        recorder.flush().await;

        let stored = storage.get(None, &QueryOptions::new()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content["status"], "processed");
        assert!(stored[0].content["updated_batch_id"].is_string());
    }

    #[tokio::test]
    async fn test_flush_failure_is_reported_and_queues_cleared() {
        let storage = create_storage().await;
        let reporter = Arc::new(CountingReporter::default());
        let hooks = RecorderHooks::builder()
            .error_reporter(reporter.clone())
            .build();
        let mut recorder = Recorder::new(storage.clone(), Arc::new(hooks));

        recorder.start_recording().await;
        recorder.record_log(entry(json!({"message": "lost"})));

        storage.pool().close().await;
        recorder.flush().await;

        assert_eq!(reporter.0.load(Ordering::SeqCst), 1);
        assert!(recorder.queued_entries().is_empty());
    }

    #[tokio::test]
    async fn test_filter_keeps_failed_or_monitored_entries() {
        let storage = create_storage().await;
        storage.monitor(&["Customer:7".to_string()]).await.unwrap();

        let hooks = RecorderHooks::builder()
            .filter(|entry| entry.is_failed_request() || entry.has_monitored_tag())
            .build();
        let mut recorder = Recorder::new(storage, Arc::new(hooks));

        recorder.start_recording().await;
        recorder.record_request(entry(json!({"uri": "/ok", "response_status": 200})));
        recorder.record_request(entry(json!({"uri": "/boom", "response_status": 503})));
        recorder.record_request(
            entry(json!({"uri": "/profile", "response_status": 200})).with_tags(["Customer:7"]),
        );
        recorder.record_request(
            entry(json!({"uri": "/other", "response_status": 200})).with_tags(["Customer:8"]),
        );

        let uris: Vec<_> = recorder
            .queued_entries()
            .iter()
            .map(|e| e.content["uri"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(uris, vec!["/boom", "/profile"]);
        assert!(recorder.queued_entries()[1].has_monitored_tag());
    }

    #[tokio::test]
    async fn test_start_recording_survives_unavailable_storage() {
        let storage = create_storage().await;
        storage.monitor(&["User:1".to_string()]).await.unwrap();
        storage.set_recording_paused(true).await.unwrap();
        storage.pool().close().await;

        let mut recorder = Recorder::new(storage, Arc::new(RecorderHooks::default()));
        recorder.start_recording().await;

        assert!(recorder.is_recording());
        assert!(!recorder.is_monitoring(&["User:1".to_string()]).await);
    }
}
