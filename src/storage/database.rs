//! SQLite entry storage
//!
//! This module provides the default storage engine with:
//! - Connection pooling and automatic migrations
//! - Chunked multi-row inserts for entries and tags
//! - Exception family deduplication at insert time
//! - WAL mode so flushes, reads and pruning can overlap

use super::{ClearableRepository, EntriesRepository, PrunableRepository, DEFAULT_CHUNK_SIZE};
use crate::entry::{EntryResult, EntryType, EntryUpdate, IncomingEntry};
use crate::error::{ProfilerError, Result};
use crate::query::{Limit, QueryOptions};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

const PAUSE_RECORDING_KEY: &str = "pause-recording";

/// Bound parameters allowed in one statement (`SQLITE_MAX_VARIABLE_NUMBER`)
const MAX_BIND_PARAMS: usize = 32766;

/// Binds per row in the multi-row entry and tag inserts
const ENTRY_BINDS: usize = 7;
const TAG_BINDS: usize = 2;

const ENTRY_COLUMNS: &str =
    "sequence, uuid, batch_id, type, family_hash, should_display_on_index, content, created_at";

/// Entry storage backed by SQLite
pub struct SqliteEntriesRepository {
    pool: SqlitePool,
    chunk_size: usize,
    /// `None` until loaded for the current recording session
    monitored_tags: RwLock<Option<HashSet<String>>>,
}

/// Row counts, for the `stats` command
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub entry_count: u64,
    pub tag_count: u64,
    pub monitored_tag_count: u64,
}

/// An entry serialized for insertion
struct EntryRow {
    uuid: String,
    batch_id: String,
    family_hash: Option<String>,
    entry_type: &'static str,
    content: String,
    created_at: i64,
}

impl SqliteEntriesRepository {
    /// Connect and migrate
    ///
    /// # Example
    ///
    /// ```ignore
    /// let storage = SqliteEntriesRepository::new("sqlite:./data/profiler.db", 1000).await?;
    /// ```
    pub async fn new(database_url: &str, chunk_size: usize) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .pragma("synchronous", "NORMAL");

        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            if let Some(parent) = options.get_filename().parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProfilerError::Config(format!(
                        "cannot create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        // An in-memory database lives and dies with its connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self::with_pool(pool, chunk_size))
    }

    /// Wrap an already migrated pool
    pub fn with_pool(pool: SqlitePool, chunk_size: usize) -> Self {
        Self {
            pool,
            chunk_size: if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size },
            monitored_tags: RwLock::new(None),
        }
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;

        tracing::debug!("Profiler storage migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let entry_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiler_entries")
            .fetch_one(&self.pool)
            .await?;

        let tag_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiler_entries_tags")
            .fetch_one(&self.pool)
            .await?;

        let monitored_tag_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiler_monitoring")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            entry_count: entry_count as u64,
            tag_count: tag_count as u64,
            monitored_tag_count: monitored_tag_count as u64,
        })
    }

    fn reset_monitored_cache(&self) {
        if let Ok(mut cache) = self.monitored_tags.write() {
            *cache = None;
        }
    }

    /// Insert exceptions one at a time so every occurrence sees the ones
    /// stored before it, including earlier members of the same chunk.
    ///
    /// Chunks run under `BEGIN IMMEDIATE` so the family count and the
    /// writes that follow it hold the write lock from the start.
    async fn store_exceptions(&self, exceptions: &[&IncomingEntry], fallback_batch: &str) -> Result<()> {
        for chunk in exceptions.chunks(self.chunk_size) {
            let mut conn = self.pool.acquire().await?;

            sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

            let outcome = match insert_exceptions(&mut conn, chunk, fallback_batch).await {
                Ok(()) => sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map(|_| ())
                    .map_err(ProfilerError::from),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::debug!(error = %rollback, "Rollback after failed exception insert");
                }
                return Err(e);
            }
        }

        Ok(())
    }

    /// Rows per multi-row insert, capped so the statement stays under the
    /// bind limit whatever the configured chunk size
    fn rows_per_insert(&self, binds_per_row: usize) -> usize {
        self.chunk_size.min(MAX_BIND_PARAMS / binds_per_row)
    }

    async fn store_plain(&self, entries: &[&IncomingEntry], fallback_batch: &str) -> Result<()> {
        for chunk in entries.chunks(self.rows_per_insert(ENTRY_BINDS)) {
            let rows = chunk
                .iter()
                .map(|entry| EntryRow::build(entry, &entry.content, fallback_batch))
                .collect::<Result<Vec<_>>>()?;

            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO profiler_entries
                    (uuid, batch_id, family_hash, should_display_on_index, type, content, created_at) ",
            );

            builder.push_values(rows, |mut b, row| {
                b.push_bind(row.uuid)
                    .push_bind(row.batch_id)
                    .push_bind(row.family_hash)
                    .push_bind(true)
                    .push_bind(row.entry_type)
                    .push_bind(row.content)
                    .push_bind(row.created_at);
            });

            builder.build().execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn store_tags(&self, entries: &[&IncomingEntry]) -> Result<()> {
        let pairs: Vec<(String, String)> = entries
            .iter()
            .flat_map(|entry| {
                let uuid = entry.uuid.to_string();
                entry.tags.iter().map(move |tag| (uuid.clone(), tag.clone()))
            })
            .collect();

        for chunk in pairs.chunks(self.rows_per_insert(TAG_BINDS)) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO profiler_entries_tags (entry_uuid, tag) ");

            builder.push_values(chunk, |mut b, (uuid, tag)| {
                b.push_bind(uuid.clone()).push_bind(tag.clone());
            });

            builder.build().execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn update_tags(&self, update: &EntryUpdate) -> Result<()> {
        let uuid = update.uuid.to_string();

        for tag in &update.tags_changes.added {
            sqlx::query(
                "INSERT INTO profiler_entries_tags (entry_uuid, tag)
                 SELECT ?1, ?2
                 WHERE NOT EXISTS (
                     SELECT 1 FROM profiler_entries_tags WHERE entry_uuid = ?1 AND tag = ?2
                 )",
            )
            .bind(&uuid)
            .bind(tag)
            .execute(&self.pool)
            .await?;
        }

        for tag in &update.tags_changes.removed {
            sqlx::query("DELETE FROM profiler_entries_tags WHERE entry_uuid = ? AND tag = ?")
                .bind(&uuid)
                .bind(tag)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn tags_for(&self, uuid: &str) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar(
            "SELECT DISTINCT tag FROM profiler_entries_tags WHERE entry_uuid = ? ORDER BY tag",
        )
        .bind(uuid)
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }
}

async fn insert_exceptions(
    conn: &mut SqliteConnection,
    chunk: &[&IncomingEntry],
    fallback_batch: &str,
) -> Result<()> {
    for exception in chunk {
        let mut content = exception.content.clone();

        let occurrences = match exception.family_hash.as_deref() {
            Some(family_hash) => {
                let prior: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM profiler_entries WHERE type = ? AND family_hash = ?",
                )
                .bind(EntryType::Exception.as_str())
                .bind(family_hash)
                .fetch_one(&mut *conn)
                .await?;

                sqlx::query(
                    "UPDATE profiler_entries SET should_display_on_index = 0
                     WHERE type = ? AND family_hash = ?",
                )
                .bind(EntryType::Exception.as_str())
                .bind(family_hash)
                .execute(&mut *conn)
                .await?;

                prior + 1
            }
            None => 1,
        };

        content.insert("occurrences".to_string(), Value::from(occurrences));

        let row = EntryRow::build(exception, &content, fallback_batch)?;

        sqlx::query(
            "INSERT INTO profiler_entries
                (uuid, batch_id, family_hash, should_display_on_index, type, content, created_at)
             VALUES (?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(row.uuid)
        .bind(row.batch_id)
        .bind(row.family_hash)
        .bind(row.entry_type)
        .bind(row.content)
        .bind(row.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

impl EntryRow {
    fn build(entry: &IncomingEntry, content: &Map<String, Value>, fallback_batch: &str) -> Result<Self> {
        let entry_type = entry
            .entry_type
            .ok_or_else(|| ProfilerError::invalid_input(format!("entry {} has no type", entry.uuid)))?;

        Ok(Self {
            uuid: entry.uuid.to_string(),
            batch_id: entry
                .batch_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| fallback_batch.to_string()),
            family_hash: entry.family_hash.clone(),
            entry_type: entry_type.as_str(),
            content: serde_json::to_string(content)?,
            created_at: entry.recorded_at.timestamp_millis(),
        })
    }
}

/// Decode a stored row; rows whose content is not a JSON object or whose
/// type is unknown yield `None`
fn decode_row(row: &SqliteRow) -> Option<EntryResult> {
    let raw_content: String = row.try_get("content").ok()?;
    let content: Value = serde_json::from_str(&raw_content).ok()?;
    if !content.is_object() {
        return None;
    }

    let raw_type: String = row.try_get("type").ok()?;
    let entry_type = EntryType::from_str(&raw_type).ok()?;

    let created_at: i64 = row.try_get("created_at").ok()?;

    Some(EntryResult {
        uuid: row.try_get("uuid").ok()?,
        sequence: row.try_get("sequence").ok(),
        batch_id: row.try_get("batch_id").ok()?,
        entry_type,
        family_hash: row.try_get("family_hash").ok()?,
        should_display_on_index: row.try_get("should_display_on_index").ok()?,
        content,
        recorded_at: DateTime::from_timestamp_millis(created_at)?,
        tags: Vec::new(),
    })
}

#[async_trait]
impl EntriesRepository for SqliteEntriesRepository {
    async fn find(&self, uuid: &str) -> Result<EntryResult> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM profiler_entries WHERE uuid = ?",
            ENTRY_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ProfilerError::not_found(uuid))?;

        let mut entry = decode_row(&row).ok_or_else(|| {
            ProfilerError::invalid_input(format!("entry {} has unreadable content", uuid))
        })?;
        entry.tags = self.tags_for(uuid).await?;

        Ok(entry)
    }

    async fn get(&self, entry_type: Option<EntryType>, options: &QueryOptions) -> Result<Vec<EntryResult>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM profiler_entries WHERE 1=1",
            ENTRY_COLUMNS
        ));

        if let Some(entry_type) = entry_type {
            builder.push(" AND type = ").push_bind(entry_type.as_str());
        }

        if let Some(batch_id) = &options.batch_id {
            builder.push(" AND batch_id = ").push_bind(batch_id.clone());
        }

        if let Some(tag) = &options.tag {
            builder
                .push(" AND uuid IN (SELECT entry_uuid FROM profiler_entries_tags WHERE tag = ")
                .push_bind(tag.clone())
                .push(")");
        }

        if let Some(family_hash) = &options.family_hash {
            builder.push(" AND family_hash = ").push_bind(family_hash.clone());
        }

        if let Some(before) = options.before_sequence {
            builder.push(" AND sequence < ").push_bind(before);
        }

        if let Some(uuids) = options.uuids.as_ref().filter(|u| !u.is_empty()) {
            builder.push(" AND uuid IN (");
            let mut separated = builder.separated(", ");
            for uuid in uuids {
                separated.push_bind(uuid.clone());
            }
            separated.push_unseparated(")");
        }

        if options.is_index_view() {
            builder.push(" AND should_display_on_index = 1");
        }

        builder.push(" ORDER BY sequence DESC, created_at DESC");

        if let Limit::Take(take) = options.limit {
            builder.push(" LIMIT ").push_bind(i64::from(take));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        let total = rows.len();

        let entries: Vec<EntryResult> = rows.iter().filter_map(decode_row).collect();

        if entries.len() < total {
            tracing::debug!(
                skipped = total - entries.len(),
                "Skipped entries with unreadable content"
            );
        }

        Ok(entries)
    }

    async fn store(&self, entries: &[IncomingEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // Entries stored outside a flush share one batch per call
        let fallback_batch = Uuid::now_v7().to_string();

        let (exceptions, others): (Vec<&IncomingEntry>, Vec<&IncomingEntry>) =
            entries.iter().partition(|entry| entry.is_exception());

        self.store_exceptions(&exceptions, &fallback_batch).await?;
        self.store_tags(&exceptions).await?;

        self.store_plain(&others, &fallback_batch).await?;
        self.store_tags(&others).await?;

        tracing::debug!(
            exceptions = exceptions.len(),
            entries = others.len(),
            "Stored profiler entries"
        );

        Ok(())
    }

    async fn update(&self, updates: &[EntryUpdate]) -> Result<()> {
        for update in updates {
            let uuid = update.uuid.to_string();

            let existing: Option<String> = sqlx::query_scalar(
                "SELECT content FROM profiler_entries WHERE uuid = ? AND type = ?",
            )
            .bind(&uuid)
            .bind(update.entry_type.as_str())
            .fetch_optional(&self.pool)
            .await?;

            let Some(existing) = existing else {
                tracing::debug!(uuid = %uuid, "Skipping update for missing entry");
                continue;
            };

            let mut content = match serde_json::from_str::<Value>(&existing) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            content.extend(update.changes.clone());

            sqlx::query("UPDATE profiler_entries SET content = ? WHERE uuid = ? AND type = ?")
                .bind(serde_json::to_string(&content)?)
                .bind(&uuid)
                .bind(update.entry_type.as_str())
                .execute(&self.pool)
                .await?;

            self.update_tags(update).await?;
        }

        Ok(())
    }

    async fn load_monitored_tags(&self) {
        let tags = match self.monitoring().await {
            Ok(tags) => tags.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load monitored tags, assuming none");
                HashSet::new()
            }
        };

        if let Ok(mut cache) = self.monitored_tags.write() {
            *cache = Some(tags);
        }
    }

    async fn is_monitoring(&self, tags: &[String]) -> bool {
        if tags.is_empty() {
            return false;
        }

        let loaded = self
            .monitored_tags
            .read()
            .map(|cache| cache.is_some())
            .unwrap_or(false);

        if !loaded {
            self.load_monitored_tags().await;
        }

        self.is_monitoring_cached(tags)
    }

    fn is_monitoring_cached(&self, tags: &[String]) -> bool {
        self.monitored_tags
            .read()
            .map(|cache| {
                cache
                    .as_ref()
                    .map(|monitored| tags.iter().any(|tag| monitored.contains(tag)))
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    async fn monitoring(&self) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar("SELECT tag FROM profiler_monitoring ORDER BY tag")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    async fn monitor(&self, tags: &[String]) -> Result<()> {
        let existing: HashSet<String> = self.monitoring().await?.into_iter().collect();

        let mut seen = HashSet::new();
        let new_tags: Vec<&String> = tags
            .iter()
            .filter(|tag| !existing.contains(*tag) && seen.insert(*tag))
            .collect();

        if new_tags.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT OR IGNORE INTO profiler_monitoring (tag) ");
        builder.push_values(new_tags, |mut b, tag| {
            b.push_bind(tag.clone());
        });
        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn stop_monitoring(&self, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM profiler_monitoring WHERE tag IN (");
        let mut separated = builder.separated(", ");
        for tag in tags {
            separated.push_bind(tag.clone());
        }
        separated.push_unseparated(")");

        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    async fn recording_paused(&self) -> Result<bool> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM profiler_settings WHERE key = ?")
                .bind(PAUSE_RECORDING_KEY)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value.as_deref() == Some("1"))
    }

    async fn set_recording_paused(&self, paused: bool) -> Result<()> {
        if paused {
            sqlx::query("INSERT OR REPLACE INTO profiler_settings (key, value) VALUES (?, '1')")
                .bind(PAUSE_RECORDING_KEY)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("DELETE FROM profiler_settings WHERE key = ?")
                .bind(PAUSE_RECORDING_KEY)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn terminate(&self) {
        self.reset_monitored_cache();
    }
}

#[async_trait]
impl PrunableRepository for SqliteEntriesRepository {
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let cutoff = before.timestamp_millis();
        let mut total_deleted = 0u64;

        loop {
            let deleted = sqlx::query(
                "DELETE FROM profiler_entries WHERE sequence IN (
                     SELECT sequence FROM profiler_entries WHERE created_at < ? LIMIT ?
                 )",
            )
            .bind(cutoff)
            .bind(self.chunk_size as i64)
            .execute(&self.pool)
            .await?
            .rows_affected();

            total_deleted += deleted;

            if deleted == 0 {
                break;
            }
        }

        tracing::info!(
            before = %before,
            deleted = total_deleted,
            "Pruned profiler entries"
        );

        Ok(total_deleted)
    }
}

#[async_trait]
impl ClearableRepository for SqliteEntriesRepository {
    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM profiler_entries_tags").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM profiler_entries").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM profiler_monitoring").execute(&mut *tx).await?;

        tx.commit().await?;

        self.reset_monitored_cache();

        tracing::info!("Cleared all profiler entries and monitored tags");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ExceptionInfo;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::sync::Arc;

    async fn create_test_repository() -> SqliteEntriesRepository {
        SqliteEntriesRepository::new("sqlite::memory:", DEFAULT_CHUNK_SIZE)
            .await
            .unwrap()
    }

    fn query_entry(batch: Uuid, sql: &str) -> IncomingEntry {
        IncomingEntry::new(json!({ "sql": sql }).as_object().cloned().unwrap())
            .with_type(EntryType::Query)
            .with_batch_id(batch)
    }

    fn exception_entry(batch: Uuid, message: &str) -> IncomingEntry {
        let info = ExceptionInfo {
            class: "OrderFailed".to_string(),
            file: "src/orders.rs".to_string(),
            line: 120,
            message: message.to_string(),
            trace: Vec::new(),
        };
        IncomingEntry::exception(&info, Map::new()).with_batch_id(batch)
    }

    #[tokio::test]
    async fn test_store_and_find_with_tags() {
        let repo = create_test_repository().await;
        let batch = Uuid::now_v7();
        let entry = query_entry(batch, "select 1").with_tags(["x", "y"]);
        let uuid = entry.uuid.to_string();

        repo.store(&[entry]).await.unwrap();

        let found = repo.find(&uuid).await.unwrap();
        assert_eq!(found.entry_type, EntryType::Query);
        assert_eq!(found.batch_id, batch.to_string());
        assert_eq!(found.content["sql"], "select 1");
        assert_eq!(found.tags, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_find_missing_is_not_found() {
        let repo = create_test_repository().await;

        let err = repo.find("does-not-exist").await.unwrap_err();
        assert!(matches!(err, ProfilerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_exception_family_keeps_newest_visible() {
        let repo = create_test_repository().await;
        let batch = Uuid::now_v7();

        let first = exception_entry(batch, "order 1 failed");
        let second = exception_entry(batch, "order 2 failed");
        let second_uuid = second.uuid.to_string();

        repo.store(&[first]).await.unwrap();
        repo.store(&[second]).await.unwrap();

        let family = repo
            .get(Some(EntryType::Exception), &QueryOptions::new().family_hash(
                repo.find(&second_uuid).await.unwrap().family_hash.unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(family.len(), 2);

        let visible: Vec<_> = family.iter().filter(|e| e.should_display_on_index).collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].uuid, second_uuid);
        assert_eq!(visible[0].content["occurrences"], 2);

        let index = repo.get(Some(EntryType::Exception), &QueryOptions::new()).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].uuid, second_uuid);
    }

    #[tokio::test]
    async fn test_exceptions_in_one_chunk_are_counted_sequentially() {
        let repo = create_test_repository().await;
        let batch = Uuid::now_v7();

        let entries = vec![
            exception_entry(batch, "a"),
            exception_entry(batch, "b"),
            exception_entry(batch, "c"),
        ];
        let last_uuid = entries[2].uuid.to_string();

        repo.store(&entries).await.unwrap();

        let last = repo.find(&last_uuid).await.unwrap();
        assert_eq!(last.content["occurrences"], 3);
        assert!(last.should_display_on_index);

        let index = repo.get(Some(EntryType::Exception), &QueryOptions::new()).await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_chunked_insert_small_chunks() {
        let pool = create_test_repository().await.pool().clone();
        let repo = SqliteEntriesRepository::with_pool(pool, 3);
        let batch = Uuid::now_v7();

        let entries: Vec<_> = (0..10)
            .map(|i| query_entry(batch, &format!("select {}", i)).with_tags(["t1", "t2"]))
            .collect();

        repo.store(&entries).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.entry_count, 10);
        assert_eq!(stats.tag_count, 20);
    }

    #[tokio::test]
    async fn test_get_filters_by_batch_and_tag() {
        let repo = create_test_repository().await;
        let batch_a = Uuid::now_v7();
        let batch_b = Uuid::now_v7();

        repo.store(&[
            query_entry(batch_a, "select a").with_tags(["slow"]),
            query_entry(batch_a, "select b"),
            query_entry(batch_b, "select c").with_tags(["slow"]),
        ])
        .await
        .unwrap();

        let by_batch = repo
            .get(None, &QueryOptions::for_batch_id(batch_a.to_string()))
            .await
            .unwrap();
        assert_eq!(by_batch.len(), 2);

        let by_tag = repo.get(None, &QueryOptions::new().tag("slow")).await.unwrap();
        assert_eq!(by_tag.len(), 2);
        assert!(by_tag.iter().all(|e| e.content["sql"] != "select b"));
    }

    #[tokio::test]
    async fn test_get_by_uuids() {
        let repo = create_test_repository().await;
        let batch = Uuid::now_v7();
        let entries = vec![
            query_entry(batch, "select 1"),
            query_entry(batch, "select 2"),
            query_entry(batch, "select 3"),
        ];
        let wanted = vec![entries[0].uuid.to_string(), entries[2].uuid.to_string()];

        repo.store(&entries).await.unwrap();

        let found = repo.get(None, &QueryOptions::new().uuids(wanted)).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].content["sql"], "select 3");
        assert_eq!(found[1].content["sql"], "select 1");
    }

    #[tokio::test]
    async fn test_get_skips_unreadable_content() {
        let repo = create_test_repository().await;
        let batch = Uuid::now_v7();
        repo.store(&[query_entry(batch, "select 1")]).await.unwrap();

        sqlx::query(
            "INSERT INTO profiler_entries (uuid, batch_id, type, content, created_at)
             VALUES ('broken', 'b', 'query', 'not json', 0)",
        )
        .execute(repo.pool())
        .await
        .unwrap();

        let entries = repo.get(Some(EntryType::Query), &QueryOptions::new()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content["sql"], "select 1");
    }

    #[tokio::test]
    async fn test_update_merges_content_and_tags() {
        let repo = create_test_repository().await;
        let job = IncomingEntry::new(json!({"status": "pending", "name": "SendInvoice"}).as_object().cloned().unwrap())
            .with_type(EntryType::Job)
            .with_batch_id(Uuid::now_v7())
            .with_tags(["pending"]);
        let uuid = job.uuid;
        repo.store(&[job]).await.unwrap();

        let update = EntryUpdate::new(
            uuid,
            EntryType::Job,
            json!({"status": "failed"}).as_object().cloned().unwrap(),
        )
        .add_tags(["failed"])
        .remove_tags(["pending"]);

        repo.update(&[update]).await.unwrap();

        let found = repo.find(&uuid.to_string()).await.unwrap();
        assert_eq!(found.content["status"], "failed");
        assert_eq!(found.content["name"], "SendInvoice");
        assert_eq!(found.tags, vec!["failed"]);
    }

    #[tokio::test]
    async fn test_update_requires_matching_type() {
        let repo = create_test_repository().await;
        let entry = query_entry(Uuid::now_v7(), "select 1");
        let uuid = entry.uuid;
        repo.store(&[entry]).await.unwrap();

        let update = EntryUpdate::new(
            uuid,
            EntryType::Job,
            json!({"status": "failed"}).as_object().cloned().unwrap(),
        );
        repo.update(&[update]).await.unwrap();

        let found = repo.find(&uuid.to_string()).await.unwrap();
        assert!(found.content.get("status").is_none());
    }

    #[tokio::test]
    async fn test_update_missing_entry_is_noop() {
        let repo = create_test_repository().await;

        let update = EntryUpdate::new(
            Uuid::now_v7(),
            EntryType::Job,
            json!({"status": "failed"}).as_object().cloned().unwrap(),
        )
        .add_tags(["failed"]);

        repo.update(&[update]).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.tag_count, 0);
    }

    #[tokio::test]
    async fn test_monitor_is_idempotent() {
        let repo = create_test_repository().await;

        repo.monitor(&["User:1".to_string(), "User:1".to_string()]).await.unwrap();
        repo.monitor(&["User:1".to_string(), "Order:7".to_string()]).await.unwrap();

        assert_eq!(repo.monitoring().await.unwrap(), vec!["Order:7", "User:1"]);

        repo.stop_monitoring(&["User:1".to_string()]).await.unwrap();
        assert_eq!(repo.monitoring().await.unwrap(), vec!["Order:7"]);
    }

    #[tokio::test]
    async fn test_monitored_cache_until_terminate() {
        let repo = create_test_repository().await;
        let tags = vec!["A".to_string(), "B".to_string()];

        assert!(!repo.is_monitoring(&tags).await);

        repo.monitor(&["A".to_string()]).await.unwrap();
        // Cached for the current session
        assert!(!repo.is_monitoring(&tags).await);

        repo.terminate().await;
        assert!(repo.is_monitoring(&tags).await);
    }

    #[tokio::test]
    async fn test_pause_flag() {
        let repo = create_test_repository().await;

        assert!(!repo.recording_paused().await.unwrap());
        repo.set_recording_paused(true).await.unwrap();
        assert!(repo.recording_paused().await.unwrap());
        repo.set_recording_paused(false).await.unwrap();
        assert!(!repo.recording_paused().await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_removes_only_older_entries() {
        let pool = create_test_repository().await.pool().clone();
        let repo = SqliteEntriesRepository::with_pool(pool, 2);
        let batch = Uuid::now_v7();
        let now = Utc::now();

        let mut entries = Vec::new();
        for i in 0..5 {
            let mut old = query_entry(batch, &format!("old {}", i)).with_tags(["old"]);
            old.recorded_at = now - ChronoDuration::hours(48);
            entries.push(old);
        }
        entries.push(query_entry(batch, "fresh"));
        repo.store(&entries).await.unwrap();

        let deleted = repo.prune(now - ChronoDuration::hours(24)).await.unwrap();
        assert_eq!(deleted, 5);
        assert_eq!(repo.prune(now - ChronoDuration::hours(24)).await.unwrap(), 0);

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.tag_count, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_entries_and_monitoring() {
        let repo = create_test_repository().await;
        repo.store(&[query_entry(Uuid::now_v7(), "select 1").with_tags(["t"])])
            .await
            .unwrap();
        repo.monitor(&["t".to_string()]).await.unwrap();

        repo.clear().await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.tag_count, 0);
        assert_eq!(stats.monitored_tag_count, 0);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/profiler.db").display());

        {
            let repo = SqliteEntriesRepository::new(&url, DEFAULT_CHUNK_SIZE).await.unwrap();
            repo.set_recording_paused(true).await.unwrap();
            repo.store(&[query_entry(Uuid::now_v7(), "select 1")]).await.unwrap();
            repo.pool().close().await;
        }

        let reopened = SqliteEntriesRepository::new(&url, DEFAULT_CHUNK_SIZE).await.unwrap();
        assert!(reopened.recording_paused().await.unwrap());
        assert_eq!(reopened.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_store_rejects_untyped_entries() {
        let repo = create_test_repository().await;
        let entry = IncomingEntry::new(Map::new());

        let err = repo.store(&[entry]).await.unwrap_err();
        assert!(matches!(err, ProfilerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_uuid_lookup_returns_superseded_occurrences() {
        let repo = create_test_repository().await;
        let batch = Uuid::now_v7();
        let first = exception_entry(batch, "order 1 failed");
        let first_uuid = first.uuid.to_string();

        repo.store(&[first]).await.unwrap();
        repo.store(&[exception_entry(batch, "order 2 failed")]).await.unwrap();

        let found = repo
            .get(
                Some(EntryType::Exception),
                &QueryOptions::new().uuids(vec![first_uuid.clone()]),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uuid, first_uuid);
        assert!(!found[0].should_display_on_index);
    }

    #[tokio::test]
    async fn test_chunk_size_above_bind_limit() {
        let pool = create_test_repository().await.pool().clone();
        let repo = SqliteEntriesRepository::with_pool(pool, 5000);
        let batch = Uuid::now_v7();

        let entries: Vec<_> = (0..5000)
            .map(|i| query_entry(batch, &format!("select {}", i)).with_tags(["bulk"]))
            .collect();

        repo.store(&entries).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.entry_count, 5000);
        assert_eq!(stats.tag_count, 5000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_exception_stores_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("profiler.db").display());
        let repo = Arc::new(SqliteEntriesRepository::new(&url, DEFAULT_CHUNK_SIZE).await.unwrap());

        let mut handles = Vec::new();
        for task in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let mut failures = 0;
                for i in 0..25 {
                    let batch = Uuid::now_v7();
                    let exception = exception_entry(batch, &format!("task {} attempt {}", task, i));
                    if repo.store(&[exception]).await.is_err() {
                        failures += 1;
                    }
                }
                failures
            }));
        }

        let mut failures = 0;
        for handle in handles {
            failures += handle.await.unwrap();
        }
        assert_eq!(failures, 0);

        assert_eq!(repo.stats().await.unwrap().entry_count, 200);

        let index = repo.get(Some(EntryType::Exception), &QueryOptions::new()).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].content["occurrences"], 200);
    }
}
