//! Entry listing and detail endpoints
//!
//! One parameterized handler serves every entry type; the type comes from
//! the `{slug}` path segment.

use super::ProfilerState;
use crate::entry::{EntryResult, EntryType, EntryUpdate};
use crate::error::{ProfilerError, Result};
use crate::query::{Limit, QueryOptions, QueryParams};
use crate::storage::{ClearableRepository, EntriesRepository};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

/// Recording status shown alongside listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    Disabled,
    Paused,
    Enabled,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub entries: Vec<EntryResult>,
    pub status: RecordingStatus,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub entry: EntryResult,
    pub batch: Vec<EntryResult>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExceptionUpdateRequest {
    pub resolved_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub recording: bool,
}

/// POST /profiler-api/{slug} - List entries of one type
///
/// Body: `{"before": 120, "take": 50, "tag": "User:1"}` (all optional)
pub async fn index(
    State(state): State<ProfilerState>,
    Path(slug): Path<String>,
    params: Option<Json<QueryParams>>,
) -> Result<Json<EntriesResponse>> {
    let entry_type = entry_type_for(&slug)?;
    let options = QueryOptions::from_params(params.map(|Json(p)| p).unwrap_or_default());

    let entries = state.storage.get(Some(entry_type), &options).await?;
    let status = status(&state).await?;

    Ok(Json(EntriesResponse { entries, status }))
}

/// GET /profiler-api/{slug}/{uuid} - One entry plus its whole batch
pub async fn show(
    State(state): State<ProfilerState>,
    Path((slug, uuid)): Path<(String, String)>,
) -> Result<Json<EntryResponse>> {
    let entry_type = entry_type_for(&slug)?;
    let entry = state.storage.find(&uuid).await?;

    if entry.entry_type != entry_type {
        return Err(ProfilerError::not_found(uuid));
    }

    with_batch(&state, entry).await.map(Json)
}

/// PUT /profiler-api/exceptions/{uuid} - Mark an exception resolved
///
/// Body: `{"resolved_at": "now"}`; anything else leaves the entry as is.
pub async fn update(
    State(state): State<ProfilerState>,
    Path((slug, uuid)): Path<(String, String)>,
    body: Option<Json<ExceptionUpdateRequest>>,
) -> Result<Json<EntryResponse>> {
    if entry_type_for(&slug)? != EntryType::Exception {
        return Err(ProfilerError::not_found(uuid));
    }

    let mut entry = state.storage.find(&uuid).await?;
    if entry.entry_type != EntryType::Exception {
        return Err(ProfilerError::not_found(uuid));
    }

    let request = body.map(|Json(b)| b).unwrap_or_default();

    if request.resolved_at.as_deref() == Some("now") {
        let id = Uuid::from_str(&entry.uuid)
            .map_err(|e| ProfilerError::invalid_input(format!("invalid entry id: {}", e)))?;

        let mut changes = Map::new();
        changes.insert(
            "resolved_at".to_string(),
            Value::String(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        );

        state
            .storage
            .update(&[EntryUpdate::new(id, EntryType::Exception, changes)])
            .await?;

        tracing::info!(uuid = %uuid, "Exception marked resolved");
        entry = state.storage.find(&uuid).await?;
    }

    with_batch(&state, entry).await.map(Json)
}

/// POST /profiler-api/toggle-recording - Flip the global pause flag
pub async fn toggle_recording(State(state): State<ProfilerState>) -> Result<Json<RecordingResponse>> {
    let paused = state.storage.recording_paused().await?;
    state.storage.set_recording_paused(!paused).await?;

    tracing::info!(paused = !paused, "Recording toggled");

    Ok(Json(RecordingResponse { recording: paused }))
}

/// DELETE /profiler-api/entries - Delete every entry and monitored tag
pub async fn clear(State(state): State<ProfilerState>) -> Result<StatusCode> {
    state.storage.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

fn entry_type_for(slug: &str) -> Result<EntryType> {
    EntryType::from_slug(slug)
        .ok_or_else(|| ProfilerError::not_found(format!("no entry type named '{}'", slug)))
}

async fn with_batch(state: &ProfilerState, entry: EntryResult) -> Result<EntryResponse> {
    let options = QueryOptions::for_batch_id(entry.batch_id.clone()).limit(Limit::Unbounded);
    let batch = state.storage.get(None, &options).await?;

    Ok(EntryResponse { entry, batch })
}

async fn status(state: &ProfilerState) -> Result<RecordingStatus> {
    if !state.enabled {
        return Ok(RecordingStatus::Disabled);
    }

    if state.storage.recording_paused().await? {
        return Ok(RecordingStatus::Paused);
    }

    Ok(RecordingStatus::Enabled)
}
