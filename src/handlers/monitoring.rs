//! Monitored tag endpoints

use super::ProfilerState;
use crate::error::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct MonitoredTagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
}

/// GET /profiler-api/monitored-tags
pub async fn index(State(state): State<ProfilerState>) -> Result<Json<MonitoredTagsResponse>> {
    let tags = state.monitor.monitoring().await?;
    Ok(Json(MonitoredTagsResponse { tags }))
}

/// POST /profiler-api/monitored-tags - Body: `{"tag": "User:1"}`
pub async fn store(
    State(state): State<ProfilerState>,
    Json(request): Json<TagRequest>,
) -> Result<StatusCode> {
    state.monitor.monitor(&[request.tag]).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /profiler-api/monitored-tags/delete - Body: `{"tag": "User:1"}`
pub async fn destroy(
    State(state): State<ProfilerState>,
    Json(request): Json<TagRequest>,
) -> Result<StatusCode> {
    state.monitor.stop_monitoring(&[request.tag]).await?;
    Ok(StatusCode::NO_CONTENT)
}
