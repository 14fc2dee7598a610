use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::ProfilerConfig,
    handlers::{self, ProfilerState},
    storage::{spawn_prune_task, PruneSchedule, SqliteEntriesRepository},
};

/// Start the profiler API server
///
/// This function:
/// 1. Opens (and migrates) the entry store
/// 2. Starts the background prune task when configured
/// 3. Serves the read and operator API until Ctrl-C
pub async fn start_server(config: ProfilerConfig) -> Result<()> {
    let storage = Arc::new(
        SqliteEntriesRepository::new(&config.storage.database_url, config.storage.chunk_size)
            .await
            .context("Failed to open profiler storage")?,
    );

    let prune_handle = if config.prune.interval_seconds > 0 {
        info!(
            keep_hours = config.prune.hours,
            interval_seconds = config.prune.interval_seconds,
            "Scheduled pruning enabled"
        );
        Some(spawn_prune_task(
            storage.clone(),
            PruneSchedule {
                keep_hours: config.prune.hours,
                interval: Duration::from_secs(config.prune.interval_seconds),
            },
        ))
    } else {
        None
    };

    let app = create_router(ProfilerState::new(storage, config.enabled));

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    info!("Starting profiler API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    if let Some(handle) = prune_handle {
        handle.abort();
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: ProfilerState) -> Router {
    let api = Router::new()
        .route(
            "/monitored-tags",
            get(handlers::monitoring::index).post(handlers::monitoring::store),
        )
        .route("/monitored-tags/delete", post(handlers::monitoring::destroy))
        .route("/toggle-recording", post(handlers::entries::toggle_recording))
        .route("/entries", delete(handlers::entries::clear))
        .route("/:slug", post(handlers::entries::index))
        .route(
            "/:slug/:uuid",
            get(handlers::entries::show).put(handlers::entries::update),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/profiler-api", api)
        .with_state(state)
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryType, ExceptionInfo, IncomingEntry};
    use crate::storage::EntriesRepository;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Map, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn create_state() -> ProfilerState {
        let storage = SqliteEntriesRepository::new("sqlite::memory:", 1000)
            .await
            .unwrap();
        ProfilerState::new(Arc::new(storage), true)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(create_state().await);

        let (status, body) = send(app, empty_request("GET", "/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_index_lists_entries_with_status() {
        let state = create_state().await;
        let batch = Uuid::now_v7();
        state
            .storage
            .store(&[
                IncomingEntry::from_value(json!({"sql": "select 1"}))
                    .with_type(EntryType::Query)
                    .with_batch_id(batch),
                IncomingEntry::from_value(json!({"uri": "/"}))
                    .with_type(EntryType::Request)
                    .with_batch_id(batch),
            ])
            .await
            .unwrap();
        let app = create_router(state);

        let (status, body) = send(app, json_request("POST", "/profiler-api/queries", json!({}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "enabled");
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
        assert_eq!(body["entries"][0]["type"], "query");
    }

    #[tokio::test]
    async fn test_index_without_body() {
        let app = create_router(create_state().await);

        let (status, body) = send(app, empty_request("POST", "/profiler-api/logs")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let app = create_router(create_state().await);

        let (status, body) = send(app, json_request("POST", "/profiler-api/widgets", json!({}))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_show_returns_entry_and_batch() {
        let state = create_state().await;
        let batch = Uuid::now_v7();
        let request = IncomingEntry::from_value(json!({"uri": "/orders"}))
            .with_type(EntryType::Request)
            .with_batch_id(batch);
        let uuid = request.uuid;
        state
            .storage
            .store(&[
                request,
                IncomingEntry::from_value(json!({"sql": "select 1"}))
                    .with_type(EntryType::Query)
                    .with_batch_id(batch),
            ])
            .await
            .unwrap();
        let app = create_router(state);

        let (status, body) = send(
            app.clone(),
            empty_request("GET", &format!("/profiler-api/requests/{}", uuid)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entry"]["id"], uuid.to_string());
        assert_eq!(body["batch"].as_array().unwrap().len(), 2);

        let (status, _) = send(app, empty_request("GET", &format!("/profiler-api/queries/{}", uuid))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resolve_exception() {
        let state = create_state().await;
        let info = ExceptionInfo {
            class: "Timeout".to_string(),
            file: "src/client.rs".to_string(),
            line: 14,
            message: "timed out".to_string(),
            trace: Vec::new(),
        };
        let exception = IncomingEntry::exception(&info, Map::new()).with_batch_id(Uuid::now_v7());
        let uuid = exception.uuid;
        state.storage.store(&[exception]).await.unwrap();
        let app = create_router(state);

        let (status, body) = send(
            app,
            json_request(
                "PUT",
                &format!("/profiler-api/exceptions/{}", uuid),
                json!({"resolved_at": "now"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["entry"]["content"]["resolved_at"].is_string());
        assert_eq!(body["entry"]["content"]["occurrences"], 1);
    }

    #[tokio::test]
    async fn test_monitored_tags_round_trip() {
        let app = create_router(create_state().await);

        let (status, _) = send(
            app.clone(),
            json_request("POST", "/profiler-api/monitored-tags", json!({"tag": "User:9"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(app.clone(), empty_request("GET", "/profiler-api/monitored-tags")).await;
        assert_eq!(body["tags"], json!(["User:9"]));

        send(
            app.clone(),
            json_request("POST", "/profiler-api/monitored-tags/delete", json!({"tag": "User:9"})),
        )
        .await;

        let (_, body) = send(app, empty_request("GET", "/profiler-api/monitored-tags")).await;
        assert_eq!(body["tags"], json!([]));
    }

    #[tokio::test]
    async fn test_toggle_recording_pauses_and_resumes() {
        let state = create_state().await;
        let app = create_router(state.clone());

        let (_, body) = send(app.clone(), empty_request("POST", "/profiler-api/toggle-recording")).await;
        assert_eq!(body["recording"], false);
        assert!(state.storage.recording_paused().await.unwrap());

        let (_, body) = send(app.clone(), json_request("POST", "/profiler-api/logs", json!({}))).await;
        assert_eq!(body["status"], "paused");

        let (_, body) = send(app, empty_request("POST", "/profiler-api/toggle-recording")).await;
        assert_eq!(body["recording"], true);
    }

    #[tokio::test]
    async fn test_clear_entries() {
        let state = create_state().await;
        state
            .storage
            .store(&[IncomingEntry::from_value(json!({"message": "hi"})).with_type(EntryType::Log)])
            .await
            .unwrap();
        let app = create_router(state.clone());

        let (status, _) = send(app, empty_request("DELETE", "/profiler-api/entries")).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.storage.stats().await.unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_disabled_status() {
        let storage = SqliteEntriesRepository::new("sqlite::memory:", 1000)
            .await
            .unwrap();
        let app = create_router(ProfilerState::new(Arc::new(storage), false));

        let (_, body) = send(app, json_request("POST", "/profiler-api/jobs", json!({}))).await;
        assert_eq!(body["status"], "disabled");
    }
}
