use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result alias used across the profiler core
pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Profiler error types
///
/// Only `NotFound` is expected to reach callers of the recording pipeline;
/// every other variant is caught at the flush point and handed to the
/// configured error reporter.
#[derive(Debug, thiserror::Error)]
pub enum ProfilerError {
    /// No entry exists for the given uuid
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Storage backend failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Entry content could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ProfilerError {
    pub fn not_found(uuid: impl Into<String>) -> Self {
        Self::NotFound(uuid.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProfilerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &ProfilerError) -> &'static str {
    match error {
        ProfilerError::NotFound(_) => "not_found",
        ProfilerError::Database(_) => "database_error",
        ProfilerError::Migration(_) => "migration_error",
        ProfilerError::Serialization(_) => "serialization_error",
        ProfilerError::Config(_) => "config_error",
        ProfilerError::InvalidInput(_) => "invalid_input",
    }
}
