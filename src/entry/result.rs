use super::EntryType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Read model returned by `find()` and `get()`
#[derive(Debug, Clone, Serialize)]
pub struct EntryResult {
    #[serde(rename = "id")]
    pub uuid: String,

    /// Insertion sequence, the pagination cursor
    pub sequence: Option<i64>,

    pub batch_id: String,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    pub family_hash: Option<String>,

    /// False for superseded occurrences of an exception family
    pub should_display_on_index: bool,

    pub content: Value,

    #[serde(rename = "created_at")]
    pub recorded_at: DateTime<Utc>,

    pub tags: Vec<String>,
}
