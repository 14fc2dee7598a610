use super::family::{exception_family_hash, query_family_hash};
use super::EntryType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Authenticated principal attached to entries recorded on its behalf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
        }
    }
}

/// Stable identity of a captured exception
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    pub class: String,
    pub file: String,
    pub line: u32,
    pub message: String,
    /// `(file, line)` frames, innermost first
    pub trace: Vec<(String, u32)>,
}

/// An entry observed during the current unit of work, not yet stored
#[derive(Debug, Clone)]
pub struct IncomingEntry {
    /// Time-ordered identifier assigned at creation
    pub uuid: Uuid,

    /// Assigned to every queued entry at flush time
    pub batch_id: Option<Uuid>,

    /// Stamped by the recorder
    pub entry_type: Option<EntryType>,

    pub family_hash: Option<String>,

    pub content: Map<String, Value>,

    /// Unique tags in insertion order
    pub tags: Vec<String>,

    pub recorded_at: DateTime<Utc>,

    /// Set by the recorder when a tag is in the monitored set
    pub monitored: bool,
}

impl IncomingEntry {
    /// Create an entry from an open content map
    ///
    /// The local hostname is merged into the content.
    pub fn new(content: Map<String, Value>) -> Self {
        let mut content = content;
        content.insert("hostname".to_string(), Value::String(local_hostname()));

        Self {
            uuid: Uuid::now_v7(),
            batch_id: None,
            entry_type: None,
            family_hash: None,
            content,
            tags: Vec::new(),
            recorded_at: Utc::now(),
            monitored: false,
        }
    }

    /// Create an entry from a JSON value; non-object values are wrapped
    /// under a `value` key
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self::new(map)
            }
        }
    }

    /// Create an exception entry keyed by the exception's family
    pub fn exception(info: &ExceptionInfo, extra: Map<String, Value>) -> Self {
        let trace: Vec<Value> = info
            .trace
            .iter()
            .map(|(file, line)| json!({ "file": file, "line": line }))
            .collect();

        let mut content = Map::new();
        content.insert("class".to_string(), json!(info.class));
        content.insert("file".to_string(), json!(info.file));
        content.insert("line".to_string(), json!(info.line));
        content.insert("message".to_string(), json!(info.message));
        content.insert("trace".to_string(), Value::Array(trace));
        content.extend(extra);

        let mut entry = Self::new(content);
        entry.entry_type = Some(EntryType::Exception);
        entry.family_hash = Some(exception_family_hash(&info.class, &info.file, info.line));
        entry
    }

    /// Create a query entry grouped with other runs of the same statement
    pub fn query(sql: &str, extra: Map<String, Value>) -> Self {
        let mut content = Map::new();
        content.insert("sql".to_string(), json!(sql));
        content.extend(extra);

        let mut entry = Self::new(content);
        entry.entry_type = Some(EntryType::Query);
        entry.family_hash = Some(query_family_hash(sql));
        entry
    }

    pub fn with_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = Some(entry_type);
        self
    }

    pub fn with_batch_id(mut self, batch_id: Uuid) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn with_family_hash(mut self, family_hash: impl Into<String>) -> Self {
        self.family_hash = Some(family_hash.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge_tags(tags);
        self
    }

    /// Merge tags, keeping the set unique
    pub fn merge_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Attach the authenticated principal to content and tags
    pub fn set_user(&mut self, principal: &Principal) {
        self.content.insert(
            "user".to_string(),
            json!({
                "id": principal.id,
                "name": principal.name,
                "email": principal.email,
            }),
        );
        self.merge_tags([format!("Auth:{}", principal.id)]);
    }

    pub fn is_exception(&self) -> bool {
        self.entry_type == Some(EntryType::Exception)
    }

    pub fn is_dump(&self) -> bool {
        self.entry_type == Some(EntryType::Dump)
    }

    pub fn is_scheduled_task(&self) -> bool {
        self.entry_type == Some(EntryType::ScheduledTask)
    }

    /// Whether the entry carried a monitored tag when it was recorded
    pub fn has_monitored_tag(&self) -> bool {
        self.monitored
    }

    /// A request answered with a 5xx status
    pub fn is_failed_request(&self) -> bool {
        self.entry_type == Some(EntryType::Request)
            && self
                .content
                .get("response_status")
                .and_then(Value::as_u64)
                .unwrap_or(200)
                >= 500
    }

    pub fn is_failed_job(&self) -> bool {
        self.entry_type == Some(EntryType::Job)
            && self.content.get("status").and_then(Value::as_str) == Some("failed")
    }

    /// Stamp a dump with the request, job or command that produced it
    pub(crate) fn assign_entry_point(&mut self, entry_point: &EntryPoint) {
        self.content.insert(
            "entry_point_type".to_string(),
            json!(entry_point.entry_type.as_str()),
        );
        self.content.insert(
            "entry_point_uuid".to_string(),
            json!(entry_point.uuid.to_string()),
        );
        self.content.insert(
            "entry_point_description".to_string(),
            json!(entry_point.description),
        );
    }
}

/// First request/job/command of a batch, referenced by its dumps
#[derive(Debug, Clone)]
pub(crate) struct EntryPoint {
    pub entry_type: EntryType,
    pub uuid: Uuid,
    pub description: String,
}

impl EntryPoint {
    pub(crate) fn from_batch(entries: &[IncomingEntry]) -> Option<Self> {
        entries.iter().find_map(|entry| {
            let entry_type = entry.entry_type?;
            let key = match entry_type {
                EntryType::Request => "uri",
                EntryType::Job => "name",
                EntryType::Command => "command",
                _ => return None,
            };

            let description = entry
                .content
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            Some(Self {
                entry_type,
                uuid: entry.uuid,
                description,
            })
        })
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
