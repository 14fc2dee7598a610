use super::EntryType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Tag delta carried by an update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Partial patch applied to an already stored entry
///
/// Used for state transitions such as a job going from `pending` to
/// `processed` or `failed` without re-sending the whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    pub uuid: Uuid,
    pub entry_type: EntryType,
    pub changes: Map<String, Value>,
    pub tags_changes: TagChanges,
}

impl EntryUpdate {
    pub fn new(uuid: Uuid, entry_type: EntryType, changes: Map<String, Value>) -> Self {
        Self {
            uuid,
            entry_type,
            changes,
            tags_changes: TagChanges::default(),
        }
    }

    /// Merge more changed fields; later values win
    pub fn change(&mut self, changes: Map<String, Value>) -> &mut Self {
        self.changes.extend(changes);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.changes.insert(key.into(), value.into());
        self
    }

    pub fn add_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_changes.added.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn remove_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags_changes.removed.extend(tags.into_iter().map(Into::into));
        self
    }
}
