//! Entry model
//!
//! An entry is one recorded observation of a framework event. It moves
//! through three shapes:
//!
//! ```text
//! IncomingEntry (in memory, mutable until flush)
//!     ↓ store()
//! stored row (immutable except through EntryUpdate)
//!     ↓ find()/get()
//! EntryResult (read model)
//! ```

pub mod family;
pub mod incoming;
pub mod result;
pub mod update;

pub use family::{exception_family_hash, query_family_hash};
pub use incoming::{ExceptionInfo, IncomingEntry, Principal};
pub use result::EntryResult;
pub use update::{EntryUpdate, TagChanges};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a recorded entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Request,
    Query,
    Job,
    Cache,
    Command,
    Event,
    Exception,
    Gate,
    Log,
    Mail,
    Model,
    Notification,
    Redis,
    #[serde(rename = "schedule")]
    ScheduledTask,
    View,
    Dump,
}

impl EntryType {
    pub const ALL: [EntryType; 16] = [
        EntryType::Request,
        EntryType::Query,
        EntryType::Job,
        EntryType::Cache,
        EntryType::Command,
        EntryType::Event,
        EntryType::Exception,
        EntryType::Gate,
        EntryType::Log,
        EntryType::Mail,
        EntryType::Model,
        EntryType::Notification,
        EntryType::Redis,
        EntryType::ScheduledTask,
        EntryType::View,
        EntryType::Dump,
    ];

    /// Value persisted in the `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Query => "query",
            Self::Job => "job",
            Self::Cache => "cache",
            Self::Command => "command",
            Self::Event => "event",
            Self::Exception => "exception",
            Self::Gate => "gate",
            Self::Log => "log",
            Self::Mail => "mail",
            Self::Model => "model",
            Self::Notification => "notification",
            Self::Redis => "redis",
            Self::ScheduledTask => "schedule",
            Self::View => "view",
            Self::Dump => "dump",
        }
    }

    /// Path segment used by the read API (`/profiler-api/{slug}`)
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Request => "requests",
            Self::Query => "queries",
            Self::Job => "jobs",
            Self::Cache => "cache",
            Self::Command => "commands",
            Self::Event => "events",
            Self::Exception => "exceptions",
            Self::Gate => "gates",
            Self::Log => "logs",
            Self::Mail => "mail",
            Self::Model => "models",
            Self::Notification => "notifications",
            Self::Redis => "redis",
            Self::ScheduledTask => "schedule",
            Self::View => "views",
            Self::Dump => "dumps",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.slug() == slug)
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = crate::error::ProfilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::error::ProfilerError::invalid_input(format!("unknown entry type: {}", s)))
    }
}
