//! Tag extraction
//!
//! Observed subjects (events, jobs, mailables, notifications) describe
//! themselves through the [`Observed`] capability. The extractor prefers a
//! subject's explicit tags and otherwise formats the domain entities it
//! references as `Type:key`.

use std::collections::HashSet;
use std::fmt;

/// A domain entity referenced by an observed subject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub entity_type: String,
    /// Primary key parts; composite keys are joined with `_`
    pub keys: Vec<String>,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, key: impl ToString) -> Self {
        Self {
            entity_type: entity_type.into(),
            keys: vec![key.to_string()],
        }
    }

    pub fn composite<I, K>(entity_type: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: ToString,
    {
        Self {
            entity_type: entity_type.into(),
            keys: keys.into_iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.keys.join("_"))
    }
}

/// Correlation capability implemented by adapters for each observed type
pub trait Observed {
    /// Tags the subject chooses for itself; `None` falls back to entities
    fn explicit_tags(&self) -> Option<Vec<String>> {
        None
    }

    /// Domain entities referenced by the subject
    fn entities(&self) -> anyhow::Result<Vec<EntityRef>> {
        Ok(Vec::new())
    }
}

/// A queued job, possibly wrapping the subject that actually carries tags
pub enum QueuedJob<'a> {
    BroadcastEvent(&'a dyn Observed),
    /// A queued event listener; tagged by both the listener and its event
    Listener {
        listener: &'a dyn Observed,
        event: Option<&'a dyn Observed>,
    },
    Mailable(&'a dyn Observed),
    Notification(&'a dyn Observed),
    Plain(&'a dyn Observed),
}

impl<'a> QueuedJob<'a> {
    /// The subjects whose tags describe this job
    fn targets(&self) -> Vec<&'a dyn Observed> {
        match self {
            Self::BroadcastEvent(event) => vec![*event],
            Self::Listener { listener, event } => {
                let mut targets = vec![*listener];
                targets.extend(event.iter().copied());
                targets
            }
            Self::Mailable(mailable) => vec![*mailable],
            Self::Notification(notification) => vec![*notification],
            Self::Plain(job) => vec![*job],
        }
    }
}

pub struct TagExtractor;

impl TagExtractor {
    /// Tags for a single subject
    pub fn for_subject(subject: &dyn Observed) -> Vec<String> {
        Self::from_targets(&[subject])
    }

    /// Tags for a queued job, after unwrapping it
    pub fn from_job(job: &QueuedJob<'_>) -> Vec<String> {
        match job {
            // Listener tags and event tags are resolved independently
            QueuedJob::Listener { .. } => {
                let mut tags = UniqueTags::default();
                for target in job.targets() {
                    tags.extend(Self::for_subject(target));
                }
                tags.into_vec()
            }
            _ => Self::from_targets(&job.targets()),
        }
    }

    /// Tags for a plain list of entity references
    pub fn from_entities(entities: &[EntityRef]) -> Vec<String> {
        let mut tags = UniqueTags::default();
        tags.extend(entities.iter().map(ToString::to_string));
        tags.into_vec()
    }

    fn from_targets(targets: &[&dyn Observed]) -> Vec<String> {
        let mut explicit = UniqueTags::default();
        for target in targets {
            if let Some(tags) = target.explicit_tags() {
                explicit.extend(tags);
            }
        }

        if !explicit.is_empty() {
            return explicit.into_vec();
        }

        let mut entities = Vec::new();
        for target in targets {
            match target.entities() {
                Ok(found) => entities.extend(found),
                Err(e) => {
                    tracing::debug!(error = %e, "Entity discovery failed, no tags extracted");
                    return Vec::new();
                }
            }
        }

        Self::from_entities(&entities)
    }
}

/// Insertion-ordered tag set
#[derive(Default)]
struct UniqueTags {
    seen: HashSet<String>,
    tags: Vec<String>,
}

impl UniqueTags {
    fn extend<I: IntoIterator<Item = String>>(&mut self, tags: I) {
        for tag in tags {
            if self.seen.insert(tag.clone()) {
                self.tags.push(tag);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn into_vec(self) -> Vec<String> {
        self.tags
    }
}
