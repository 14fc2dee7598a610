//! Query options for entry lookups
//!
//! `QueryOptions` is the filter/pagination contract consumed by the storage
//! engine. Pagination is cursor based: pass the smallest `sequence` of the
//! previous page as `before` to fetch the next (older) page.

use serde::Deserialize;

/// Default page size
pub const DEFAULT_TAKE: i64 = 50;

/// Page size limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Take(u32),
    /// Full-batch retrieval for detail views
    Unbounded,
}

impl Limit {
    /// Map a raw `take` value; any negative value means no limit
    pub fn from_take(take: i64) -> Self {
        if take < 0 {
            Self::Unbounded
        } else {
            Self::Take(u32::try_from(take).unwrap_or(u32::MAX))
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::Take(DEFAULT_TAKE as u32)
    }
}

/// Filters applied by `EntriesRepository::get`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub batch_id: Option<String>,

    /// Restrict to an explicit set of entry uuids
    pub uuids: Option<Vec<String>>,

    /// Only entries with `sequence < before_sequence`
    pub before_sequence: Option<i64>,

    pub tag: Option<String>,

    pub family_hash: Option<String>,

    pub limit: Limit,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_batch_id(batch_id: impl Into<String>) -> Self {
        Self::new().batch_id(batch_id)
    }

    pub fn from_params(params: QueryParams) -> Self {
        Self {
            batch_id: params.batch_id.filter(|s| !s.is_empty()),
            uuids: params.uuids.filter(|u| !u.is_empty()),
            before_sequence: params.before,
            tag: params.tag.filter(|s| !s.is_empty()),
            family_hash: params.family_hash.filter(|s| !s.is_empty()),
            limit: Limit::from_take(params.take.unwrap_or(DEFAULT_TAKE)),
        }
    }

    pub fn batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn uuids(mut self, uuids: Vec<String>) -> Self {
        self.uuids = Some(uuids);
        self
    }

    pub fn before_sequence(mut self, sequence: i64) -> Self {
        self.before_sequence = Some(sequence);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn family_hash(mut self, family_hash: impl Into<String>) -> Self {
        self.family_hash = Some(family_hash.into());
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    pub fn take(self, take: i64) -> Self {
        self.limit(Limit::from_take(take))
    }

    /// Index listings hide superseded exception occurrences; lookups scoped
    /// to a batch, tag, family or explicit uuids show the full history.
    pub fn is_index_view(&self) -> bool {
        self.batch_id.is_none()
            && self.tag.is_none()
            && self.family_hash.is_none()
            && self.uuids.as_ref().map_or(true, |uuids| uuids.is_empty())
    }
}

/// Raw query parameters accepted by the read API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryParams {
    pub batch_id: Option<String>,
    pub uuids: Option<Vec<String>>,
    pub before: Option<i64>,
    pub tag: Option<String>,
    pub family_hash: Option<String>,
    pub take: Option<i64>,
}
