//! Recording hooks
//!
//! Filters, the tag callback and the collaborator seams (principal lookup,
//! error sink) are registered once through [`RecorderHooksBuilder`] and
//! shared by every recorder.

use super::Recorder;
use crate::entry::{IncomingEntry, Principal};
use crate::error::ProfilerError;
use std::sync::Arc;

pub type EntryFilter = Box<dyn Fn(&IncomingEntry) -> bool + Send + Sync>;
pub type BatchFilter = Box<dyn Fn(&[IncomingEntry]) -> bool + Send + Sync>;
pub type TagCallback = Box<dyn Fn(&IncomingEntry) -> Vec<String> + Send + Sync>;
pub type AfterRecordingHook = Box<dyn Fn(&Recorder, &IncomingEntry) + Send + Sync>;

/// Resolves the principal the current unit of work runs as
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self) -> anyhow::Result<Option<Principal>>;
}

/// Sink for failures that must not reach the host application
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &ProfilerError);
}

/// Default sink: log and move on
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &ProfilerError) {
        tracing::error!(error = %error, "Failed to store profiler entries");
    }
}

pub struct RecorderHooks {
    pub(crate) entry_filters: Vec<EntryFilter>,
    pub(crate) batch_filters: Vec<BatchFilter>,
    pub(crate) tag_callback: Option<TagCallback>,
    pub(crate) after_recording: Option<AfterRecordingHook>,
    pub(crate) principal_resolver: Option<Arc<dyn PrincipalResolver>>,
    pub(crate) error_reporter: Arc<dyn ErrorReporter>,
}

impl RecorderHooks {
    pub fn builder() -> RecorderHooksBuilder {
        RecorderHooksBuilder::default()
    }

    /// Every entry filter accepts `entry`
    pub(crate) fn accepts(&self, entry: &IncomingEntry) -> bool {
        self.entry_filters.iter().all(|filter| filter(entry))
    }

    /// Every batch filter accepts `entries`
    pub(crate) fn accepts_batch(&self, entries: &[IncomingEntry]) -> bool {
        self.batch_filters.iter().all(|filter| filter(entries))
    }

    pub(crate) fn tags_for(&self, entry: &IncomingEntry) -> Vec<String> {
        self.tag_callback
            .as_ref()
            .map(|callback| callback(entry))
            .unwrap_or_default()
    }

    /// Current principal; resolution errors are swallowed
    pub(crate) fn principal(&self) -> Option<Principal> {
        let resolver = self.principal_resolver.as_ref()?;

        match resolver.resolve() {
            Ok(principal) => principal,
            Err(e) => {
                tracing::debug!(error = %e, "Principal resolution failed");
                None
            }
        }
    }

    pub(crate) fn report(&self, error: &ProfilerError) {
        self.error_reporter.report(error);
    }
}

impl Default for RecorderHooks {
    fn default() -> Self {
        RecorderHooksBuilder::default().build()
    }
}

#[derive(Default)]
pub struct RecorderHooksBuilder {
    entry_filters: Vec<EntryFilter>,
    batch_filters: Vec<BatchFilter>,
    tag_callback: Option<TagCallback>,
    after_recording: Option<AfterRecordingHook>,
    principal_resolver: Option<Arc<dyn PrincipalResolver>>,
    error_reporter: Option<Arc<dyn ErrorReporter>>,
}

impl RecorderHooksBuilder {
    /// Keep only entries the predicate accepts
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&IncomingEntry) -> bool + Send + Sync + 'static,
    {
        self.entry_filters.push(Box::new(filter));
        self
    }

    /// Drop the whole batch unless the predicate accepts it
    pub fn filter_batch<F>(mut self, filter: F) -> Self
    where
        F: Fn(&[IncomingEntry]) -> bool + Send + Sync + 'static,
    {
        self.batch_filters.push(Box::new(filter));
        self
    }

    pub fn tag<F>(mut self, callback: F) -> Self
    where
        F: Fn(&IncomingEntry) -> Vec<String> + Send + Sync + 'static,
    {
        self.tag_callback = Some(Box::new(callback));
        self
    }

    pub fn after_recording<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Recorder, &IncomingEntry) + Send + Sync + 'static,
    {
        self.after_recording = Some(Box::new(hook));
        self
    }

    pub fn principal_resolver(mut self, resolver: Arc<dyn PrincipalResolver>) -> Self {
        self.principal_resolver = Some(resolver);
        self
    }

    pub fn error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = Some(reporter);
        self
    }

    pub fn build(self) -> RecorderHooks {
        RecorderHooks {
            entry_filters: self.entry_filters,
            batch_filters: self.batch_filters,
            tag_callback: self.tag_callback,
            after_recording: self.after_recording,
            principal_resolver: self.principal_resolver,
            error_reporter: self
                .error_reporter
                .unwrap_or_else(|| Arc::new(TracingErrorReporter)),
        }
    }
}
