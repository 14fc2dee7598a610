//! Unit-of-work approval
//!
//! Decides whether a console command or an inbound request is recorded at
//! all. Worker loops and the profiler's own surfaces are never recorded.

use crate::config::ProfilerConfig;

const IGNORED_COMMANDS: &[&str] = &[
    "migrate:rollback",
    "migrate:fresh",
    "migrate:reset",
    "migrate:install",
    "package:discover",
    "queue:listen",
    "queue:work",
    "horizon",
    "horizon:work",
    "horizon:supervisor",
];

const IGNORED_PATHS: &[&str] = &[
    "profiler-api*",
    "vendor/profiler*",
    "horizon*",
    "vendor/horizon*",
    "nova-api*",
];

/// Path prefix the dashboard is served under
pub const DEFAULT_DASHBOARD_PATH: &str = "profiler";

/// One unit of work the host is about to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOfWork {
    /// A console command, by name
    Command(String),
    /// An inbound request, by path
    Request(String),
}

#[derive(Debug, Clone)]
pub struct ScopeGate {
    enabled: bool,
    ignored_commands: Vec<String>,
    ignored_paths: Vec<String>,
}

impl ScopeGate {
    pub fn new(enabled: bool) -> Self {
        let mut ignored_paths = vec![format!("{}*", DEFAULT_DASHBOARD_PATH)];
        ignored_paths.extend(IGNORED_PATHS.iter().map(|p| p.to_string()));

        Self {
            enabled,
            ignored_commands: IGNORED_COMMANDS.iter().map(|c| c.to_string()).collect(),
            ignored_paths,
        }
    }

    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(config.enabled)
            .ignore_commands(config.ignore_commands.iter().cloned())
            .ignore_paths(config.ignore_paths.iter().cloned())
    }

    pub fn ignore_commands<I: IntoIterator<Item = String>>(mut self, commands: I) -> Self {
        self.ignored_commands.extend(commands);
        self
    }

    pub fn ignore_paths<I: IntoIterator<Item = String>>(mut self, paths: I) -> Self {
        self.ignored_paths.extend(paths);
        self
    }

    pub fn approves(&self, unit: &UnitOfWork) -> bool {
        if !self.enabled {
            return false;
        }

        match unit {
            UnitOfWork::Command(name) => !self.ignored_commands.iter().any(|c| c == name),
            UnitOfWork::Request(path) => {
                let path = path.trim_start_matches('/');
                !self
                    .ignored_paths
                    .iter()
                    .any(|pattern| path_matches(pattern.trim_start_matches('/'), path))
            }
        }
    }
}

/// `*` matches any run of characters, everything else is literal
fn path_matches(pattern: &str, path: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == path;
    }

    let mut rest = path;

    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];

    let last = parts[parts.len() - 1];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}
