use serde::{Deserialize, Serialize};

/// Default config file, looked up without extension
pub const DEFAULT_CONFIG_FILE: &str = "profiler";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub enabled: bool,
    pub storage: StorageConfig,
    /// Console commands never recorded, in addition to the built-in list
    pub ignore_commands: Vec<String>,
    /// Request paths never recorded; `*` matches any run of characters
    pub ignore_paths: Vec<String>,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub prune: PruneConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,  // "text" or "json"
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Entries older than this are removed by `profiler prune`
    pub hours: u64,
    /// Background prune interval for `profiler serve`; 0 disables it
    pub interval_seconds: u64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: StorageConfig::default(),
            ignore_commands: Vec::new(),
            ignore_paths: Vec::new(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            prune: PruneConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/profiler.db".to_string(),
            chunk_size: crate::storage::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8085,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            hours: 24,
            interval_seconds: 3600,
        }
    }
}

/// Load `path` (optional file) layered under `PROFILER__*` environment
/// variables, e.g. `PROFILER__STORAGE__CHUNK_SIZE=500`
pub fn load_config(path: &str) -> anyhow::Result<ProfilerConfig> {
    let config = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("PROFILER")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: ProfilerConfig = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &ProfilerConfig) -> anyhow::Result<()> {
    if cfg.storage.database_url.trim().is_empty() {
        anyhow::bail!("storage.database_url cannot be empty");
    }

    if cfg.storage.chunk_size == 0 {
        anyhow::bail!("storage.chunk_size must be greater than zero");
    }

    match cfg.logging.format.as_str() {
        "text" | "json" => {}
        other => anyhow::bail!("Invalid logging.format '{}': expected 'text' or 'json'", other),
    }

    Ok(())
}
