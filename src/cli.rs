use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "profiler", version, about = "Application profiler storage and API")]
pub struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = app_profiler::config::DEFAULT_CONFIG_FILE, global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the profiler API (default)
    Serve,

    /// Delete every entry and monitored tag
    Clear,

    /// Delete entries older than the retention window
    Prune {
        /// Keep entries recorded within this many hours (defaults to prune.hours)
        #[arg(long)]
        hours: Option<u64>,
    },

    /// Flag tags for forced capture
    Monitor {
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Stop monitoring tags
    Unmonitor {
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// List monitored tags
    Monitored,

    /// Pause recording in every process sharing the store
    Pause,

    /// Resume recording
    Resume,

    /// Show storage statistics
    Stats,

    /// List stored entries
    Entries(crate::commands::entries::EntriesArgs),

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration
    Show,

    /// Validate configuration file
    Validate,
}

impl Cli {
    /// Get the command to execute, defaulting to Serve if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
