use anyhow::Result;
use app_profiler::config::{self, ProfilerConfig};
use colored::Colorize;
use tracing::info;

/// Execute the config show command
pub fn show(path: &str) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!(path, "Loading configuration for display");

    let cfg = config::load_config(path)?;

    println!("{}", "Current Configuration:".green().bold());
    println!();

    let toml_string = toml::to_string_pretty(&cfg)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
pub fn validate(path: &str) -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!(path, "Validating configuration file");

    let cfg = config::load_config(path)?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    print_summary(&cfg);

    Ok(())
}

fn print_summary(cfg: &ProfilerConfig) {
    println!("{}", "Summary:".bold());
    println!("  Recording: {}", if cfg.enabled { "enabled" } else { "disabled" });
    println!("  Storage: {}", cfg.storage.database_url);
    println!("  Chunk Size: {}", cfg.storage.chunk_size);
    println!("  Ignored Commands: {}", cfg.ignore_commands.len());
    println!("  Ignored Paths: {}", cfg.ignore_paths.len());
    println!("  Retention: {} hours", cfg.prune.hours);
}
