use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use app_profiler::{config, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.get_command();

    // Config commands report their own load errors
    if let cli::Commands::Config { action } = &command {
        init_tracing("warn", "text");
        return match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config),
            cli::ConfigCommands::Validate => commands::config::validate(&args.config),
        };
    }

    if let cli::Commands::Version = command {
        println!("App Profiler v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let cfg = config::load_config(&args.config)?;
    init_tracing(&cfg.logging.level, &cfg.logging.format);

    match command {
        cli::Commands::Serve => commands::serve::execute(cfg).await?,
        cli::Commands::Clear => commands::storage::clear(&cfg).await?,
        cli::Commands::Prune { hours } => commands::storage::prune(&cfg, hours).await?,
        cli::Commands::Monitor { tags } => commands::monitor::monitor(&cfg, &tags).await?,
        cli::Commands::Unmonitor { tags } => commands::monitor::unmonitor(&cfg, &tags).await?,
        cli::Commands::Monitored => commands::monitor::monitored(&cfg).await?,
        cli::Commands::Pause => commands::recording::set_paused(&cfg, true).await?,
        cli::Commands::Resume => commands::recording::set_paused(&cfg, false).await?,
        cli::Commands::Stats => commands::storage::stats(&cfg).await?,
        cli::Commands::Entries(entries_args) => commands::entries::execute(&cfg, entries_args).await?,
        cli::Commands::Config { .. } | cli::Commands::Version => {}
    }

    Ok(())
}
