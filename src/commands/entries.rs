//! Entries query command
//!
//! List stored entries from the profiler database.

use super::open_storage;
use anyhow::Result;
use app_profiler::config::ProfilerConfig;
use app_profiler::entry::{EntryResult, EntryType};
use app_profiler::query::QueryOptions;
use app_profiler::storage::EntriesRepository;
use clap::Parser;
use colored::Colorize;

/// List stored entries
#[derive(Debug, Clone, Parser)]
pub struct EntriesArgs {
    /// Entry type slug (requests, queries, exceptions, ...); all types when omitted
    pub entry_type: Option<String>,

    /// Filter by tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Filter by batch id
    #[arg(short, long)]
    pub batch_id: Option<String>,

    /// Only entries older than this sequence number
    #[arg(long)]
    pub before: Option<i64>,

    /// Maximum number of results; negative for no limit
    #[arg(long, default_value = "50", allow_hyphen_values = true)]
    pub take: i64,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    pub format: String,
}

impl EntriesArgs {
    fn query_options(&self) -> QueryOptions {
        let mut options = QueryOptions::new().take(self.take);
        if let Some(tag) = &self.tag {
            options = options.tag(tag.clone());
        }
        if let Some(batch_id) = &self.batch_id {
            options = options.batch_id(batch_id.clone());
        }
        if let Some(before) = self.before {
            options = options.before_sequence(before);
        }
        options
    }
}

/// Execute the entries command
pub async fn execute(cfg: &ProfilerConfig, args: EntriesArgs) -> Result<()> {
    let entry_type = match args.entry_type.as_deref() {
        Some(slug) => match EntryType::from_slug(slug) {
            Some(entry_type) => Some(entry_type),
            None => anyhow::bail!("Unknown entry type '{}'", slug),
        },
        None => None,
    };

    let storage = open_storage(cfg).await?;
    let entries = storage.get(entry_type, &args.query_options()).await?;

    if entries.is_empty() {
        println!("{}", "No entries found matching the criteria".yellow());
        return Ok(());
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => display_entries_text(&entries),
    }

    Ok(())
}

/// Display entries in human-friendly text format
fn display_entries_text(entries: &[EntryResult]) {
    println!("{}", format!("Found {} entries", entries.len()).bold());
    println!();

    for entry in entries {
        let timestamp = entry.recorded_at.format("%Y-%m-%d %H:%M:%S%.3f");

        let type_colored = match entry.entry_type {
            EntryType::Exception => entry.entry_type.as_str().red().bold(),
            EntryType::Request | EntryType::Job | EntryType::Command => {
                entry.entry_type.as_str().green()
            }
            EntryType::Query => entry.entry_type.as_str().blue(),
            _ => entry.entry_type.as_str().normal(),
        };

        let sequence = entry
            .sequence
            .map(|s| format!("#{}", s))
            .unwrap_or_default();

        println!(
            "{} {} {} {} {}",
            timestamp.to_string().dimmed(),
            sequence.dimmed(),
            type_colored,
            entry.uuid.cyan(),
            summarize(entry).dimmed()
        );
    }
}

/// Short one-line description of an entry's content
fn summarize(entry: &EntryResult) -> String {
    let key = match entry.entry_type {
        EntryType::Request => "uri",
        EntryType::Query => "sql",
        EntryType::Job => "name",
        EntryType::Command | EntryType::ScheduledTask => "command",
        EntryType::Exception | EntryType::Log => "message",
        _ => return String::new(),
    };

    let text = entry
        .content
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    if text.chars().count() > 80 {
        format!("{}…", text.chars().take(80).collect::<String>())
    } else {
        text.to_string()
    }
}
