mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ledger::config::LedgerConfig;
use ledger::entries::search::SearchOptions;
use ledger::entries::types::{EntryType, Importance};

#[derive(Parser)]
#[command(name = "ledger", version, about = "Crash-safe session ledger for coding-assistant hooks")]
struct Cli {
    /// Config file (default: $LEDGER_HOME/config.json or ~/.ledger/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move a session's buffered entries into the database
    Flush {
        #[arg(long)]
        session: String,
        /// Spawn a detached flush process and return immediately
        #[arg(long)]
        background: bool,
    },
    /// Replay flushes interrupted by a crash
    Recover {
        /// Only this session (default: every session)
        #[arg(long)]
        session: Option<String>,
    },
    /// Print the restored context for a session
    Restore {
        #[arg(long)]
        session: String,
        #[arg(long)]
        json: bool,
    },
    /// Full-text search across stored entries
    Search {
        #[arg(required = true)]
        query: Vec<String>,
        #[arg(long)]
        session: Option<String>,
        #[arg(long = "type")]
        entry_type: Option<EntryType>,
        #[arg(long)]
        importance: Option<Importance>,
        /// Match whole words only
        #[arg(long)]
        exact: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show entry counts and database size
    Stats {
        #[arg(long)]
        session: Option<String>,
    },
    /// Check database integrity and buffer state
    Doctor,
    /// Mine a transcript for entries through the configured collaborator
    Extract {
        #[arg(long)]
        session: String,
        /// Transcript file (default: stdin)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Read a status payload on stdin and flush in the background past the threshold
    Status {
        /// Override `buffer.auto_flush_percent`
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Delete stored entries
    Purge {
        #[arg(long, conflicts_with = "older_than_days")]
        session: Option<String>,
        #[arg(long)]
        older_than_days: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Loading may migrate the config file; its log lines go through a
    // bootstrap subscriber until the configured level is known.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("LEDGER_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || match &cli.config {
        Some(path) => LedgerConfig::load_from(path),
        None => LedgerConfig::load(),
    })?;

    // Log to stderr so stdout stays clean for the host tool.
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Flush { session, background } => cli::flush::flush(&config, &session, background)?,
        Command::Recover { session } => cli::flush::recover(&config, session.as_deref())?,
        Command::Restore { session, json } => cli::restore::restore(&config, &session, json)?,
        Command::Search {
            query,
            session,
            entry_type,
            importance,
            exact,
            limit,
            json,
        } => {
            let options = SearchOptions {
                session_id: session,
                entry_type,
                importance,
                prefix_match: !exact,
                limit,
            };
            cli::search::search(&config, &query.join(" "), &options, json)?;
        }
        Command::Stats { session } => cli::stats::stats(&config, session.as_deref())?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Extract { session, input } => {
            cli::extract::extract(&config, &session, input.as_deref()).await?
        }
        Command::Status { threshold } => cli::status::status(&config, threshold)?,
        Command::Purge {
            session,
            older_than_days,
        } => cli::maintenance::purge(&config, session.as_deref(), older_than_days)?,
    }

    Ok(())
}
