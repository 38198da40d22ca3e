//! CLI for the v6watch domain capability tracker.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use v6watch_core::config::{self, WatchConfig};
use v6watch_core::probe::HttpProber;
use v6watch_core::resolver::SystemResolver;
use v6watch_core::store::SqliteStore;
use v6watch_core::tracker::Tracker;
use v6watch_core::writer::WriterTask;

use commands::{
    run_add, run_check, run_check_all, run_expiring, run_init, run_remove, run_search,
    run_status,
};

/// Top-level CLI for the v6watch capability tracker.
#[derive(Debug, Parser)]
#[command(name = "v6watch")]
#[command(about = "v6watch: track IPv6/HTTP/HTTPS/HTTP2 support of registered domains", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Register a domain and run its first capability check.
    Add {
        /// Domain name to track (not an IP address).
        domain: String,
        /// Short description shown in listings.
        #[arg(long, default_value = "")]
        desc: String,
    },

    /// Re-check one registered domain.
    Check {
        /// Domain name to re-check.
        domain: String,
    },

    /// Re-check every registered domain, bounded by the admission pool.
    CheckAll,

    /// Show recently registered domains and their capabilities.
    Status,

    /// Search registered domains by substring.
    Search {
        /// Substring to match against domain names.
        needle: String,
    },

    /// List domains whose certificate expires soon.
    Expiring {
        /// Window in days (default from config).
        #[arg(long)]
        days: Option<i64>,
    },

    /// Remove a domain and its capability record.
    Remove {
        /// Domain name to remove.
        domain: String,
    },

    /// Create the domain database and default config if missing.
    Init,
}

impl Cli {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let store = Arc::new(SqliteStore::open_default().await?);

        match cli.command {
            CliCommand::Add { domain, desc } => {
                let (tracker, writer) = build_tracker(&cfg, Arc::clone(&store));
                run_add(&store, &tracker, &domain, &desc).await?;
                shutdown(tracker, writer).await;
            }
            CliCommand::Check { domain } => {
                let (tracker, writer) = build_tracker(&cfg, Arc::clone(&store));
                run_check(&store, &tracker, &domain).await?;
                shutdown(tracker, writer).await;
            }
            CliCommand::CheckAll => {
                let (tracker, writer) = build_tracker(&cfg, Arc::clone(&store));
                run_check_all(&store, &tracker).await?;
                shutdown(tracker, writer).await;
            }
            CliCommand::Status => run_status(&store, cfg.list_limit).await?,
            CliCommand::Search { needle } => run_search(&store, &needle, cfg.list_limit).await?,
            CliCommand::Expiring { days } => {
                run_expiring(&store, days.unwrap_or(cfg.expiry_warning_days)).await?
            }
            CliCommand::Remove { domain } => run_remove(&store, &domain).await?,
            CliCommand::Init => run_init().await?,
        }

        Ok(())
    }
}

/// Wire the probing collaborators for commands that trigger checks.
fn build_tracker(cfg: &WatchConfig, store: Arc<SqliteStore>) -> (Tracker, WriterTask) {
    let prober = HttpProber::new(Duration::from_secs(cfg.probe_timeout_secs));
    Tracker::new(
        store,
        Arc::new(SystemResolver),
        Arc::new(prober),
        cfg.max_concurrent_checks,
    )
}

/// Drop the tracker (last writer clone) and wait for queued snapshots to
/// reach storage before the process exits.
async fn shutdown(tracker: Tracker, writer: WriterTask) {
    drop(tracker);
    writer.close().await;
}
