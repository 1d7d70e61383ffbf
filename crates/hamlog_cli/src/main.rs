//! hamlog sync CLI
//!
//! Command-line tools for syncing a hamlog logbook.
//!
//! # Commands
//!
//! - `status` - Show the sync cursor and pending changes
//! - `sync` - Run cycles until everything is exchanged
//! - `watch` - Run the background sync loop until Ctrl-C
//! - `resync` - Forget the cursor and pull everything again
//! - `demo` - Sync two in-memory devices through an in-process service

mod client;
mod commands;
mod error;
mod knobs;

use clap::{Parser, Subcommand};
use hamlog_sync_engine::SyncMode;
use knobs::SyncKnobs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// hamlog logbook sync tools.
#[derive(Parser)]
#[command(name = "hamlog-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the logbook store
    #[arg(global = true, short, long, env = "HAMLOG_STORE")]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sync cursor and pending changes
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run sync cycles until everything is exchanged
    Sync {
        /// Base URL of the sync service
        #[arg(short, long, env = "HAMLOG_SYNC_URL")]
        url: String,

        /// Batch mode (small, large)
        #[arg(short, long, default_value = "large", value_parser = parse_mode)]
        mode: SyncMode,

        #[command(flatten)]
        knobs: SyncKnobs,
    },

    /// Run the background sync loop until Ctrl-C
    Watch {
        /// Base URL of the sync service
        #[arg(short, long, env = "HAMLOG_SYNC_URL")]
        url: String,

        #[command(flatten)]
        knobs: SyncKnobs,
    },

    /// Forget the sync cursor so the next cycle pulls everything
    Resync,

    /// Sync two in-memory devices through an in-process service
    Demo {
        /// Number of QSOs to log on the first device
        #[arg(long, default_value_t = 120)]
        qsos: usize,

        #[command(flatten)]
        knobs: SyncKnobs,
    },

    /// Show version information
    Version,
}

fn parse_mode(value: &str) -> Result<SyncMode, String> {
    SyncMode::parse(value).ok_or_else(|| format!("unknown sync mode '{value}' (small, large)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let fallback = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status { format } => {
            let path = cli.store.ok_or("Store path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::Sync { url, mode, knobs } => {
            let path = cli.store.ok_or("Store path required for sync")?;
            commands::sync::run(&path, &url, mode, &knobs).await?;
        }
        Commands::Watch { url, knobs } => {
            let path = cli.store.ok_or("Store path required for watch")?;
            commands::watch::run(&path, &url, &knobs).await?;
        }
        Commands::Resync => {
            let path = cli.store.ok_or("Store path required for resync")?;
            commands::resync::run(&path)?;
        }
        Commands::Demo { qsos, knobs } => {
            commands::demo::run(qsos, &knobs).await?;
        }
        Commands::Version => {
            println!("hamlog-sync v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_with_defaults() {
        let cli = Cli::try_parse_from([
            "hamlog-sync",
            "--store",
            "log.json",
            "sync",
            "--url",
            "https://sync.example.org",
        ])
        .unwrap();

        assert_eq!(cli.store, Some(PathBuf::from("log.json")));
        match cli.command {
            Commands::Sync { url, mode, knobs } => {
                assert_eq!(url, "https://sync.example.org");
                assert_eq!(mode, SyncMode::Large);
                assert!(knobs.enabled);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let result = Cli::try_parse_from([
            "hamlog-sync",
            "sync",
            "--url",
            "http://localhost",
            "--mode",
            "huge",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn knobs_can_disable_sync() {
        let cli = Cli::try_parse_from([
            "hamlog-sync",
            "watch",
            "--url",
            "http://localhost",
            "--enabled",
            "false",
            "--batch-size",
            "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch { knobs, .. } => {
                assert!(!knobs.enabled);
                assert_eq!(knobs.batch_size, 20);
            }
            _ => panic!("expected watch"),
        }
    }
}
