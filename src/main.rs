//! # tvremote CLI (`tvr`)
//!
//! The `tvr` binary loads playlists into the channel directory, queries it,
//! publishes playback commands, and runs the HTTP control surface.
//!
//! ## Usage
//!
//! ```bash
//! tvr --config ./config/tvr.toml [--catalog <name>] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tvr init` | Create the store and its schema |
//! | `tvr ingest` | Reload one catalog from its playlist |
//! | `tvr ingest-all` | Reload every catalog that has a playlist |
//! | `tvr get <id>` | Print one channel |
//! | `tvr search "<query>"` | Search channels by name |
//! | `tvr count` | Print the save counter |
//! | `tvr random` | Play a random channel |
//! | `tvr current` | Print the current channel |
//! | `tvr export` | Write the catalog CSV |
//! | `tvr stats` | Counter, records, and index health per catalog |
//! | `tvr play <id>` | Stop, settle, then play a channel |
//! | `tvr stop` | Stop playback |
//! | `tvr restart` | Restart the player on the current channel |
//! | `tvr yt <url>` | Play an external video |
//! | `tvr serve` | Start the HTTP control surface |
//!
//! ## Examples
//!
//! ```bash
//! # Load the movies catalog from a downloaded playlist
//! tvr --catalog movies ingest --file ./movies.m3u
//!
//! # Find and play a channel
//! tvr search "sports max"
//! tvr play 42
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tvremote::commands;
use tvremote::config;
use tvremote::control::RemoteCommand;
use tvremote::ingest;
use tvremote::logging;
use tvremote::progress::ProgressMode;
use tvremote::server;
use tvremote::stats;

/// tvremote CLI: a channel directory and remote command bus for a stream
/// player.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/tvr.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "tvr",
    about = "tvremote - channel directory and remote command bus for a stream player",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/tvr.toml")]
    config: PathBuf,

    /// Catalog to operate on, as named under `[catalogs.<name>]`.
    #[arg(long, global = true, default_value = "tv")]
    catalog: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the store and its schema. Safe to run more than once.
    Init,

    /// Clear the catalog and reload it from a playlist.
    ///
    /// Uses the catalog's configured playlist unless `--file` is given.
    Ingest {
        /// Playlist file to load instead of the configured one.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Progress output: `off`, `human`, or `json` (stderr).
        /// Defaults to `human` when stderr is a terminal.
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Reload every catalog that has a playlist configured.
    IngestAll {
        /// Progress output: `off`, `human`, or `json` (stderr).
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,
    },

    /// Print a channel by id.
    Get { id: String },

    /// Search channels by name (case- and spacing-insensitive).
    Search {
        query: String,

        /// Maximum number of results to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the save counter.
    Count,

    /// Play a random channel.
    Random {
        /// Only print a random id; publish nothing.
        #[arg(long)]
        pick_only: bool,
    },

    /// Print the channel last played.
    Current,

    /// Write `<export.dir>/<namespace>-catalog.csv`.
    Export,

    /// Show counter, record, and index statistics for every catalog.
    Stats,

    /// Stop playback, wait the settle interval, then play a channel.
    Play { id: u64 },

    /// Stop playback.
    Stop,

    /// Restart the player and replay the current channel.
    Restart,

    /// Play an external video url.
    Yt {
        url: String,

        /// Title shown by the player.
        #[arg(long)]
        title: Option<String>,
    },

    /// Start the HTTP control surface.
    Serve {
        /// Do not reload catalogs before binding.
        #[arg(long)]
        skip_ingest: bool,
    },
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}': use off, human, or json", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.log.filter);

    if cfg.store_is_volatile() && !matches!(cli.command, Commands::Serve { .. }) {
        tracing::warn!(
            "store.backend is 'memory': data written by this command is lost when it exits; \
             use the sqlite backend or run `tvr serve`"
        );
    }

    let catalog = cli.catalog.as_str();
    match cli.command {
        Commands::Init => {
            commands::run_init(&cfg).await?;
        }
        Commands::Ingest { file, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, catalog, file, mode).await?;
        }
        Commands::IngestAll { progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest_all(&cfg, mode).await?;
        }
        Commands::Get { id } => {
            commands::run_get(&cfg, catalog, &id).await?;
        }
        Commands::Search { query, limit } => {
            commands::run_search(&cfg, catalog, &query, limit).await?;
        }
        Commands::Count => {
            commands::run_count(&cfg, catalog).await?;
        }
        Commands::Random { pick_only } => {
            if pick_only {
                commands::run_pick_random(&cfg, catalog).await?;
            } else {
                commands::run_remote(&cfg, catalog, RemoteCommand::Random).await?;
            }
        }
        Commands::Current => {
            commands::run_current(&cfg, catalog).await?;
        }
        Commands::Export => {
            commands::run_remote(&cfg, catalog, RemoteCommand::Catalog).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Play { id } => {
            commands::run_remote(&cfg, catalog, RemoteCommand::Tv { channel: id }).await?;
        }
        Commands::Stop => {
            commands::run_remote(&cfg, catalog, RemoteCommand::Stop).await?;
        }
        Commands::Restart => {
            commands::run_remote(&cfg, catalog, RemoteCommand::Restart).await?;
        }
        Commands::Yt { url, title } => {
            commands::run_remote(&cfg, catalog, RemoteCommand::Yt { url, title }).await?;
        }
        Commands::Serve { skip_ingest } => {
            server::run_server(&cfg, skip_ingest).await?;
        }
    }

    Ok(())
}
