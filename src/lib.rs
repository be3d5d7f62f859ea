//! # tvremote
//!
//! A channel directory and remote command bus for an out-of-process stream
//! player.
//!
//! Extended playlists (`#EXTM3U`) are parsed into channel records and
//! stored under a per-catalog namespace in a keyed store, with name and url
//! indexes, a save counter, and a current-channel pointer. Playback
//! commands (`play`, `stop`, `restart`) are published as JSON messages on a
//! bus channel the player subscribes to.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │ Playlist │──▶│  Ingest  │──▶│  Directory   │
//! │  (m3u)   │   │ clear+fill│   │ memory/sqlite│
//! └──────────┘   └──────────┘   └──────┬───────┘
//!                                      │
//!           ┌──────────┐         ┌─────┴──────┐      ┌────────┐
//!           │ CLI/HTTP │────────▶│ CommandBus │─────▶│ player │
//!           │ commands │         │ stop→play  │      │        │
//!           └──────────┘         └────────────┘      └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tvr init                          # create the store
//! tvr ingest-all                    # load every configured playlist
//! tvr search "sports"               # find channels by name
//! tvr play 12                       # stop, settle, play channel 12
//! tvr serve                         # HTTP control surface
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error taxonomy |
//! | [`context`] | Per-operation deadline and cancellation |
//! | [`models`] | Channel records and playlist entries |
//! | [`kv`] | Keyed storage trait and backends |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Keyed storage schema |
//! | [`directory`] | Channel directory over a namespace |
//! | [`export`] | Catalog CSV |
//! | [`playlist`] | Extended-playlist parser |
//! | [`ingest`] | Playlist reload pipeline |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`bus`] | Command bus and transports |
//! | [`control`] | Remote commands and replies |
//! | [`server`] | HTTP control surface |
//! | [`stats`] | Directory statistics |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | `tracing` subscriber setup |

pub mod bus;
pub mod commands;
pub mod config;
pub mod context;
pub mod control;
pub mod db;
pub mod directory;
pub mod error;
pub mod export;
pub mod ingest;
pub mod kv;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod playlist;
pub mod progress;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
