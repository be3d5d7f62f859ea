//! TOML configuration parsing and validation.
//!
//! The namespace of every catalog is fixed here at load time; nothing in
//! the library reassigns it afterwards.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub catalogs: BTreeMap<String, CatalogConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_transport")]
    pub transport: String,
    #[serde(default = "default_bus_channel")]
    pub channel: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_settle_ms")]
    pub restart_wait_ms: u64,
    #[serde(default = "default_bus_timeout_secs")]
    pub timeout_secs: u64,
    /// oEmbed endpoint used to title external videos, e.g.
    /// `https://www.youtube.com/oembed`. Unset disables the lookup.
    #[serde(default)]
    pub title_lookup: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            channel: default_bus_channel(),
            endpoint: None,
            settle_ms: default_settle_ms(),
            restart_wait_ms: default_settle_ms(),
            timeout_secs: default_bus_timeout_secs(),
            title_lookup: None,
        }
    }
}

impl BusConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn restart_wait(&self) -> Duration {
        Duration::from_millis(self.restart_wait_ms)
    }
}

fn default_transport() -> String {
    "broadcast".to_string()
}
fn default_bus_channel() -> String {
    "tvremote".to_string()
}
fn default_settle_ms() -> u64 {
    2000
}
fn default_bus_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_catalog")]
    pub catalog: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            catalog: default_catalog(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7339".to_string()
}
fn default_catalog() -> String {
    "tv".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// One catalog: a directory namespace plus the playlist file that fills it.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub namespace: String,
    #[serde(default)]
    pub playlist: Option<PathBuf>,
}

impl Config {
    /// True when the store lives only as long as the process, so data
    /// written by one CLI invocation is gone for the next.
    pub fn store_is_volatile(&self) -> bool {
        self.store.backend == "memory"
    }

    /// Look up a catalog by name.
    pub fn catalog(&self, name: &str) -> crate::Result<&CatalogConfig> {
        self.catalogs.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
            Error::Configuration(format!(
                "unknown catalog '{}'; configured: {}",
                name,
                known.join(", ")
            ))
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Check every cross-field rule. Violations are fatal at start.
pub fn validate(config: &Config) -> std::result::Result<(), Error> {
    let bail = |msg: String| Err(Error::Configuration(msg));

    // Validate store
    match config.store.backend.as_str() {
        "memory" => {}
        "sqlite" => {
            if config.store.path.is_none() {
                return bail("store.path is required when store.backend is 'sqlite'".into());
            }
        }
        other => {
            return bail(format!(
                "Unknown store backend: '{}'. Must be sqlite or memory.",
                other
            ))
        }
    }

    // Validate bus
    match config.bus.transport.as_str() {
        "broadcast" => {}
        "webhook" => match config.bus.endpoint.as_deref() {
            Some(e) if !e.trim().is_empty() => {}
            _ => return bail("bus.endpoint is required when bus.transport is 'webhook'".into()),
        },
        other => {
            return bail(format!(
                "Unknown bus transport: '{}'. Must be webhook or broadcast.",
                other
            ))
        }
    }
    if config.bus.channel.trim().is_empty() {
        return bail("bus.channel must not be empty".into());
    }
    if config.bus.timeout_secs == 0 {
        return bail("bus.timeout_secs must be > 0".into());
    }
    if let Some(lookup) = &config.bus.title_lookup {
        if !lookup.starts_with("http://") && !lookup.starts_with("https://") {
            return bail("bus.title_lookup must be an http(s) url".into());
        }
    }

    // Validate server
    if config.server.request_timeout_secs == 0 {
        return bail("server.request_timeout_secs must be > 0".into());
    }

    // Validate catalogs
    if config.catalogs.is_empty() {
        return bail("at least one [catalogs.<name>] section is required".into());
    }
    let mut namespaces = HashSet::new();
    for (name, catalog) in &config.catalogs {
        let ns = catalog.namespace.as_str();
        if ns.is_empty() || ns.contains(':') || ns.chars().any(char::is_whitespace) {
            return bail(format!(
                "catalogs.{}.namespace must be non-empty without ':' or whitespace",
                name
            ));
        }
        if !namespaces.insert(ns) {
            return bail(format!(
                "catalogs.{}.namespace '{}' is used by another catalog",
                name, ns
            ));
        }
    }
    if !config.catalogs.contains_key(&config.server.catalog) {
        return bail(format!(
            "server.catalog '{}' is not a configured catalog",
            config.server.catalog
        ));
    }

    Ok(())
}
