//! CLI command implementations that read the directory or drive the bus.
//!
//! Every command opens the configured store, binds a [`Directory`] to the
//! selected catalog, and prints its result to stdout.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::bus::{self, CommandBus};
use crate::config::Config;
use crate::context::OpContext;
use crate::control::{Controller, RemoteCommand};
use crate::directory::Directory;
use crate::kv;
use crate::models::ChannelRecord;

async fn open_directory(config: &Config, catalog: &str) -> Result<Arc<Directory>> {
    let store = kv::open(&config.store).await?;
    Ok(Arc::new(Directory::for_catalog(store, config, catalog)?))
}

async fn open_controller(config: &Config, catalog: &str) -> Result<Controller> {
    let directory = open_directory(config, catalog).await?;
    let transport = bus::open_transport(&config.bus)?;
    let bus = CommandBus::new(directory, transport, &config.bus)
        .with_titles(bus::open_titles(&config.bus)?);
    let bus = Arc::new(bus);
    Ok(Controller::new(bus))
}

fn print_record(record: &ChannelRecord) {
    println!("id:       {}", record.id);
    println!("name:     {}", record.name);
    println!("category: {}", record.category.as_deref().unwrap_or("-"));
    println!("url:      {}", record.url);
}

/// `tvr init`: create the store and its schema.
pub async fn run_init(config: &Config) -> Result<()> {
    let store = kv::open(&config.store).await?;
    println!("Store initialized ({}).", store.backend());
    Ok(())
}

/// `tvr get <id>`
pub async fn run_get(config: &Config, catalog: &str, id: &str) -> Result<()> {
    let directory = open_directory(config, catalog).await?;
    let record = directory.get_by_id(&OpContext::background(), id).await?;
    print_record(&record);
    Ok(())
}

/// `tvr search <query>`
pub async fn run_search(
    config: &Config,
    catalog: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    let directory = open_directory(config, catalog).await?;
    let mut found = directory
        .search_by_name(&OpContext::background(), query)
        .await?;
    if found.is_empty() {
        println!("No channels found.");
        return Ok(());
    }

    found.sort_by_key(|r| r.id.parse::<u64>().unwrap_or(u64::MAX));
    let total = found.len();
    if let Some(limit) = limit {
        found.truncate(limit);
    }
    for record in &found {
        println!("{:>6}  {}", record.id, record.name);
    }
    if found.len() < total {
        println!("... {} more", total - found.len());
    }
    Ok(())
}

/// `tvr count`
pub async fn run_count(config: &Config, catalog: &str) -> Result<()> {
    let directory = open_directory(config, catalog).await?;
    println!("{}", directory.count(&OpContext::background()).await?);
    Ok(())
}

/// `tvr current`
pub async fn run_current(config: &Config, catalog: &str) -> Result<()> {
    let directory = open_directory(config, catalog).await?;
    let record = directory.get_current(&OpContext::background()).await?;
    print_record(&record);
    Ok(())
}

/// `tvr random --pick-only`: draw an id without playing it.
pub async fn run_pick_random(config: &Config, catalog: &str) -> Result<()> {
    let directory = open_directory(config, catalog).await?;
    println!("{}", directory.random_id(&OpContext::background()).await?);
    Ok(())
}

/// Run one remote command and print its reply.
pub async fn run_remote(config: &Config, catalog: &str, command: RemoteCommand) -> Result<()> {
    let name = command.name();
    let controller = open_controller(config, catalog).await?;
    let reply = controller
        .handle(&OpContext::background(), command)
        .await
        .with_context(|| format!("{} failed", name))?;
    println!("{}", reply.content);
    Ok(())
}
