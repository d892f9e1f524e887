//! Store lifecycle commands: new, rebuild, delete.

use super::open_store;
use scoredb_core::{Config, Store};
use std::path::Path;

/// Creates a store and prints its name.
pub fn create(dir: &Path, name: Option<&str>, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = match name {
        Some(name) => Store::create(dir, name, config)?,
        None => Store::create_random(dir, config)?,
    };
    println!("{}", store.name());
    store.close()?;
    Ok(())
}

/// Discards the index and rebuilds it from the data log.
pub fn rebuild(dir: &Path, name: &str, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(dir, name, config)?;
    let summary = store.rebuild_index()?;

    println!(
        "Rebuilt index for '{}': {} blocks scanned, {} entries",
        name, summary.blocks, summary.indexed
    );
    if summary.torn_bytes > 0 {
        println!("Discarded {} bytes of torn tail", summary.torn_bytes);
    }
    store.close()?;
    Ok(())
}

/// Deletes the store's files.
pub fn delete(dir: &Path, name: &str, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(dir, name, config)?;
    store.delete()?;
    println!("Deleted store '{}'", name);
    Ok(())
}
