//! CLI command implementations.

pub mod inspect;
pub mod manage;
pub mod payload;
pub mod verify;

use scoredb_core::{Config, Store, StoreLayout};
use std::path::Path;

/// Errors raised by the CLI itself rather than the store.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// `--kind` named no known digest scheme.
    #[error("unknown score kind '{0}' (expected md5 or xxh64)")]
    UnknownKind(String),

    /// A score argument was not valid hex of the right width.
    #[error("invalid score '{score}': expected {width} hex-encoded bytes")]
    InvalidScore {
        /// The argument as given.
        score: String,
        /// Expected width in bytes.
        width: usize,
    },

    /// No store files under the given name.
    #[error("no store named '{name}' in {dir}")]
    NoSuchStore {
        /// Store name.
        name: String,
        /// Directory searched.
        dir: String,
    },

    /// `verify` found corrupt blocks.
    #[error("verification failed: {0} corrupt block(s)")]
    VerifyFailed(usize),
}

/// Opens an existing store, with a friendlier error when it is missing.
pub fn open_store(dir: &Path, name: &str, config: Config) -> Result<Store, Box<dyn std::error::Error>> {
    if !StoreLayout::new(dir, name).exists() {
        return Err(CliError::NoSuchStore {
            name: name.to_string(),
            dir: dir.display().to_string(),
        }
        .into());
    }
    Ok(Store::open(dir, name, config)?)
}
