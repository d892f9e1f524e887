//! # scoredb Core
//!
//! Content-addressed, append-only block store.
//!
//! Every payload is stored once, under its [`Score`]: a fixed-width digest
//! of its bytes. Stores never update or delete individual payloads.
//!
//! This crate provides:
//! - [`Datalog`]: the append-only data log, source of truth
//! - [`Index`]: the rebuildable `Score -> Addr` map
//! - [`Store`]: the façade tying both together, with crash recovery
//! - [`VersionedStore`]: time-ordered keys pointing at scores
//! - [`TxnStore`]: the same contract over a transactional key-value engine
//! - [`TransformedStore`] and [`FilteredStore`]: optional decorators
//!
//! ## Example
//!
//! ```rust
//! use scoredb_core::{Config, Store};
//!
//! let store = Store::in_memory(Config::default()).unwrap();
//! let score = store.write(b"brown fox").unwrap();
//! assert_eq!(score.to_hex(), "fdd929ffb0a167ab33e8b1a8905858cf");
//! assert_eq!(store.read(&score).unwrap(), b"brown fox");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
mod config;
mod content;
mod datalog;
mod error;
mod filter;
mod index;
mod keys;
mod layout;
mod score;
mod store;
mod transform;
mod txn;
mod versioned;

/// Crate version, as recorded in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use codec::Addr;
pub use config::Config;
pub use content::{check_payload, ContentStore};
pub use datalog::{Block, BlockIter, Datalog, ScanSummary, VerifyReport};
pub use error::{CoreError, CoreResult};
pub use filter::{BloomFilter, FilterStats, FilteredStore, DEFAULT_FALSE_POSITIVE_RATE};
pub use index::Index;
pub use keys::{Key, KeyGenerator, KeyIndex, KEY_SIZE};
pub use layout::StoreLayout;
pub use score::{Score, ScoreKind, MAX_SCORE_SIZE};
pub use store::{Store, StoreStats};
pub use transform::{PayloadCodec, Pipeline, TransformedStore};
pub use txn::{MemoryEngine, Transaction, TransactionalEngine, TxnStore};
pub use versioned::VersionedStore;

#[cfg(feature = "compression")]
pub use transform::ZstdCodec;

#[cfg(feature = "encryption")]
pub use transform::{AesGcmCodec, EncryptionKey, ENCRYPTION_KEY_SIZE, NONCE_SIZE, TAG_SIZE};
