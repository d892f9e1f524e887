//! # scoredb Storage
//!
//! Append-only byte store backends for scoredb.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! data log, the index log and the key log. Backends are **opaque byte
//! stores** - they do not interpret the bytes they hold.
//!
//! ## Design Principles
//!
//! - Backends are simple byte stores (positional read, append, flush, sync)
//! - No knowledge of blocks, scores or index records
//! - Positional reads never depend on the append cursor
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use scoredb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
