//! # scoredb Testkit
//!
//! Test utilities for scoredb.
//!
//! This crate provides:
//! - Store fixtures (temporary directories, reopenable in-memory disks)
//! - A crash-injecting storage backend
//! - Property-based test generators using proptest
//! - Known digest vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scoredb_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_memory_store(|store| {
//!         let score = store.write(b"payload").unwrap();
//!         assert_eq!(store.read(&score).unwrap(), b"payload");
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
