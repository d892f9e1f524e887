//! Test fixtures and store helpers.

use scoredb_core::{Config, Store};
use scoredb_storage::InMemoryBackend;
use tempfile::TempDir;

/// The pangram used throughout the test suite.
///
/// Its nine words are nine distinct byte strings: "The" and "the" differ.
pub const PANGRAM: &str = "The quick brown fox jumps over the lazy dog";

/// Lowercase pangram: "the" appears twice, so eight distinct words.
pub const PANGRAM_LOWER: &str = "the quick brown fox jumps over the lazy dog";

/// Splits a sentence into word payloads.
pub fn words(sentence: &str) -> Vec<&[u8]> {
    sentence.split_whitespace().map(str::as_bytes).collect()
}

/// Configuration for tests: locking off so a test can reopen freely.
pub fn test_config() -> Config {
    Config::default().lock_files(false)
}

/// A file-backed store in a temporary directory.
///
/// The directory lives as long as the fixture.
pub struct TempStore {
    /// The temporary directory holding the store files.
    pub dir: TempDir,
    /// Store name inside `dir`.
    pub name: String,
    /// Configuration the store was created with.
    pub config: Config,
}

impl TempStore {
    /// Creates a fresh store named `name`.
    pub fn create(name: &str, config: Config) -> (Self, Store) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = Store::create(dir.path(), name, config.clone()).expect("Failed to create store");
        let fixture = Self {
            dir,
            name: name.to_string(),
            config,
        };
        (fixture, store)
    }

    /// Opens the store again from its files.
    pub fn reopen(&self) -> Store {
        Store::open(self.dir.path(), &self.name, self.config.clone()).expect("Failed to reopen store")
    }

    /// Path of the data log.
    pub fn data_path(&self) -> std::path::PathBuf {
        self.dir.path().join(format!("{}.data", self.name))
    }

    /// Path of the index log.
    pub fn index_path(&self) -> std::path::PathBuf {
        self.dir.path().join(format!("{}.idx", self.name))
    }
}

/// An in-memory store whose backends can be reopened.
///
/// Each [`reopen`](Self::reopen) builds a new store over the same bytes,
/// which is how a process restart looks to the store.
#[derive(Debug, Default)]
pub struct MemoryDisk {
    /// Data log bytes.
    pub data: InMemoryBackend,
    /// Index log bytes.
    pub index: InMemoryBackend,
}

impl MemoryDisk {
    /// Creates an empty disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store over the disk.
    pub fn open(&self, config: Config) -> Store {
        Store::with_backends(
            "disk",
            Box::new(self.data.share()),
            Box::new(self.index.share()),
            config,
        )
        .expect("Failed to open store")
    }

    /// Alias of [`open`](Self::open) for readability in recovery tests.
    pub fn reopen(&self, config: Config) -> Store {
        self.open(config)
    }

    /// Drops every index record, as if the index file had been deleted.
    pub fn lose_index(&self) {
        self.index.share().clear();
    }
}

/// Runs `f` with a fresh in-memory store.
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let store = Store::in_memory(test_config()).expect("Failed to open store");
    f(&store)
}
