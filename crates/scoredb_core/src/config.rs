//! Store configuration.

use crate::score::ScoreKind;

/// Configuration for creating or opening a store.
#[derive(Debug, Clone)]
pub struct Config {
    /// Digest scheme used for scores.
    ///
    /// Not recorded on disk: a store must be reopened with the kind it was
    /// written with.
    pub score_kind: ScoreKind,

    /// Whether to fsync each data block before its index record is written.
    pub sync_on_write: bool,

    /// Whether to hold an exclusive advisory lock on the data file while open.
    pub lock_files: bool,

    /// Number of key mappings kept in the key-indirection LRU cache.
    pub key_cache_capacity: usize,

    /// Expected number of scores, used to size the existence filter.
    pub filter_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            score_kind: ScoreKind::Md5,
            sync_on_write: true,
            lock_files: true,
            key_cache_capacity: 1024,
            filter_capacity: 4096,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the digest scheme.
    #[must_use]
    pub const fn score_kind(mut self, kind: ScoreKind) -> Self {
        self.score_kind = kind;
        self
    }

    /// Sets whether to sync data blocks on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets whether to lock the data file while open.
    #[must_use]
    pub const fn lock_files(mut self, value: bool) -> Self {
        self.lock_files = value;
        self
    }

    /// Sets the key-indirection cache capacity.
    #[must_use]
    pub const fn key_cache_capacity(mut self, capacity: usize) -> Self {
        self.key_cache_capacity = capacity;
        self
    }

    /// Sets the expected item count for the existence filter.
    #[must_use]
    pub const fn filter_capacity(mut self, capacity: usize) -> Self {
        self.filter_capacity = capacity;
        self
    }
}
