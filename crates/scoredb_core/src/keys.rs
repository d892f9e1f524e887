//! Key indirection.
//!
//! A [`Key`] names one logical write, independent of its content. Every
//! call to [`KeyIndex::write`] mints a fresh key and appends a fixed-width
//! `[key][score]` record to the key log. Because keys are strictly
//! increasing, the key log is sorted by construction and a cache miss is
//! served by binary search over positional reads.

use crate::codec;
use crate::error::{CoreError, CoreResult};
use crate::score::{Score, ScoreKind};
use lru::LruCache;
use scoredb_storage::StorageBackend;
use std::fmt;
use std::num::NonZeroUsize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Size of a key in bytes.
pub const KEY_SIZE: usize = 16;

/// Identifier of one logical write.
///
/// Keys are UUIDv7 values: the leading 48 bits are a millisecond timestamp,
/// and the random tail distinguishes keys minted by different processes.
/// Byte order equals generation order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Creates a key from raw bytes.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a slice.
    ///
    /// Returns `None` if the slice is not exactly 16 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Parses the hyphenated or simple UUID form.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self::from_uuid)
    }

    /// Creates a key from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }

    /// Returns the raw bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.to_uuid())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

/// Mints strictly increasing keys.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    last: Option<u128>,
}

impl KeyGenerator {
    /// Creates a generator with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator whose keys all sort after `last`.
    #[must_use]
    pub fn after(last: Key) -> Self {
        Self {
            last: Some(last.to_uuid().as_u128()),
        }
    }

    /// Returns a key greater than every key previously returned.
    ///
    /// If the clock has not moved past the last key (same millisecond with
    /// an unlucky random tail, or a clock step backwards), the last key is
    /// bumped by one instead.
    pub fn next_key(&mut self) -> Key {
        let candidate = Uuid::now_v7().as_u128();
        let value = match self.last {
            Some(last) if candidate <= last => last.saturating_add(1),
            _ => candidate,
        };
        self.last = Some(value);
        Key::from_uuid(Uuid::from_u128(value))
    }
}

/// Persistent `Key -> Score` mapping with an LRU cache in front.
pub struct KeyIndex {
    backend: Box<dyn StorageBackend>,
    score_size: usize,
    records: u64,
    cache: LruCache<Key, Score>,
    generator: KeyGenerator,
}

impl KeyIndex {
    /// Opens a key log, discarding a torn trailing record.
    ///
    /// The generator is seeded with the last persisted key so new keys
    /// keep the log sorted.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        kind: ScoreKind,
        cache_capacity: usize,
    ) -> CoreResult<Self> {
        let score_size = kind.size();
        let record_len = codec::key_record_len(score_size) as u64;

        let size = backend.size()?;
        let whole = size - size % record_len;
        if whole < size {
            warn!(bytes = size - whole, "discarding torn record at end of key log");
            backend.truncate(whole)?;
        }

        let records = whole / record_len;
        let generator = if records == 0 {
            KeyGenerator::new()
        } else {
            let (last, _) = read_record(&*backend, score_size, records - 1)?;
            KeyGenerator::after(last)
        };

        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            backend,
            score_size,
            records,
            cache: LruCache::new(capacity),
            generator,
        })
    }

    /// Number of persisted mappings.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.records
    }

    /// Returns `true` if no mapping has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Mints a key for `score`, persists the pair and caches it.
    pub fn write(&mut self, score: &Score) -> CoreResult<Key> {
        if score.len() != self.score_size {
            return Err(CoreError::invalid_state(format!(
                "key log holds {}-byte scores, got {}",
                self.score_size,
                score.len()
            )));
        }

        let key = self.generator.next_key();
        let record = codec::encode_key_record(&key, score);

        let start = self.backend.size()?;
        if let Err(err) = self.append(&record) {
            if let Err(rollback) = self.backend.truncate(start) {
                warn!(offset = start, error = %rollback, "failed to roll back key record");
            }
            return Err(err);
        }

        self.records += 1;
        self.cache.put(key, *score);
        debug!(key = %key, score = %score, "mapped key");
        Ok(key)
    }

    fn append(&mut self, record: &[u8]) -> CoreResult<()> {
        self.backend.append(record)?;
        self.backend.flush()?;
        Ok(())
    }

    /// Resolves a key, consulting the cache before the key log.
    pub fn read(&mut self, key: &Key) -> CoreResult<Score> {
        if let Some(score) = self.cache.get(key) {
            return Ok(*score);
        }

        let score = self.search(key)?.ok_or(CoreError::KeyNotFound { key: *key })?;
        self.cache.put(*key, score);
        Ok(score)
    }

    /// Returns `true` if `key` is currently cached.
    #[must_use]
    pub fn is_cached(&self, key: &Key) -> bool {
        self.cache.contains(key)
    }

    fn search(&self, key: &Key) -> CoreResult<Option<Score>> {
        let (mut lo, mut hi) = (0u64, self.records);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (found, score) = read_record(&*self.backend, self.score_size, mid)?;
            match found.cmp(key) {
                std::cmp::Ordering::Equal => return Ok(Some(score)),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    /// Every persisted mapping in key order.
    pub fn entries(&self) -> CoreResult<Vec<(Key, Score)>> {
        (0..self.records)
            .map(|i| read_record(&*self.backend, self.score_size, i))
            .collect()
    }

    /// Syncs the key log and releases the backend.
    pub fn close(mut self) -> CoreResult<()> {
        self.sync()
    }

    /// Makes every key record written so far durable.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl fmt::Debug for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyIndex")
            .field("records", &self.records)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

fn read_record(
    backend: &dyn StorageBackend,
    score_size: usize,
    index: u64,
) -> CoreResult<(Key, Score)> {
    let record_len = codec::key_record_len(score_size);
    let bytes = backend.read_at(index * record_len as u64, record_len)?;
    codec::decode_key_record(&bytes, score_size)
}
