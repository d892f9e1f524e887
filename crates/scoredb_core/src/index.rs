//! Score to address index.
//!
//! The index is an in-memory hash map mirrored by an append-only log of
//! fixed-width records. Entries are never updated or removed in place;
//! the log only grows, and can always be recomputed from the data log.

use crate::codec::{self, Addr};
use crate::error::CoreResult;
use crate::score::{Score, ScoreKind};
use scoredb_storage::StorageBackend;
use std::collections::HashMap;
use tracing::{debug, warn};

/// In-memory `Score -> Addr` map backed by an index log.
pub struct Index {
    backend: Box<dyn StorageBackend>,
    kind: ScoreKind,
    entries: HashMap<Score, Addr>,
    covered_end: u64,
}

impl Index {
    /// Loads every record of the index log into memory.
    ///
    /// A torn trailing record is truncated away. An empty log yields an
    /// empty index, which the store treats as a signal to rebuild.
    pub fn open(mut backend: Box<dyn StorageBackend>, kind: ScoreKind) -> CoreResult<Self> {
        let record_len = codec::index_record_len(kind.size());

        let size = backend.size()?;
        let whole = size - size % record_len as u64;
        if whole < size {
            warn!(bytes = size - whole, "discarding torn record at end of index log");
            backend.truncate(whole)?;
        }

        let mut index = Self {
            backend,
            kind,
            entries: HashMap::new(),
            covered_end: 0,
        };

        if whole > 0 {
            let len = usize::try_from(whole)
                .map_err(|_| crate::CoreError::corruption("index log too large to load"))?;
            let raw = index.backend.read_at(0, len)?;
            for record in raw.chunks_exact(record_len) {
                let (score, addr) = codec::decode_index_record(record, kind.size())?;
                index.insert(score, addr);
            }
        }

        Ok(index)
    }

    fn insert(&mut self, score: Score, addr: Addr) -> bool {
        if self.entries.contains_key(&score) {
            return false;
        }
        self.entries.insert(score, addr);
        self.covered_end = self.covered_end.max(addr.end());
        true
    }

    /// Looks up the address of a score.
    #[must_use]
    pub fn read(&self, score: &Score) -> Option<Addr> {
        self.entries.get(score).copied()
    }

    /// Returns `true` if the score has an entry.
    #[must_use]
    pub fn contains(&self, score: &Score) -> bool {
        self.entries.contains_key(score)
    }

    /// Records a new entry, persisting it before it becomes visible.
    ///
    /// Returns `false` without touching the log if the score already has an
    /// entry. On failure the index log is rolled back and the map is left
    /// unchanged.
    pub fn write(&mut self, score: &Score, addr: Addr) -> CoreResult<bool> {
        if self.entries.contains_key(score) {
            return Ok(false);
        }

        let record = codec::encode_index_record(score, addr)?;
        let start = self.backend.size()?;
        if let Err(err) = self.append(&record) {
            if let Err(rollback) = self.backend.truncate(start) {
                warn!(offset = start, error = %rollback, "failed to roll back index record");
            }
            return Err(err);
        }

        debug!(score = %score, position = addr.position, "indexed");
        Ok(self.insert(*score, addr))
    }

    fn append(&mut self, record: &[u8]) -> CoreResult<()> {
        self.backend.append(record)?;
        self.backend.flush()?;
        Ok(())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// End offset of the furthest payload the index knows about.
    ///
    /// Blocks are indexed in write order, so every block of the data log
    /// starting at or after this offset is missing from the index.
    #[must_use]
    pub fn covered_end(&self) -> u64 {
        self.covered_end
    }

    /// Digest scheme of the indexed scores.
    #[must_use]
    pub fn score_kind(&self) -> ScoreKind {
        self.kind
    }

    /// Iterates over the indexed scores in no particular order.
    pub fn scores(&self) -> impl Iterator<Item = &Score> + '_ {
        self.entries.keys()
    }

    /// Size of the index log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Discards every entry, in memory and on disk.
    pub fn reset(&mut self) -> CoreResult<()> {
        self.backend.truncate(0)?;
        self.entries.clear();
        self.covered_end = 0;
        Ok(())
    }

    /// Syncs the index log and releases it.
    pub fn close(mut self) -> CoreResult<()> {
        self.backend.sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("kind", &self.kind)
            .field("entries", &self.entries.len())
            .field("covered_end", &self.covered_end)
            .finish_non_exhaustive()
    }
}
