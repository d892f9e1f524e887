//! Content store over a transactional key-value engine.
//!
//! The engine replaces the two files of a [`Store`](crate::Store). It only
//! has to offer `read`, `exists` and `write` inside an atomic transaction;
//! running the duplicate check and the write in one transaction is what
//! keeps at most one copy of each payload.
//!
//! ## Key Layout
//!
//! ```text
//! <name>/d/<score bytes>   -> payload
//! <name>/deleted           -> tombstone
//! ```

use crate::content::{check_payload, ContentStore};
use crate::error::{CoreError, CoreResult};
use crate::score::{Score, ScoreKind};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Operations available inside one transaction.
pub trait Transaction {
    /// Reads a value, or `None` if the key is absent.
    fn read(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>>;

    /// Returns `true` if the key is present.
    fn exists(&self, key: &[u8]) -> CoreResult<bool>;

    /// Writes a value, visible to others only once the transaction commits.
    fn write(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()>;
}

/// A key-value engine with atomic transactions.
pub trait TransactionalEngine: Send + Sync {
    /// Runs `f` in a read-only transaction.
    fn view<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&dyn Transaction) -> CoreResult<T>;

    /// Runs `f` in a read-write transaction.
    ///
    /// Writes commit atomically if `f` returns `Ok` and are discarded
    /// otherwise. Update transactions are serializable.
    fn update<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> CoreResult<T>;
}

/// In-process engine: a sorted map with a single writer.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

struct MemoryTxn<'a> {
    committed: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Transaction for MemoryTxn<'_> {
    fn read(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        let value = self.pending.get(key).or_else(|| self.committed.get(key));
        Ok(value.cloned())
    }

    fn exists(&self, key: &[u8]) -> CoreResult<bool> {
        Ok(self.pending.contains_key(key) || self.committed.contains_key(key))
    }

    fn write(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.pending.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl TransactionalEngine for MemoryEngine {
    fn view<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&dyn Transaction) -> CoreResult<T>,
    {
        let data = self.data.read();
        let txn = MemoryTxn {
            committed: &data,
            pending: BTreeMap::new(),
        };
        f(&txn)
    }

    fn update<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> CoreResult<T>,
    {
        let mut data = self.data.write();
        let mut txn = MemoryTxn {
            committed: &data,
            pending: BTreeMap::new(),
        };
        let value = f(&mut txn)?;

        let pending = txn.pending;
        data.extend(pending);
        Ok(value)
    }
}

const DATA_PREFIX: &[u8] = b"/d/";
const TOMBSTONE_SUFFIX: &[u8] = b"/deleted";

/// A named content store inside a transactional engine.
///
/// Several stores can share one engine; each lives under its own name
/// prefix.
pub struct TxnStore<E> {
    engine: Arc<E>,
    name: String,
    kind: ScoreKind,
    deleted: RwLock<bool>,
}

impl<E: TransactionalEngine> TxnStore<E> {
    /// Opens the store `name` inside `engine`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidState`] if the store was deleted.
    pub fn open(engine: Arc<E>, name: &str, kind: ScoreKind) -> CoreResult<Self> {
        let store = Self {
            engine,
            name: name.to_string(),
            kind,
            deleted: RwLock::new(false),
        };

        let tombstone = store.tombstone_key();
        if store.engine.view(|txn| txn.exists(&tombstone))? {
            return Err(CoreError::invalid_state(format!("store {name} has been deleted")));
        }
        Ok(store)
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine backing this store.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    fn data_key(&self, score: &Score) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.name.len() + DATA_PREFIX.len() + score.len());
        key.extend_from_slice(self.name.as_bytes());
        key.extend_from_slice(DATA_PREFIX);
        key.extend_from_slice(score.as_bytes());
        key
    }

    fn tombstone_key(&self) -> Vec<u8> {
        let mut key = self.name.as_bytes().to_vec();
        key.extend_from_slice(TOMBSTONE_SUFFIX);
        key
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if *self.deleted.read() {
            return Err(CoreError::invalid_state("store has been deleted"));
        }
        Ok(())
    }

    /// Stores `payload`; the duplicate check and the write share one
    /// transaction.
    pub fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        self.ensure_live()?;
        let score = self.kind.compute(payload);
        let key = self.data_key(&score);
        let tombstone = self.tombstone_key();

        let stored = self.engine.update(|txn| {
            if txn.exists(&tombstone)? {
                return Err(CoreError::invalid_state("store has been deleted"));
            }
            if txn.exists(&key)? {
                return Ok(false);
            }
            txn.write(&key, payload)?;
            Ok(true)
        })?;

        if !stored {
            debug!(score = %score, "content already stored");
        }
        Ok(score)
    }

    /// Returns the payload stored under `score`.
    pub fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        self.ensure_live()?;
        let key = self.data_key(score);

        let payload = self
            .engine
            .view(|txn| txn.read(&key))?
            .ok_or(CoreError::NotFound { score: *score })?;
        check_payload(self.kind, score, payload)
    }

    /// Returns `true` if `score` is stored.
    pub fn contains(&self, score: &Score) -> CoreResult<bool> {
        self.ensure_live()?;
        let key = self.data_key(score);
        self.engine.view(|txn| txn.exists(&key))
    }

    /// Marks the store deleted.
    ///
    /// The engine contract has no removal, so payloads stay in the engine
    /// but become unreachable through any handle.
    pub fn delete(&self) -> CoreResult<()> {
        let mut deleted = self.deleted.write();
        if *deleted {
            return Err(CoreError::invalid_state("store has already been deleted"));
        }

        let tombstone = self.tombstone_key();
        self.engine.update(|txn| {
            if txn.exists(&tombstone)? {
                return Err(CoreError::invalid_state("store has already been deleted"));
            }
            txn.write(&tombstone, &[1])
        })?;

        *deleted = true;
        info!(name = %self.name, "deleted store");
        Ok(())
    }
}

impl<E: TransactionalEngine> ContentStore for TxnStore<E> {
    fn score_kind(&self) -> ScoreKind {
        self.kind
    }

    fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        TxnStore::read(self, score)
    }

    fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        TxnStore::write(self, payload)
    }

    fn contains(&self, score: &Score) -> CoreResult<bool> {
        TxnStore::contains(self, score)
    }
}

impl<E> std::fmt::Debug for TxnStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnStore")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
