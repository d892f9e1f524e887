//! The store façade.
//!
//! A [`Store`] owns one data log and one index. Writes hash the payload,
//! skip content that is already present, and otherwise append a block to
//! the data log before recording its address in the index. Reads resolve
//! the address and refuse to return bytes that no longer hash to the
//! requested score.
//!
//! # Lifecycle
//!
//! ```text
//! Open --close--> Closed --delete--> Deleted
//!   \___________delete_____________/
//! ```
//!
//! Every operation on a closed or deleted store fails with
//! [`CoreError::InvalidState`]; deleting twice is an error, not a no-op.

use crate::codec::BLOCK_HEADER_SIZE;
use crate::config::Config;
use crate::content::{check_payload, ContentStore};
use crate::datalog::{Datalog, ScanSummary, VerifyReport};
use crate::error::{CoreError, CoreResult};
use crate::index::Index;
use crate::keys::KeyIndex;
use crate::layout::StoreLayout;
use crate::score::{Score, ScoreKind};
use parking_lot::{Mutex, RwLock};
use scoredb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Name used for stores that live only in memory.
const IN_MEMORY_NAME: &str = "memory";

/// Size and shape of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of distinct payloads.
    pub entries: usize,
    /// Length of the data log in bytes.
    pub data_bytes: u64,
    /// Length of the index log in bytes.
    pub index_bytes: u64,
}

struct Engine {
    datalog: RwLock<Datalog>,
    index: RwLock<Index>,
}

impl Engine {
    fn close(self) -> CoreResult<()> {
        self.datalog.into_inner().close()?;
        self.index.into_inner().close()
    }
}

enum State {
    Open(Engine),
    Closed,
    Deleted,
}

impl State {
    fn engine(&self) -> CoreResult<&Engine> {
        match self {
            Self::Open(engine) => Ok(engine),
            Self::Closed => Err(CoreError::invalid_state("store is closed")),
            Self::Deleted => Err(CoreError::invalid_state("store has been deleted")),
        }
    }
}

/// A content-addressed, append-only blob store.
///
/// `Store` is `Send + Sync`; share it behind an `Arc`. Writes are
/// serialized by a single writer mutex, reads only take shared locks.
///
/// # Example
///
/// ```rust,ignore
/// use scoredb_core::{Config, Store};
///
/// let store = Store::create(dir, "photos", Config::default())?;
/// let score = store.write(b"brown fox")?;
/// assert_eq!(store.read(&score)?, b"brown fox");
/// store.close()?;
/// ```
pub struct Store {
    name: String,
    layout: Option<StoreLayout>,
    config: Config,
    state: RwLock<State>,
    write_lock: Mutex<()>,
    keys: Mutex<Weak<Mutex<KeyIndex>>>,
    memory_keys: InMemoryBackend,
}

impl Store {
    /// Creates a new, empty store named `name` in `dir`.
    ///
    /// # Errors
    ///
    /// Fails if `<name>.data` already exists, or on I/O errors.
    pub fn create(dir: &Path, name: &str, config: Config) -> CoreResult<Self> {
        fs::create_dir_all(dir)?;
        let layout = StoreLayout::new(dir, name);

        let data = FileBackend::create_new(&layout.data_path())?;
        if config.lock_files {
            data.lock_exclusive()?;
        }

        let mut index = FileBackend::open(&layout.index_path())?;
        if index.size()? > 0 {
            warn!(name, "discarding stale index log left by an earlier store");
            index.truncate(0)?;
        }
        remove_if_exists(&layout.keys_path())?;

        let store = Self::assemble(name, Some(layout), Box::new(data), Box::new(index), config)?;
        info!(name, kind = %store.score_kind(), "created store");
        Ok(store)
    }

    /// Creates a new store with a random 32-character hex name.
    pub fn create_random(dir: &Path, config: Config) -> CoreResult<Self> {
        let name = hex::encode(rand::random::<[u8; 16]>());
        Self::create(dir, &name, config)
    }

    /// Opens an existing store, recovering its index from the data log.
    ///
    /// A missing or empty index is rebuilt by a full scan; an index that
    /// lags behind the data log is caught up from where it ends. A torn
    /// block at the end of the data log is discarded.
    ///
    /// # Errors
    ///
    /// I/O error if `<name>.data` does not exist; [`CoreError::Rebuild`]
    /// if the data log cannot be scanned.
    pub fn open(dir: &Path, name: &str, config: Config) -> CoreResult<Self> {
        let layout = StoreLayout::new(dir, name);

        let data = FileBackend::open_existing(&layout.data_path())?;
        if config.lock_files {
            data.lock_exclusive()?;
        }
        let index = FileBackend::open(&layout.index_path())?;

        let store = Self::assemble(name, Some(layout), Box::new(data), Box::new(index), config)?;
        let entries = store.len()?;
        info!(name, entries, "opened store");
        Ok(store)
    }

    /// Opens a store over caller-supplied backends.
    ///
    /// Recovery runs exactly as for [`Store::open`]. The store has no
    /// files of its own, so [`Store::delete`] only closes it.
    pub fn with_backends(
        name: &str,
        data: Box<dyn StorageBackend>,
        index: Box<dyn StorageBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        Self::assemble(name, None, data, index, config)
    }

    /// Opens a fresh store that lives only in memory.
    pub fn in_memory(config: Config) -> CoreResult<Self> {
        Self::with_backends(
            IN_MEMORY_NAME,
            Box::new(InMemoryBackend::new()),
            Box::new(InMemoryBackend::new()),
            config,
        )
    }

    fn assemble(
        name: &str,
        layout: Option<StoreLayout>,
        data: Box<dyn StorageBackend>,
        index: Box<dyn StorageBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        let kind = config.score_kind;
        let mut datalog = Datalog::open(data, kind, config.sync_on_write);
        let mut index = Index::open(index, kind)?;
        recover(&mut datalog, &mut index, layout.as_ref())?;

        Ok(Self {
            name: name.to_string(),
            layout,
            config,
            state: RwLock::new(State::Open(Engine {
                datalog: RwLock::new(datalog),
                index: RwLock::new(index),
            })),
            write_lock: Mutex::new(()),
            keys: Mutex::new(Weak::new()),
            memory_keys: InMemoryBackend::new(),
        })
    }

    /// Stores `payload` and returns its score.
    ///
    /// If the score is already indexed nothing is written. Otherwise the
    /// block is made durable in the data log before the index record is
    /// appended, so a crash between the two is repaired on the next open.
    pub fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        let state = self.state.read();
        let engine = state.engine()?;
        let score = self.config.score_kind.compute(payload);

        let _writer = self.write_lock.lock();
        if engine.index.read().contains(&score) {
            debug!(score = %score, "content already stored");
            return Ok(score);
        }

        let addr = engine.datalog.write().append(&score, payload)?;
        if let Err(err) = engine.index.write().write(&score, addr) {
            // The writer lock is still held, so the block is the log's tail.
            let block_start = addr.position - (BLOCK_HEADER_SIZE + score.len()) as u64;
            if let Err(discard) = engine.datalog.write().discard_tail(block_start) {
                warn!(score = %score, error = %discard, "unindexed block left in data log");
            }
            return Err(err);
        }

        Ok(score)
    }

    /// Returns the payload stored under `score`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the score was never written;
    /// [`CoreError::ChecksumFailure`] if the stored bytes are corrupt.
    pub fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        let state = self.state.read();
        let engine = state.engine()?;

        let addr = engine
            .index
            .read()
            .read(score)
            .ok_or(CoreError::NotFound { score: *score })?;
        let payload = engine.datalog.read().read(addr)?;

        check_payload(self.config.score_kind, score, payload)
    }

    /// Returns `true` if `score` is stored.
    pub fn contains(&self, score: &Score) -> CoreResult<bool> {
        let state = self.state.read();
        let contains = state.engine()?.index.read().contains(score);
        Ok(contains)
    }

    /// Number of distinct payloads stored.
    pub fn len(&self) -> CoreResult<usize> {
        let state = self.state.read();
        let len = state.engine()?.index.read().len();
        Ok(len)
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every stored score, in no particular order.
    pub fn scores(&self) -> CoreResult<Vec<Score>> {
        let state = self.state.read();
        let scores = state.engine()?.index.read().scores().copied().collect();
        Ok(scores)
    }

    /// Entry count and file sizes.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let state = self.state.read();
        let engine = state.engine()?;
        let data_bytes = engine.datalog.read().cursor()?;
        let index = engine.index.read();

        let stats = StoreStats {
            entries: index.len(),
            data_bytes,
            index_bytes: index.log_size()?,
        };
        Ok(stats)
    }

    /// Re-hashes every block of the data log.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        let state = self.state.read();
        let report = state.engine()?.datalog.read().verify()?;
        if !report.is_ok() {
            warn!(name = %self.name, corrupt = report.corrupt.len(), "data log verification failed");
        }
        Ok(report)
    }

    /// Discards the index and rebuilds it from the data log.
    pub fn rebuild_index(&self) -> CoreResult<ScanSummary> {
        let state = self.state.read();
        let engine = state.engine()?;
        let _writer = self.write_lock.lock();

        let datalog = engine.datalog.read();
        let mut index = engine.index.write();
        index.reset()?;
        let summary = datalog.rebuild_index(&mut index)?;

        info!(name = %self.name, entries = index.len(), bytes = summary.valid_end, "rebuilt index");
        Ok(summary)
    }

    /// Returns the key log of this store.
    ///
    /// A store has at most one live key log. While any returned handle is
    /// alive, later calls hand out the same one, so every writer appends at
    /// the real end of the log. File-backed stores keep it in `<name>.keys`;
    /// in-memory stores keep it for as long as the store lives.
    pub fn open_key_index(&self) -> CoreResult<Arc<Mutex<KeyIndex>>> {
        self.state.read().engine()?;

        let mut live = self.keys.lock();
        if let Some(keys) = live.upgrade() {
            return Ok(keys);
        }

        let backend: Box<dyn StorageBackend> = match &self.layout {
            Some(layout) => Box::new(FileBackend::open(&layout.keys_path())?),
            None => Box::new(self.memory_keys.share()),
        };
        let index = KeyIndex::open(backend, self.config.score_kind, self.config.key_cache_capacity)?;
        let keys = Arc::new(Mutex::new(index));
        *live = Arc::downgrade(&keys);
        Ok(keys)
    }

    /// Syncs both logs and releases their handles.
    ///
    /// Closing a closed store is a no-op. The store can be opened again
    /// with [`Store::open`].
    pub fn close(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Open(engine) => {
                engine.close()?;
                info!(name = %self.name, "closed store");
                Ok(())
            }
            State::Closed => Ok(()),
            State::Deleted => {
                *state = State::Deleted;
                Err(CoreError::invalid_state("store has been deleted"))
            }
        }
    }

    /// Closes the store and removes its files.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::InvalidState`] if the store was already
    /// deleted, or with an I/O error if the data log cannot be removed.
    pub fn delete(&self) -> CoreResult<()> {
        let mut state = self.state.write();
        if matches!(*state, State::Deleted) {
            return Err(CoreError::invalid_state("store has already been deleted"));
        }

        if let State::Open(engine) = std::mem::replace(&mut *state, State::Closed) {
            engine.close()?;
        }

        if let Some(layout) = &self.layout {
            fs::remove_file(layout.data_path())?;
            remove_if_exists(&layout.index_path())?;
            remove_if_exists(&layout.keys_path())?;
        }

        *state = State::Deleted;
        info!(name = %self.name, "deleted store");
        Ok(())
    }

    /// Returns `true` until the store is closed or deleted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(*self.state.read(), State::Open(_))
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File layout, or `None` for stores without files.
    #[must_use]
    pub fn layout(&self) -> Option<&StoreLayout> {
        self.layout.as_ref()
    }

    /// Store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Digest scheme of this store.
    #[must_use]
    pub fn score_kind(&self) -> ScoreKind {
        self.config.score_kind
    }
}

impl ContentStore for Store {
    fn score_kind(&self) -> ScoreKind {
        self.config.score_kind
    }

    fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        Store::read(self, score)
    }

    fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        Store::write(self, payload)
    }

    fn contains(&self, score: &Score) -> CoreResult<bool> {
        Store::contains(self, score)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("kind", &self.config.score_kind)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

/// Brings the index in line with the data log.
///
/// File-backed stores copy whatever follows the last whole block into a
/// `.torn` file before cutting it off. A damaged length field in the middle
/// of the log looks the same as a torn final block, and the copy is all
/// that is left of the blocks behind it.
fn recover(datalog: &mut Datalog, index: &mut Index, layout: Option<&StoreLayout>) -> CoreResult<()> {
    let cursor = datalog.cursor()?;
    if index.covered_end() > cursor {
        warn!(
            covered_end = index.covered_end(),
            cursor, "index points past end of data log, discarding it"
        );
        index.reset()?;
    }

    let summary = if index.is_empty() {
        if cursor > 0 {
            info!(bytes = cursor, "rebuilding index from data log");
        }
        datalog.rebuild_index(index)?
    } else {
        let from = index.covered_end();
        match datalog.replay_into(index, from) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(offset = from, error = %err, "index does not line up with data log, rebuilding");
                index.reset()?;
                datalog.rebuild_index(index)?
            }
        }
    };

    if summary.indexed > 0 {
        info!(entries = index.len(), recovered = summary.indexed, "index caught up with data log");
    }
    if let Some(layout) = layout {
        let tail = datalog.tail(summary.valid_end)?;
        if !tail.is_empty() {
            let path = layout.torn_path(summary.valid_end);
            fs::write(&path, &tail)?;
            warn!(path = %path.display(), bytes = tail.len(), "saved data log tail before discarding it");
        }
    }
    datalog.discard_tail(summary.valid_end)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config() -> Config {
        Config::default().lock_files(false)
    }

    #[test]
    fn in_memory_round_trip() {
        let store = Store::in_memory(config()).unwrap();
        let score = store.write(b"brown fox").unwrap();

        assert_eq!(score.to_hex(), "fdd929ffb0a167ab33e8b1a8905858cf");
        assert_eq!(store.read(&score).unwrap(), b"brown fox");
        assert!(store.contains(&score).unwrap());
    }

    #[test]
    fn write_is_idempotent() {
        let store = Store::in_memory(config()).unwrap();
        let first = store.write(b"same bytes").unwrap();
        let size = store.stats().unwrap().data_bytes;

        let second = store.write(b"same bytes").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.stats().unwrap().data_bytes, size);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn unknown_score_is_not_found() {
        let store = Store::in_memory(config()).unwrap();
        store.write(b"present").unwrap();

        let err = store.read(&ScoreKind::Md5.compute(b"absent")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn empty_payload() {
        let store = Store::in_memory(config()).unwrap();
        let score = store.write(b"").unwrap();

        assert_eq!(score.to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert!(store.read(&score).unwrap().is_empty());
    }

    #[test]
    fn create_refuses_existing_store() {
        let dir = tempdir().unwrap();
        Store::create(dir.path(), "dup", config()).unwrap().close().unwrap();

        assert!(Store::create(dir.path(), "dup", config()).is_err());
    }

    #[test]
    fn open_missing_store_is_io_error() {
        let dir = tempdir().unwrap();
        let err = Store::open(dir.path(), "missing", config()).unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }

    #[test]
    fn create_random_names_are_hex() {
        let dir = tempdir().unwrap();
        let store = Store::create_random(dir.path(), config()).unwrap();

        assert_eq!(store.name().len(), 32);
        assert!(store.name().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(store.layout().unwrap().exists());
    }

    #[test]
    fn reopen_keeps_content() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path(), "s", config()).unwrap();
        let score = store.write(b"durable").unwrap();
        store.close().unwrap();

        let reopened = Store::open(dir.path(), "s", config()).unwrap();
        assert_eq!(reopened.read(&score).unwrap(), b"durable");
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn operations_after_close_fail() {
        let store = Store::in_memory(config()).unwrap();
        let score = store.write(b"x").unwrap();
        store.close().unwrap();

        assert!(!store.is_open());
        assert!(matches!(store.read(&score), Err(CoreError::InvalidState { .. })));
        assert!(matches!(store.write(b"y"), Err(CoreError::InvalidState { .. })));
        store.close().unwrap();
    }

    #[test]
    fn delete_removes_files_once() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path(), "gone", config()).unwrap();
        store.write(b"x").unwrap();
        let layout = store.layout().unwrap().clone();

        store.delete().unwrap();
        assert!(!layout.data_path().exists());
        assert!(!layout.index_path().exists());

        assert!(matches!(store.delete(), Err(CoreError::InvalidState { .. })));
        assert!(matches!(store.close(), Err(CoreError::InvalidState { .. })));
        assert!(matches!(store.len(), Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn delete_after_close() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path(), "closed", config()).unwrap();
        store.close().unwrap();

        store.delete().unwrap();
        assert!(!StoreLayout::new(dir.path(), "closed").exists());
    }

    #[test]
    fn locked_store_cannot_be_opened_twice() {
        let dir = tempdir().unwrap();
        let locking = Config::default();
        let _store = Store::create(dir.path(), "locked", locking.clone()).unwrap();

        let err = Store::open(dir.path(), "locked", locking).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(scoredb_storage::StorageError::Locked { .. })
        ));
    }

    #[test]
    fn same_name_in_different_dirs() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let left = Store::create(a.path(), "twin", config()).unwrap();
        let right = Store::create(b.path(), "twin", config()).unwrap();

        let score = left.write(b"only left").unwrap();
        assert!(left.contains(&score).unwrap());
        assert!(!right.contains(&score).unwrap());
    }

    #[test]
    fn forced_rebuild_matches_index() {
        let store = Store::in_memory(config()).unwrap();
        for word in ["alpha", "bravo", "alpha", "charlie"] {
            store.write(word.as_bytes()).unwrap();
        }

        let summary = store.rebuild_index().unwrap();
        assert_eq!(summary.blocks, 3);
        assert_eq!(summary.indexed, 3);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn stats_track_both_logs() {
        let store = Store::in_memory(config().score_kind(ScoreKind::Xxh64)).unwrap();
        store.write(b"abc").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.data_bytes, 4 + 8 + 3);
        assert_eq!(stats.index_bytes, 8 + 8);
    }

    #[test]
    fn key_index_lives_next_to_store() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path(), "versions", config()).unwrap();
        let score = store.write(b"v1").unwrap();

        let keys = store.open_key_index().unwrap();
        let key = keys.lock().write(&score).unwrap();
        drop(keys);

        assert!(store.layout().unwrap().keys_path().exists());
        let reopened = store.open_key_index().unwrap();
        assert_eq!(reopened.lock().read(&key).unwrap(), score);
    }

    #[test]
    fn live_key_index_is_shared() {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path(), "shared", config()).unwrap();
        let first_score = store.write(b"first").unwrap();
        let second_score = store.write(b"second").unwrap();

        let one = store.open_key_index().unwrap();
        let two = store.open_key_index().unwrap();
        assert!(Arc::ptr_eq(&one, &two));

        let first = one.lock().write(&first_score).unwrap();
        let second = two.lock().write(&second_score).unwrap();
        drop((one, two));

        // A fresh handle reads both records back from the file
        let reopened = store.open_key_index().unwrap();
        let mut keys = reopened.lock();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.read(&first).unwrap(), first_score);
        assert_eq!(keys.read(&second).unwrap(), second_score);
    }

    #[test]
    fn in_memory_key_log_outlives_handles() {
        let store = Store::in_memory(config()).unwrap();
        let score = store.write(b"kept").unwrap();

        let key = store.open_key_index().unwrap().lock().write(&score).unwrap();
        let keys = store.open_key_index().unwrap();
        assert_eq!(keys.lock().read(&key).unwrap(), score);
    }
}
