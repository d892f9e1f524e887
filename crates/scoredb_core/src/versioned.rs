//! Versioned access on top of a content store.
//!
//! Content addressing alone cannot express "this slot now holds that
//! content". [`VersionedStore`] hands out a fresh [`Key`] for every write,
//! so two versions with identical bytes get distinct keys but share one
//! stored payload.

use crate::content::ContentStore;
use crate::error::CoreResult;
use crate::keys::{Key, KeyIndex};
use crate::score::Score;
use crate::store::Store;
use parking_lot::Mutex;
use std::sync::Arc;

/// A content store paired with a key log.
pub struct VersionedStore<S> {
    store: S,
    keys: Arc<Mutex<KeyIndex>>,
}

impl VersionedStore<Store> {
    /// Opens the key log that sits next to `store`.
    ///
    /// If the store already has a live key log, it is shared.
    pub fn open(store: Store) -> CoreResult<Self> {
        let keys = store.open_key_index()?;
        Ok(Self::with_shared_keys(store, keys))
    }
}

impl<S: ContentStore> VersionedStore<S> {
    /// Pairs a content store with a key log.
    pub fn new(store: S, keys: KeyIndex) -> Self {
        Self::with_shared_keys(store, Arc::new(Mutex::new(keys)))
    }

    /// Pairs a content store with a key log other holders may also write to.
    pub fn with_shared_keys(store: S, keys: Arc<Mutex<KeyIndex>>) -> Self {
        Self { store, keys }
    }

    /// Stores `payload` under a new key.
    ///
    /// The content is written (or found) first, so a key never points at
    /// a score the store does not hold.
    pub fn write(&self, payload: &[u8]) -> CoreResult<(Key, Score)> {
        let score = self.store.write(payload)?;
        let key = self.keys.lock().write(&score)?;
        Ok((key, score))
    }

    /// Returns the score a key points at.
    pub fn resolve(&self, key: &Key) -> CoreResult<Score> {
        self.keys.lock().read(key)
    }

    /// Returns the payload a key points at.
    pub fn read(&self, key: &Key) -> CoreResult<Vec<u8>> {
        let score = self.resolve(key)?;
        self.store.read(&score)
    }

    /// Number of keys ever minted.
    pub fn versions(&self) -> u64 {
        self.keys.lock().len()
    }

    /// The underlying content store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Closes the key log and hands back the content store.
    ///
    /// A key log still held elsewhere is synced instead of closed.
    pub fn into_store(self) -> CoreResult<S> {
        match Arc::try_unwrap(self.keys) {
            Ok(keys) => keys.into_inner().close()?,
            Err(shared) => shared.lock().sync()?,
        }
        Ok(self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::CoreError;
    use crate::keys::KeyGenerator;
    use tempfile::tempdir;

    #[test]
    fn versions_of_same_content_share_storage() {
        let store = Store::in_memory(Config::default()).unwrap();
        let versioned = VersionedStore::open(store).unwrap();

        let (k1, s1) = versioned.write(b"draft").unwrap();
        let (k2, s2) = versioned.write(b"draft").unwrap();

        assert_ne!(k1, k2);
        assert!(k1 < k2);
        assert_eq!(s1, s2);
        assert_eq!(versioned.store().len().unwrap(), 1);
        assert_eq!(versioned.versions(), 2);
    }

    #[test]
    fn keys_follow_latest_content() {
        let store = Store::in_memory(Config::default()).unwrap();
        let versioned = VersionedStore::open(store).unwrap();

        let (v1, _) = versioned.write(b"first").unwrap();
        let (v2, _) = versioned.write(b"second").unwrap();

        assert_eq!(versioned.read(&v1).unwrap(), b"first");
        assert_eq!(versioned.read(&v2).unwrap(), b"second");
    }

    #[test]
    fn unknown_key() {
        let versioned = VersionedStore::open(Store::in_memory(Config::default()).unwrap()).unwrap();
        let stranger = KeyGenerator::new().next_key();

        assert!(matches!(
            versioned.read(&stranger),
            Err(CoreError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn keys_survive_reopen() {
        let dir = tempdir().unwrap();
        let config = Config::default().lock_files(false);

        let store = Store::create(dir.path(), "docs", config.clone()).unwrap();
        let versioned = VersionedStore::open(store).unwrap();
        let (key, score) = versioned.write(b"kept across restarts").unwrap();
        versioned.into_store().unwrap().close().unwrap();

        let store = Store::open(dir.path(), "docs", config).unwrap();
        let versioned = VersionedStore::open(store).unwrap();
        assert_eq!(versioned.resolve(&key).unwrap(), score);
        assert_eq!(versioned.read(&key).unwrap(), b"kept across restarts");
    }

    #[test]
    fn shared_key_log_keeps_every_writer() {
        let dir = tempdir().unwrap();
        let config = Config::default().lock_files(false);
        let store = Store::create(dir.path(), "docs", config.clone()).unwrap();

        let keys = store.open_key_index().unwrap();
        let side_score = store.write(b"side channel").unwrap();
        let side_key = keys.lock().write(&side_score).unwrap();

        let versioned = VersionedStore::open(store).unwrap();
        let (key, score) = versioned.write(b"main").unwrap();
        assert_eq!(versioned.versions(), 2);

        // The side handle is still live, so the log is synced, not closed
        versioned.into_store().unwrap().close().unwrap();
        drop(keys);

        let versioned = VersionedStore::open(Store::open(dir.path(), "docs", config).unwrap()).unwrap();
        assert_eq!(versioned.resolve(&side_key).unwrap(), side_score);
        assert_eq!(versioned.resolve(&key).unwrap(), score);
    }
}
