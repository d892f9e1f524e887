//! On-disk layout of a named store.
//!
//! ```text
//! <dir>/
//! ├─ <name>.data       # Data log (source of truth)
//! ├─ <name>.idx        # Index log (rebuildable)
//! ├─ <name>.keys       # Key log (only when key indirection is used)
//! └─ <name>.data.<offset>.torn   # Bytes cut from the data log on recovery
//! ```
//!
//! Stores with the same name in different directories never interfere.

use std::path::{Path, PathBuf};

const DATA_EXT: &str = "data";
const INDEX_EXT: &str = "idx";
const KEYS_EXT: &str = "keys";
const TORN_EXT: &str = "torn";

/// Paths of the files that make up one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    dir: PathBuf,
    name: String,
}

impl StoreLayout {
    /// Creates the layout for store `name` inside `dir`.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Directory holding the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the data log.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.file(DATA_EXT)
    }

    /// Path of the index log.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.file(INDEX_EXT)
    }

    /// Path of the key log.
    #[must_use]
    pub fn keys_path(&self) -> PathBuf {
        self.file(KEYS_EXT)
    }

    /// Path that keeps the bytes recovery cut from the data log at `offset`.
    #[must_use]
    pub fn torn_path(&self, offset: u64) -> PathBuf {
        self.file(&format!("{DATA_EXT}.{offset}.{TORN_EXT}"))
    }

    /// Returns `true` if the data log exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.data_path().is_file()
    }

    fn file(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_names() {
        let layout = StoreLayout::new("/var/lib/blobs", "photos");

        assert_eq!(layout.data_path(), Path::new("/var/lib/blobs/photos.data"));
        assert_eq!(layout.index_path(), Path::new("/var/lib/blobs/photos.idx"));
        assert_eq!(layout.keys_path(), Path::new("/var/lib/blobs/photos.keys"));
        assert_eq!(layout.torn_path(42), Path::new("/var/lib/blobs/photos.data.42.torn"));
    }

    #[test]
    fn exists_tracks_data_log() {
        let dir = tempdir().unwrap();
        let layout = StoreLayout::new(dir.path(), "s");
        assert!(!layout.exists());

        std::fs::write(layout.index_path(), b"").unwrap();
        assert!(!layout.exists());

        std::fs::write(layout.data_path(), b"").unwrap();
        assert!(layout.exists());
    }
}
