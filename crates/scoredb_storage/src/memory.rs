//! Logs held in memory.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::ops::Range;
use std::sync::Arc;

/// A log kept in a shared byte vector.
///
/// Every handle made with [`share`](Self::share) points at the same bytes.
/// Recovery tests rely on this: they keep one handle, give another to a
/// store, drop the store, damage the bytes and open a new store over them.
///
/// ```rust
/// use scoredb_storage::{InMemoryBackend, StorageBackend};
///
/// let disk = InMemoryBackend::new();
/// let mut log = disk.share();
/// log.append(b"block").unwrap();
/// assert_eq!(disk.data(), b"block");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A log that already holds `bytes`, as if left behind by an earlier run.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(bytes)),
        }
    }

    /// Another handle onto the same bytes.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
        }
    }

    /// Snapshot of the current contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }

    /// Replaces bytes in place to simulate media corruption.
    ///
    /// # Errors
    ///
    /// [`StorageError::ReadPastEnd`] if the range is not inside the log.
    pub fn overwrite_at(&self, offset: u64, patch: &[u8]) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let range = in_bounds(bytes.len(), offset, patch.len())?;
        bytes[range].copy_from_slice(patch);
        Ok(())
    }

    /// Empties the log.
    pub fn clear(&mut self) {
        self.bytes.write().clear();
    }
}

fn in_bounds(size: usize, offset: u64, len: usize) -> StorageResult<Range<usize>> {
    let out_of_range = || StorageError::ReadPastEnd {
        offset,
        len,
        size: size as u64,
    };
    let start = usize::try_from(offset).map_err(|_| out_of_range())?;
    let end = start.checked_add(len).ok_or_else(out_of_range)?;
    if end > size {
        return Err(out_of_range());
    }
    Ok(start..end)
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.read();
        let range = in_bounds(bytes.len(), offset, len)?;
        Ok(bytes[range].to_vec())
    }

    fn append(&mut self, new_bytes: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.write();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(new_bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::InvalidTruncate { new_size, size });
        }

        // new_size <= len, so it fits in usize
        bytes.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shared_handles_see_each_others_appends() {
        let disk = InMemoryBackend::new();
        let mut writer = disk.share();

        assert_eq!(writer.append(b"data").unwrap(), 0);
        assert_eq!(writer.append(b"log").unwrap(), 4);
        assert_eq!(disk.size().unwrap(), 7);
        assert_eq!(disk.read_at(4, 3).unwrap(), b"log");
    }

    #[test]
    fn reads_outside_the_log_fail() {
        let log = InMemoryBackend::with_data(b"12345".to_vec());

        assert!(log.read_at(5, 0).unwrap().is_empty());
        for (offset, len) in [(3, 5), (10, 1), (u64::MAX, 1)] {
            assert!(matches!(
                log.read_at(offset, len),
                Err(StorageError::ReadPastEnd { size: 5, .. })
            ));
        }
    }

    #[test]
    fn overwrite_flips_bytes_in_place() {
        let disk = InMemoryBackend::with_data(b"payload".to_vec());

        disk.overwrite_at(0, b"P").unwrap();
        assert_eq!(disk.data(), b"Payload");
        assert!(disk.overwrite_at(6, b"xx").is_err());
        assert_eq!(disk.size().unwrap(), 7);
    }

    #[test]
    fn truncate_only_shrinks() {
        let mut log = InMemoryBackend::with_data(b"whole torn".to_vec());

        log.truncate(5).unwrap();
        assert_eq!(log.data(), b"whole");
        assert!(matches!(log.truncate(6), Err(StorageError::InvalidTruncate { size: 5, .. })));

        log.clear();
        assert_eq!(log.size().unwrap(), 0);
    }

    proptest! {
        #[test]
        fn appended_chunks_read_back(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16)) {
            let mut log = InMemoryBackend::new();
            let offsets: Vec<u64> = chunks.iter().map(|c| log.append(c).unwrap()).collect();
            for (chunk, offset) in chunks.iter().zip(offsets) {
                prop_assert_eq!(&log.read_at(offset, chunk.len()).unwrap(), chunk);
            }
        }
    }
}
