//! The byte log every store file sits on.

use crate::error::StorageResult;

/// One log of a store: the data log, the index log or the key log.
///
/// A backend only grows at its end and never rewrites a byte in place.
/// What the bytes mean is up to the log on top of it. The one way to
/// shrink it is [`truncate`](Self::truncate), which a store uses for two
/// things: undoing an append that failed part-way, and cutting a torn
/// block off the end when it reopens after a crash.
///
/// [`size`](Self::size) is the logical end. An append lands exactly there,
/// and a successful truncate moves it back. Reads are positional and never
/// see bytes past it.
///
/// ```rust
/// use scoredb_storage::{InMemoryBackend, StorageBackend};
///
/// let mut log = InMemoryBackend::new();
/// log.append(b"header+payload").unwrap();
/// let end = log.size().unwrap();
///
/// // A write that must not stay gets rolled back to the old end
/// assert_eq!(log.append(b"half").unwrap(), end);
/// log.truncate(end).unwrap();
/// assert_eq!(log.append(b"retry").unwrap(), end);
/// assert_eq!(log.read_at(end, 5).unwrap(), b"retry");
/// assert!(log.read_at(end, 6).is_err());
/// ```
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd) if
    /// the range runs past [`size`](Self::size), or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` at the logical end and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// An I/O error. Part of `data` may then be on disk. Truncating to the
    /// [`size`](Self::size) read before the append removes it.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Hands buffered appends to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// The logical end of the log.
    fn size(&self) -> StorageResult<u64>;

    /// Waits until every append so far would survive a power loss.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the log back to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidTruncate`](crate::StorageError::InvalidTruncate)
    /// if `new_size` is past the end, or an I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
