//! Log files on disk.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An append-only log kept in one file.
///
/// The logical length is cached next to the handle and only moves when an
/// append or truncate succeeds, so readers never see a half-written tail
/// that this process is still producing.
///
/// Reads are positional and take the lock shared; appends, flushes and
/// truncates take it exclusively. `flush` hands buffered bytes to the OS,
/// `sync` waits for them to reach the device.
///
/// ```no_run
/// use scoredb_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut log = FileBackend::create_new(Path::new("photos.data"))?;
/// log.lock_exclusive()?;
/// let offset = log.append(b"block")?;
/// log.sync()?;
/// # Ok::<(), scoredb_storage::StorageError>(())
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    handle: RwLock<Handle>,
}

#[derive(Debug)]
struct Handle {
    file: File,
    len: u64,
}

impl FileBackend {
    /// Opens the log at `path`, creating an empty one if it is missing.
    ///
    /// # Errors
    ///
    /// Any I/O error from opening the file.
    pub fn open(path: &Path) -> StorageResult<Self> {
        Self::with_options(path, OpenOptions::new().create(true).truncate(false))
    }

    /// Opens a log that must already exist.
    ///
    /// # Errors
    ///
    /// An I/O error of kind `NotFound` if there is no file at `path`.
    pub fn open_existing(path: &Path) -> StorageResult<Self> {
        Self::with_options(path, &mut OpenOptions::new())
    }

    /// Creates a log that must not exist yet.
    ///
    /// # Errors
    ///
    /// An I/O error of kind `AlreadyExists` if the file is already there.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        Self::with_options(path, OpenOptions::new().create_new(true))
    }

    fn with_options(path: &Path, options: &mut OpenOptions) -> StorageResult<Self> {
        let file = options.read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            handle: RwLock::new(Handle { file, len }),
        })
    }

    /// Takes an advisory exclusive lock, held until the backend is dropped.
    ///
    /// # Errors
    ///
    /// [`StorageError::Locked`] if another handle already holds it.
    pub fn lock_exclusive(&self) -> StorageResult<()> {
        self.handle
            .read()
            .file
            .try_lock_exclusive()
            .map_err(|_| StorageError::Locked {
                path: self.path.clone(),
            })
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buffer: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt as _;
    file.read_exact_at(buffer, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buffer: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::io::ErrorKind;
    use std::os::windows::fs::FileExt as _;

    while !buffer.is_empty() {
        match file.seek_read(buffer, offset) {
            Ok(0) => return Err(ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buffer = &mut buffer[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let handle = self.handle.read();
        let size = handle.len;
        if offset.saturating_add(len as u64) > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        let mut buffer = vec![0u8; len];
        if len > 0 {
            read_exact_at(&handle.file, &mut buffer, offset)?;
        }
        Ok(buffer)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut handle = self.handle.write();
        let offset = handle.len;
        if bytes.is_empty() {
            return Ok(offset);
        }

        handle.file.seek(SeekFrom::Start(offset))?;
        handle.file.write_all(bytes)?;
        handle.len += bytes.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.handle.write().file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.handle.read().len)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.handle.write().file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut handle = self.handle.write();
        if new_size > handle.len {
            return Err(StorageError::InvalidTruncate {
                new_size,
                size: handle.len,
            });
        }

        handle.file.set_len(new_size)?;
        handle.file.sync_all()?;
        handle.len = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("store.data")
    }

    #[test]
    fn create_new_starts_empty_and_refuses_existing() {
        let dir = tempdir().unwrap();
        let path = log_path(&dir);

        let log = FileBackend::create_new(&path).unwrap();
        assert_eq!(log.size().unwrap(), 0);
        assert_eq!(log.path(), path);

        let again = FileBackend::create_new(&path);
        assert!(matches!(again, Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists));
    }

    #[test]
    fn open_existing_does_not_create() {
        let dir = tempdir().unwrap();
        let path = log_path(&dir);

        assert!(matches!(FileBackend::open_existing(&path), Err(StorageError::Io(_))));
        assert!(!path.exists());
    }

    #[test]
    fn appends_return_block_offsets() {
        let dir = tempdir().unwrap();
        let mut log = FileBackend::open(&log_path(&dir)).unwrap();

        assert_eq!(log.append(b"first block").unwrap(), 0);
        assert_eq!(log.append(b"second").unwrap(), 11);
        assert_eq!(log.size().unwrap(), 17);

        assert_eq!(log.read_at(11, 6).unwrap(), b"second");
        assert_eq!(log.read_at(0, 5).unwrap(), b"first");
    }

    #[test]
    fn reads_stop_at_logical_end() {
        let dir = tempdir().unwrap();
        let mut log = FileBackend::open(&log_path(&dir)).unwrap();
        log.append(b"abc").unwrap();

        assert!(log.read_at(3, 0).unwrap().is_empty());
        assert!(matches!(log.read_at(2, 2), Err(StorageError::ReadPastEnd { size: 3, .. })));
        assert!(matches!(log.read_at(u64::MAX, 1), Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn reopened_log_keeps_synced_bytes() {
        let dir = tempdir().unwrap();
        let path = log_path(&dir);

        let mut log = FileBackend::create_new(&path).unwrap();
        log.append(b"durable").unwrap();
        log.sync().unwrap();
        drop(log);

        let log = FileBackend::open_existing(&path).unwrap();
        assert_eq!(log.size().unwrap(), 7);
        assert_eq!(log.read_at(0, 7).unwrap(), b"durable");
    }

    #[test]
    fn truncate_cuts_torn_tail() {
        let dir = tempdir().unwrap();
        let path = log_path(&dir);
        let mut log = FileBackend::open(&path).unwrap();
        log.append(b"whole").unwrap();
        log.append(b"tor").unwrap();

        log.truncate(5).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5);
        assert_eq!(log.append(b"next").unwrap(), 5);
        assert_eq!(log.read_at(0, 9).unwrap(), b"wholenext");

        assert!(matches!(log.truncate(100), Err(StorageError::InvalidTruncate { size: 9, .. })));
    }

    #[test]
    fn second_lock_is_refused_until_release() {
        let dir = tempdir().unwrap();
        let path = log_path(&dir);

        let owner = FileBackend::open(&path).unwrap();
        owner.lock_exclusive().unwrap();

        let intruder = FileBackend::open(&path).unwrap();
        assert!(matches!(intruder.lock_exclusive(), Err(StorageError::Locked { .. })));

        drop(owner);
        intruder.lock_exclusive().unwrap();
    }
}
