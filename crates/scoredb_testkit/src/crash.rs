//! Crash injection for storage backends.
//!
//! [`CrashableBackend`] wraps a real backend and fails on command: an
//! append can be cut short after a byte budget (leaving a partial write
//! behind, as a power loss would), and flush/sync can be made to fail.
//! The paired [`CrashControl`] stays with the test after the backend has
//! been boxed into a store.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let disk = InMemoryBackend::new();
//! let (backend, control) = CrashableBackend::new(Box::new(disk.share()));
//! let store = Store::with_backends("s", Box::new(backend), index, config)?;
//!
//! control.crash_after(10);
//! assert!(store.write(b"does not fit").is_err());
//! ```

use scoredb_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct CrashState {
    budget: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

/// Test-side handle for a [`CrashableBackend`].
#[derive(Debug, Clone)]
pub struct CrashControl {
    state: Arc<CrashState>,
}

impl CrashControl {
    /// Lets only `bytes` more bytes through before appends fail.
    pub fn crash_after(&self, bytes: usize) {
        self.state.budget.store(bytes, Ordering::SeqCst);
    }

    /// Sets whether flush and sync should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.state.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Restores normal operation.
    pub fn reset(&self) {
        self.state.budget.store(usize::MAX, Ordering::SeqCst);
        self.state.crashed.store(false, Ordering::SeqCst);
        self.state.fail_on_flush.store(false, Ordering::SeqCst);
    }

    /// Returns whether a simulated crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<CrashState>,
}

impl CrashableBackend {
    /// Wraps `inner`, returning the backend and its control handle.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, CrashControl) {
        let state = Arc::new(CrashState {
            budget: AtomicUsize::new(usize::MAX),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        });
        let control = CrashControl {
            state: Arc::clone(&state),
        };
        (Self { inner, state }, control)
    }

    fn crash(&self, message: &str) -> StorageError {
        self.state.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(io::Error::other(message.to_string()))
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let budget = self.state.budget.load(Ordering::SeqCst);
        if bytes.len() <= budget {
            if budget != usize::MAX {
                self.state.budget.store(budget - bytes.len(), Ordering::SeqCst);
            }
            return self.inner.append(bytes);
        }

        // Write what fits, then fail
        self.state.budget.store(0, Ordering::SeqCst);
        if budget > 0 {
            let _ = self.inner.append(&bytes[..budget]);
        }
        Err(self.crash("simulated crash during append"))
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.state.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.crash("simulated crash during flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.state.fail_on_flush.load(Ordering::SeqCst) {
            return Err(self.crash("simulated crash during sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}
