//! The content-store seam.

use crate::error::{CoreError, CoreResult};
use crate::score::{Score, ScoreKind};
use std::sync::Arc;

/// A store that addresses payloads by their score.
///
/// Implemented by the file-backed [`Store`](crate::Store), the transactional
/// [`TxnStore`](crate::TxnStore), and by every decorator wrapping one of
/// them, so layers compose without knowing what sits underneath.
pub trait ContentStore: Send + Sync {
    /// Digest scheme used to derive scores.
    fn score_kind(&self) -> ScoreKind;

    /// Returns the payload stored under `score`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] for an unknown score, and
    /// [`CoreError::ChecksumFailure`] if the stored bytes no longer hash
    /// to `score`.
    fn read(&self, score: &Score) -> CoreResult<Vec<u8>>;

    /// Stores a payload and returns its score.
    ///
    /// Idempotent: writing content that is already present returns the
    /// existing score and stores nothing.
    fn write(&self, payload: &[u8]) -> CoreResult<Score>;

    /// Returns `true` if `score` is present.
    fn contains(&self, score: &Score) -> CoreResult<bool>;

    /// The score [`write`](Self::write) would return for `payload`,
    /// without storing anything.
    ///
    /// Layers that transform payloads before storing them must override
    /// this, since the score addresses the stored bytes.
    fn score_for(&self, payload: &[u8]) -> CoreResult<Score> {
        Ok(self.score_kind().compute(payload))
    }
}

impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    fn score_kind(&self) -> ScoreKind {
        (**self).score_kind()
    }

    fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        (**self).read(score)
    }

    fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        (**self).write(payload)
    }

    fn contains(&self, score: &Score) -> CoreResult<bool> {
        (**self).contains(score)
    }

    fn score_for(&self, payload: &[u8]) -> CoreResult<Score> {
        (**self).score_for(payload)
    }
}

/// Passes `payload` through only if it hashes to `expected`.
pub fn check_payload(kind: ScoreKind, expected: &Score, payload: Vec<u8>) -> CoreResult<Vec<u8>> {
    let actual = kind.compute(&payload);
    if actual != *expected {
        return Err(CoreError::ChecksumFailure {
            expected: *expected,
            actual,
        });
    }
    Ok(payload)
}
