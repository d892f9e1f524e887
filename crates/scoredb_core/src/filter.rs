//! Probabilistic existence filter.
//!
//! [`FilteredStore`] keeps a [`BloomFilter`] of every score it has seen so
//! that `contains` can answer "absent" without touching the index. The
//! filter never affects addressing or recovery: it is rebuilt from the
//! store's scores whenever the decorator is constructed.
//!
//! ## Theory
//!
//! For `n` expected items and a target false positive rate `p`:
//! - bits `m = -n ln(p) / (ln 2)^2`
//! - hashes `k = (m / n) ln 2`
//!
//! Bit positions use double hashing, `h_i = h1 + i * h2 mod m`, with `h1`
//! and `h2` taken from two seeded XXH64 passes over the score bytes.

use crate::content::ContentStore;
use crate::error::CoreResult;
use crate::score::{Score, ScoreKind};
use crate::store::Store;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use xxhash_rust::xxh64::xxh64;

/// False positive rate targeted by [`BloomFilter::with_capacity`].
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

const MIN_BITS: u64 = 64;
const MAX_HASHES: u32 = 16;
const SECOND_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// A Bloom filter over byte strings.
///
/// A negative answer is always correct; a positive one may be false.
#[derive(Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    items: u64,
}

impl BloomFilter {
    /// Sizes a filter for `capacity` items at a 1% false positive rate.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_rate(capacity, DEFAULT_FALSE_POSITIVE_RATE)
    }

    /// Sizes a filter for `capacity` items at false positive rate `rate`.
    #[must_use]
    pub fn with_rate(capacity: usize, rate: f64) -> Self {
        let n = capacity.max(1) as f64;
        let rate = rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let num_bits = ((-n * rate.ln()) / (ln2 * ln2)).ceil().max(MIN_BITS as f64) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().clamp(1.0, f64::from(MAX_HASHES)) as u32;
        let words = num_bits.div_ceil(64) as usize;

        Self {
            bits: vec![0; words],
            num_bits,
            num_hashes,
            items: 0,
        }
    }

    /// Inserts a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let bit = self.bit_index(h1, h2, i);
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.items += 1;
    }

    /// Returns `false` if the key is definitely absent.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(h1, h2, i);
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    /// Number of insertions so far.
    #[must_use]
    pub fn items(&self) -> u64 {
        self.items
    }

    /// Size of the bit array.
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of hash functions.
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns `true` if nothing was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits
    }
}

fn hash_pair(key: &[u8]) -> (u64, u64) {
    // h2 must be odd so successive bit positions never collapse onto one bit
    (xxh64(key, 0), xxh64(key, SECOND_SEED) | 1)
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set_bits: u32 = self.bits.iter().map(|w| w.count_ones()).sum();
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .field("items", &self.items)
            .field("set_bits", &set_bits)
            .finish()
    }
}

/// Counters describing how often the filter saved a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// `contains` calls answered by the filter alone.
    pub negatives: u64,
    /// Filter positives the store did not confirm.
    pub false_positives: u64,
}

/// Content store decorator with a Bloom filter in front of `contains`.
///
/// Must be the only writer of the wrapped store: writes that bypass it
/// are invisible to the filter.
pub struct FilteredStore<S> {
    inner: S,
    filter: RwLock<BloomFilter>,
    negatives: AtomicU64,
    false_positives: AtomicU64,
}

impl FilteredStore<Store> {
    /// Wraps a store, seeding the filter with its current scores.
    ///
    /// Sized for the larger of `filter_capacity` and the current entry count.
    pub fn open(store: Store) -> CoreResult<Self> {
        let scores = store.scores()?;
        let capacity = store.config().filter_capacity.max(scores.len() * 2);
        Ok(Self::with_scores(store, scores, capacity))
    }
}

impl<S: ContentStore> FilteredStore<S> {
    /// Wraps `inner` with an empty filter.
    pub fn new(inner: S, capacity: usize) -> Self {
        Self::with_scores(inner, std::iter::empty(), capacity)
    }

    /// Wraps `inner`, inserting `scores` into the filter.
    pub fn with_scores(inner: S, scores: impl IntoIterator<Item = Score>, capacity: usize) -> Self {
        let mut filter = BloomFilter::with_capacity(capacity);
        for score in scores {
            filter.insert(score.as_bytes());
        }

        Self {
            inner,
            filter: RwLock::new(filter),
            negatives: AtomicU64::new(0),
            false_positives: AtomicU64::new(0),
        }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the decorator.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Filter hit counters.
    pub fn stats(&self) -> FilterStats {
        FilterStats {
            negatives: self.negatives.load(Ordering::Relaxed),
            false_positives: self.false_positives.load(Ordering::Relaxed),
        }
    }

    fn confirm(&self, score: &Score) -> CoreResult<bool> {
        let present = self.inner.contains(score)?;
        if !present {
            self.false_positives.fetch_add(1, Ordering::Relaxed);
        }
        Ok(present)
    }
}

impl<S: ContentStore> ContentStore for FilteredStore<S> {
    fn score_kind(&self) -> ScoreKind {
        self.inner.score_kind()
    }

    fn read(&self, score: &Score) -> CoreResult<Vec<u8>> {
        self.inner.read(score)
    }

    fn write(&self, payload: &[u8]) -> CoreResult<Score> {
        let expected = self.inner.score_for(payload)?;
        if self.filter.read().may_contain(expected.as_bytes()) && self.confirm(&expected)? {
            return Ok(expected);
        }

        let score = self.inner.write(payload)?;
        self.filter.write().insert(score.as_bytes());
        Ok(score)
    }

    fn contains(&self, score: &Score) -> CoreResult<bool> {
        if !self.filter.read().may_contain(score.as_bytes()) {
            self.negatives.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }
        self.confirm(score)
    }
    fn score_for(&self, payload: &[u8]) -> CoreResult<Score> {
        self.inner.score_for(payload)
    }
}

impl<S> std::fmt::Debug for FilteredStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteredStore")
            .field("filter", &*self.filter.read())
            .finish_non_exhaustive()
    }
}
