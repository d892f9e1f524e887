//! Property-based test generators using proptest.

use proptest::prelude::*;
use scoredb_core::ScoreKind;

/// Strategy for arbitrary payloads, including the empty one.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..1024)
}

/// Strategy for batches of payloads with deliberate repeats.
///
/// Draws from a small pool so that duplicates are common.
pub fn repeating_batch_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..32), 1..8).prop_flat_map(|pool| {
        let len = pool.len();
        prop::collection::vec(0..len, 1..64)
            .prop_map(move |picks| picks.into_iter().map(|i| pool[i].clone()).collect())
    })
}

/// Strategy for either digest scheme.
pub fn score_kind_strategy() -> impl Strategy<Value = ScoreKind> {
    prop_oneof![Just(ScoreKind::Md5), Just(ScoreKind::Xxh64)]
}
