//! Property tests for the store contract.

use proptest::prelude::*;
use scoredb_core::{Config, CoreError, Store};
use scoredb_testkit::prelude::*;
use std::collections::HashSet;

fn config(kind: scoredb_core::ScoreKind) -> Config {
    test_config().score_kind(kind)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn read_returns_what_was_written(kind in score_kind_strategy(), payload in payload_strategy()) {
        let store = Store::in_memory(config(kind)).unwrap();
        let score = store.write(&payload).unwrap();

        prop_assert_eq!(score.len(), kind.size());
        prop_assert_eq!(store.read(&score).unwrap(), payload);
    }

    #[test]
    fn second_write_changes_nothing(kind in score_kind_strategy(), payload in payload_strategy()) {
        let store = Store::in_memory(config(kind)).unwrap();
        let first = store.write(&payload).unwrap();
        let size = store.stats().unwrap().data_bytes;

        let second = store.write(&payload).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(store.stats().unwrap().data_bytes, size);
    }

    #[test]
    fn unwritten_scores_are_not_found(written in payload_strategy(), other in payload_strategy()) {
        prop_assume!(written != other);
        let store = Store::in_memory(test_config()).unwrap();
        store.write(&written).unwrap();

        let other_score = store.score_kind().compute(&other);
        let is_not_found = matches!(store.read(&other_score), Err(CoreError::NotFound { .. }));
        prop_assert!(is_not_found);
    }

    #[test]
    fn entry_count_equals_distinct_payloads(batch in repeating_batch_strategy()) {
        let disk = MemoryDisk::new();
        let store = disk.open(test_config());
        for payload in &batch {
            store.write(payload).unwrap();
        }
        let distinct = batch.iter().collect::<HashSet<_>>().len();
        prop_assert_eq!(store.len().unwrap(), distinct);
        drop(store);

        disk.lose_index();
        let rebuilt = disk.reopen(test_config());
        prop_assert_eq!(rebuilt.len().unwrap(), distinct);
        for payload in &batch {
            let score = rebuilt.score_kind().compute(payload);
            prop_assert_eq!(&rebuilt.read(&score).unwrap(), payload);
        }
    }
}
