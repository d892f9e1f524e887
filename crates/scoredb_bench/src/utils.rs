//! Benchmark utilities.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scoredb_core::{Config, Store};
use tempfile::TempDir;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a word list of `count` words drawn from `vocabulary` distinct words.
///
/// Seeded, so every run writes the same sequence. With `vocabulary < count`
/// the list repeats words, which is what drives deduplication.
pub fn word_list(count: usize, vocabulary: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(0x5C0E);
    let words: Vec<Vec<u8>> = (0..vocabulary.max(1))
        .map(|_| {
            let len = rng.gen_range(3..12);
            (&mut rng).sample_iter(&Alphanumeric).take(len).collect()
        })
        .collect();

    (0..count)
        .map(|_| words[rng.gen_range(0..words.len())].clone())
        .collect()
}

/// A file-backed store in a fresh temporary directory.
///
/// Syncing is off so the numbers measure the store, not the disk.
pub fn temp_store(config: Config) -> (TempDir, Store) {
    let dir = TempDir::new().unwrap();
    let store = Store::create(dir.path(), "bench", config.sync_on_write(false).lock_files(false)).unwrap();
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn word_list_is_deterministic_and_bounded() {
        let a = word_list(500, 20);
        let b = word_list(500, 20);
        assert_eq!(a, b);
        assert!(a.iter().collect::<HashSet<_>>().len() <= 20);
    }
}
