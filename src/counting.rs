//! Reducers: additive folds over word→count tables, per partition and across partitions.

use ahash::AHashMap;
use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::partition::Buckets;

/// Ephemeral word→count table (per file, per partition, or merged for one run).
pub type WordTable = AHashMap<String, u64>;

#[inline]
pub fn add_count(table: &mut WordTable, word: String, n: u64) {
    let slot = table.entry(word).or_insert(0);
    *slot = slot.saturating_add(n);
}

/// Fold one partition's pairs into a partition-local table.
pub fn reduce_bucket(pairs: Vec<(String, u64)>) -> WordTable {
    let mut table = WordTable::with_capacity(pairs.len());
    for (word, n) in pairs {
        add_count(&mut table, word, n);
    }
    table
}

/// Reduce every partition independently. Runs on the current rayon pool; callers pick
/// the pool with `ThreadPool::install`.
pub fn reduce_partitions(buckets: Buckets) -> Vec<WordTable> {
    reduce_partitions_with_progress(buckets, None)
}

/// `reduce_partitions`, ticking `pb` once per finished partition.
pub fn reduce_partitions_with_progress(buckets: Buckets, pb: Option<&ProgressBar>) -> Vec<WordTable> {
    buckets
        .into_par_iter()
        .map(|(_, pairs)| {
            let table = reduce_bucket(pairs);
            if let Some(pb) = pb { pb.inc(1); }
            table
        })
        .collect()
}

/// Union partition tables into one. Partitions should be disjoint; a word seen in two
/// of them is still added, not overwritten.
pub fn union_tables(parts: Vec<WordTable>) -> WordTable {
    let mut merged = WordTable::with_capacity(parts.iter().map(|t| t.len()).sum());
    for part in parts {
        for (word, n) in part {
            if let Some(slot) = merged.get_mut(&word) {
                tracing::warn!("word {:?} appeared in more than one partition; adding counts", word);
                *slot = slot.saturating_add(n);
            } else {
                merged.insert(word, n);
            }
        }
    }
    merged
}

/// Fold `part` into `total` additively.
pub fn merge_counts(total: &mut WordTable, part: WordTable) {
    for (word, n) in part {
        add_count(total, word, n);
    }
}

/// Single-threaded reference reduce over the same per-file tables.
pub fn reduce_sequential(tables: &[WordTable]) -> WordTable {
    let mut total = WordTable::default();
    for t in tables {
        merge_counts(&mut total, t.clone());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::count_words;
    use crate::partition::shuffle;
    use std::collections::BTreeMap;

    fn sorted(t: WordTable) -> BTreeMap<String, u64> {
        t.into_iter().collect()
    }

    #[test]
    fn partitioned_reduce_matches_sequential_reduce() {
        let tables = vec![
            count_words("the quick brown fox jumps over the lazy dog"),
            count_words("The dog barks; the fox runs. Quick!"),
            count_words(""),
            count_words("zebra Zulu apple Apple apricot"),
        ];
        let expected = sorted(reduce_sequential(&tables));
        let parallel = sorted(union_tables(reduce_partitions(shuffle(tables))));
        assert_eq!(parallel, expected);
        assert_eq!(expected.get("the"), Some(&4));
        assert_eq!(expected.get("apple"), Some(&2));
    }

    #[test]
    fn reduce_ticks_progress_once_per_partition() {
        let buckets = shuffle(vec![count_words("ant bee cat cow dog"), count_words("Ant emu")]);
        let n = buckets.len() as u64;
        assert_eq!(n, 5);
        let pb = ProgressBar::hidden();
        pb.set_length(n);
        let parts = reduce_partitions_with_progress(buckets, Some(&pb));
        assert_eq!(parts.len() as u64, n);
        assert_eq!(pb.position(), n);
    }

    #[test]
    fn union_adds_on_collision() {
        let a: WordTable = [("x".to_string(), 2)].into_iter().collect();
        let b: WordTable = [("x".to_string(), 5), ("y".to_string(), 1)].into_iter().collect();
        let u = sorted(union_tables(vec![a, b]));
        assert_eq!(u.get("x"), Some(&7));
        assert_eq!(u.get("y"), Some(&1));
    }

    #[test]
    fn reduce_bucket_sums_repeated_words() {
        let t = reduce_bucket(vec![("a".into(), 1), ("ab".into(), 2), ("a".into(), 3)]);
        assert_eq!(t.get("a"), Some(&4));
        assert_eq!(t.get("ab"), Some(&2));
    }

    #[test]
    fn counts_saturate_instead_of_overflowing() {
        let mut t = WordTable::default();
        add_count(&mut t, "w".into(), u64::MAX);
        add_count(&mut t, "w".into(), 1);
        assert_eq!(t.get("w"), Some(&u64::MAX));
    }
}
