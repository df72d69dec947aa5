//! Shuffle step: route (word, count) pairs to buckets keyed by the word's first character.
//!
//! The key is derived from the word itself, so one word always lands in one bucket and
//! buckets can be reduced independently without shared state.

use std::collections::BTreeMap;

use crate::counting::WordTable;

/// Pairs grouped by partition key. Ordered so runs are reproducible in logs.
pub type Buckets = BTreeMap<char, Vec<(String, u64)>>;

/// Partition key: the lowercased first character, or `'\0'` for an empty word.
#[inline]
pub fn partition_key(word: &str) -> char {
    word.chars()
        .next()
        .and_then(|c| c.to_lowercase().next())
        .unwrap_or('\0')
}

/// Flatten every per-file table into pairs and group them by partition key.
pub fn shuffle(tables: Vec<WordTable>) -> Buckets {
    let mut buckets = Buckets::new();
    for table in tables {
        for (word, n) in table {
            buckets.entry(partition_key(&word)).or_default().push((word, n));
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::count_words;

    #[test]
    fn groups_pairs_by_first_letter() {
        let b = shuffle(vec![count_words("apple avocado banana"), count_words("Apple cherry")]);
        assert_eq!(b.keys().copied().collect::<Vec<_>>(), vec!['a', 'b', 'c']);

        let mut a: Vec<_> = b[&'a'].clone();
        a.sort();
        assert_eq!(a, vec![("apple".to_string(), 1), ("apple".to_string(), 1), ("avocado".to_string(), 1)]);
    }

    #[test]
    fn key_is_case_folded() {
        assert_eq!(partition_key("Zebra"), 'z');
        assert_eq!(partition_key("Église"), 'é');
        assert_eq!(partition_key(""), '\0');
    }

    #[test]
    fn empty_input_has_no_buckets() {
        assert!(shuffle(Vec::new()).is_empty());
        assert!(shuffle(vec![WordTable::default()]).is_empty());
    }
}
