//! The cumulative word→count tally that survives across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::counting::WordTable;

/// Durable word→count mapping. Keys are stored lowercased; merging only ever adds.
///
/// Serializes as a flat JSON object (`{"word": count, ...}`), sorted by word.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aggregate {
    counts: BTreeMap<String, u64>,
}

impl Aggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(counts: BTreeMap<String, u64>) -> Self {
        Self { counts }
    }

    /// Count for `word` after case folding; 0 when never seen.
    pub fn count(&self, word: &str) -> u64 {
        self.counts.get(&word.to_lowercase()).copied().unwrap_or(0)
    }

    /// Fold a run's merged table into the tally (`self[word] += n`).
    pub fn merge(&mut self, merged: WordTable) {
        for (word, n) in merged {
            let slot = self.counts.entry(word).or_insert(0);
            *slot = slot.saturating_add(n);
        }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_additive_across_runs() {
        let mut agg = Aggregate::new();
        let run: WordTable = [("cat".to_string(), 3), ("dog".to_string(), 1)].into_iter().collect();
        agg.merge(run.clone());
        agg.merge(run);
        assert_eq!(agg.count("cat"), 6);
        assert_eq!(agg.count("DOG"), 2);
        assert_eq!(agg.count("bird"), 0);
    }

    #[test]
    fn merging_an_empty_table_changes_nothing() {
        let mut agg = Aggregate::from_map([("a".to_string(), 1)].into_iter().collect());
        let before = agg.clone();
        agg.merge(WordTable::default());
        assert_eq!(agg, before);
    }

    #[test]
    fn serializes_as_flat_object() {
        let agg = Aggregate::from_map([("b".to_string(), 2), ("a".to_string(), 1)].into_iter().collect());
        assert_eq!(serde_json::to_string(&agg).unwrap(), r#"{"a":1,"b":2}"#);
    }
}
