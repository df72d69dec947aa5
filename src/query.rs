//! Query engine: case-insensitive point lookups against the tally.

use std::collections::HashSet;
use std::fmt::Write;

use crate::aggregate::Aggregate;

/// Count for `word` (case-folded), 0 if it was never indexed. Never fails.
#[inline]
pub fn lookup(aggregate: &Aggregate, word: &str) -> u64 {
    aggregate.count(word)
}

/// Look up every word in query order. Keys are the words exactly as given; a word
/// queried twice is reported once, at its first position.
pub fn query_counts<S: AsRef<str>>(aggregate: &Aggregate, words: &[S]) -> Vec<(String, u64)> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(words.len());
    let mut out: Vec<(String, u64)> = Vec::with_capacity(words.len());
    for word in words {
        let word = word.as_ref();
        if !seen.insert(word) {
            continue;
        }
        tracing::debug!("querying count for {:?}", word);
        out.push((word.to_string(), lookup(aggregate, word)));
    }
    out
}

/// Render counts as `"<word>" count: <n>` lines, one per word.
pub fn render_counts(counts: &[(String, u64)]) -> String {
    let mut s = String::new();
    for (word, n) in counts {
        let _ = writeln!(s, "{word:?} count: {n}");
    }
    s
}
