//! Map step: one file in, one independent word→count table out.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::concurrency::ReaderPool;
use crate::counting::{add_count, WordTable};
use crate::text_reader::read_text;

/// Any run of non-letters separates words. Digits and `_` are separators too.
fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}]+").expect("separator regex is valid"))
}

/// Split `text` into lowercase tokens (maximal runs of letters).
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    separators()
        .split(text)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// Count the tokens of `text` into a fresh table.
pub fn count_words(text: &str) -> WordTable {
    let mut table = WordTable::default();
    for word in tokenize(text) {
        add_count(&mut table, word, 1);
    }
    table
}

/// Per-call settings for the mapper. With `readers` set, reads run on that pool
/// under its deadline.
#[derive(Clone, Copy)]
pub struct MapCfg<'a> {
    pub read_buffer_bytes: usize,
    pub readers: Option<&'a ReaderPool>,
}

/// Result of mapping one file. A failed file carries an empty table and the error text.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub table: WordTable,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Read and count one file. Never fails: read or decode errors are logged and turned
/// into an empty table so the rest of the run continues.
pub fn map_file(path: &Path, cfg: MapCfg<'_>) -> FileOutcome {
    tracing::debug!("counting words in {}", path.display());
    let text = match cfg.readers {
        Some(readers) => readers.read_text(path, cfg.read_buffer_bytes),
        None => read_text(path, cfg.read_buffer_bytes),
    };
    match text {
        Ok(text) => FileOutcome { path: path.to_path_buf(), table: count_words(&text), error: None },
        Err(e) => {
            tracing::warn!("error counting words in {}; skipping file: {:#}", path.display(), e);
            FileOutcome { path: path.to_path_buf(), table: WordTable::default(), error: Some(format!("{e:#}")) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sorted(t: WordTable) -> BTreeMap<String, u64> {
        t.into_iter().collect()
    }

    #[test]
    fn punctuation_digits_and_underscores_separate_words() {
        let got: Vec<String> = tokenize("don't stop-now 123_abc").collect();
        assert_eq!(got, vec!["don", "t", "stop", "now", "abc"]);
    }

    #[test]
    fn leading_and_trailing_separators_make_no_empty_tokens() {
        let got: Vec<String> = tokenize("  ...42 hi!  ").collect();
        assert_eq!(got, vec!["hi"]);
        assert_eq!(tokenize("").count(), 0);
        assert_eq!(tokenize("1234 _ -- !!").count(), 0);
    }

    #[test]
    fn non_ascii_letters_are_word_characters() {
        let got: Vec<String> = tokenize("Ünïcode café, ÉTÉ").collect();
        assert_eq!(got, vec!["ünïcode", "café", "été"]);
    }

    #[test]
    fn counts_are_case_folded() {
        let t = count_words("Cat cat CAT dog");
        let expect: BTreeMap<String, u64> = [("cat".to_string(), 3), ("dog".to_string(), 1)].into_iter().collect();
        assert_eq!(sorted(t), expect);
    }

    #[test]
    fn missing_file_maps_to_empty_table_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = map_file(&dir.path().join("absent.txt"), MapCfg { read_buffer_bytes: 8 * 1024, readers: None });
        assert!(!out.is_ok());
        assert!(out.table.is_empty());
        assert!(out.error.unwrap().contains("absent.txt"));
    }
}
