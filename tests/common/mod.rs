#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wordtally::{WordCount, WordCountBuilder};

/// Write a plain text file, creating parent directories.
pub fn write_text(path: &Path, text: &str) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
    path.to_path_buf()
}

/// Write a zstd-compressed text file.
pub fn write_zst_text(path: &Path, text: &str) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    enc.write_all(text.as_bytes()).unwrap();
    enc.finish().unwrap();
    path.to_path_buf()
}

/// Build a tiny corpus under a fresh temp dir:
/// - books/cats.txt  : "Cat cat CAT dog"
/// - books/birds.txt : "owl Owl hawk, 2 hawks_and owls!"
/// - books/zoo/zebra.txt.zst : "zebra Zebra zoo" (compressed)
/// - notes/readme.md : "not a book"
///
/// The directory is removed when the returned guard drops.
pub fn make_corpus_basic() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    write_text(&base.join("books/cats.txt"), "Cat cat CAT dog");
    write_text(&base.join("books/birds.txt"), "owl Owl hawk, 2 hawks_and owls!");
    write_zst_text(&base.join("books/zoo/zebra.txt.zst"), "zebra Zebra zoo");
    write_text(&base.join("notes/readme.md"), "not a book");
    dir
}

/// Store path for a corpus base dir.
pub fn store_path(base: &Path) -> PathBuf {
    base.join("state").join("word_map.json")
}

/// Builder with quiet, deterministic settings for tests.
pub fn builder(base: &Path) -> WordCountBuilder {
    WordCount::builder().store_path(store_path(base)).parallelism(4).progress(false)
}

/// Open a fresh orchestrator over the corpus store.
pub fn open(base: &Path) -> WordCount {
    builder(base).open().unwrap()
}

/// Pattern string for a path below `base`.
pub fn pat(base: &Path, rel: &str) -> String {
    base.join(rel).display().to_string()
}
