//! File enumeration: resolve the `index` glob patterns into concrete file paths.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand glob patterns into file paths, in pattern order.
///
/// - A pattern naming an existing directory (or a glob match that is a directory)
///   contributes every regular file below it, sorted by name.
/// - Patterns matching nothing contribute nothing; a literal path to a missing file
///   is kept so the mapper can report it.
/// - Duplicates are kept: listing a file twice counts it twice.
/// - Invalid patterns are logged and skipped.
pub fn expand_patterns<S: AsRef<str>>(patterns: &[S]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern.is_empty() {
            continue;
        }
        let literal = Path::new(pattern);
        if literal.is_dir() {
            walk_files(literal, &mut files);
            continue;
        }
        if !has_glob_meta(pattern) {
            files.push(literal.to_path_buf());
            continue;
        }
        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("skipping invalid glob pattern {:?}: {}", pattern, e);
                continue;
            }
        };
        for entry in entries {
            match entry {
                Ok(p) if p.is_dir() => walk_files(&p, &mut files),
                Ok(p) => files.push(p),
                Err(e) => tracing::warn!("glob {:?}: unreadable entry {}", pattern, e),
            }
        }
    }
    tracing::info!("extracted {} file paths to index", files.len());
    files
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn walk_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        match entry {
            Ok(ent) if ent.file_type().is_file() => out.push(ent.into_path()),
            Ok(_) => {}
            Err(e) => tracing::warn!("walking {}: {}", dir.display(), e),
        }
    }
}
