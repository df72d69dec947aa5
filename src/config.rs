use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the persisted tally, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "word_map.json";

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct WordCountOptions {
    pub store_path: PathBuf,
    pub parallelism: Option<usize>,     // Some(N) to size the worker pool, None to use rayon's default
    pub save_batch_size: usize,         // words per upsert batch when persisting
    pub read_timeout: Option<Duration>, // per-file read deadline; None waits forever
    pub lock_store: bool,               // hold an exclusive lock on the store while indexing
    pub progress: bool,                 // show progress bars
    pub progress_label: Option<String>, // optional label prefix for progress bars

    // IO tuning
    pub read_buffer_bytes: usize, // BufReader capacity
}

impl Default for WordCountOptions {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            parallelism: None,
            save_batch_size: 500,
            read_timeout: None,
            lock_store: true,
            progress: false,
            progress_label: None,
            read_buffer_bytes: 256 * 1024,
        }
    }
}

impl WordCountOptions {
    pub fn with_store_path(mut self, path: impl AsRef<Path>) -> Self {
        self.store_path = path.as_ref().to_path_buf();
        self
    }
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.parallelism = Some(threads.max(1));
        self
    }
    pub fn with_save_batch_size(mut self, n: usize) -> Self {
        self.save_batch_size = n.max(1);
        self
    }
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }
    pub fn with_lock_store(mut self, yes: bool) -> Self {
        self.lock_store = yes;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_io_read_buffer(mut self, bytes: usize) -> Self {
        self.read_buffer_bytes = bytes.max(8 * 1024);
        self
    }

    /// Apply overrides from the environment:
    /// - WORDTALLY_STORE: path of the persisted tally
    /// - WORDTALLY_THREADS: worker pool size
    /// - WORDTALLY_READ_TIMEOUT_MS: per-file read timeout in milliseconds (0 disables)
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(p) = std::env::var("WORDTALLY_STORE") {
            if !p.trim().is_empty() {
                self = self.with_store_path(p.trim());
            }
        }
        if let Ok(s) = std::env::var("WORDTALLY_THREADS") {
            match s.trim().parse::<usize>() {
                Ok(n) => self = self.with_parallelism(n),
                Err(_) => tracing::warn!("WORDTALLY_THREADS is not a number: {:?}", s),
            }
        }
        if let Ok(s) = std::env::var("WORDTALLY_READ_TIMEOUT_MS") {
            match s.trim().parse::<u64>() {
                Ok(0) => self.read_timeout = None,
                Ok(ms) => self.read_timeout = Some(Duration::from_millis(ms)),
                Err(_) => tracing::warn!("WORDTALLY_READ_TIMEOUT_MS is not a number: {:?}", s),
            }
        }
        self
    }

    pub(crate) fn label(&self, phase: &str) -> String {
        match &self.progress_label {
            Some(l) => format!("{l}: {phase}"),
            None => phase.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_clamp_degenerate_values() {
        let o = WordCountOptions::default()
            .with_parallelism(0)
            .with_save_batch_size(0)
            .with_io_read_buffer(1);
        assert_eq!(o.parallelism, Some(1));
        assert_eq!(o.save_batch_size, 1);
        assert_eq!(o.read_buffer_bytes, 8 * 1024);
    }

    #[test]
    fn progress_label_prefixes_phase() {
        let o = WordCountOptions::default();
        assert_eq!(o.label("Mapping"), "Mapping");
        let o = o.with_progress_label("books");
        assert_eq!(o.label("Mapping"), "books: Mapping");
    }
}
