use crate::aggregate::Aggregate;
use crate::concurrency::{build_pool, ReaderPool};
use crate::config::WordCountOptions;
use crate::counting::{reduce_partitions_with_progress, union_tables, WordTable};
use crate::input::InputDoc;
use crate::mapper::{map_file, FileOutcome, MapCfg};
use crate::partition::shuffle;
use crate::paths::expand_patterns;
use crate::progress::maybe_count_progress;
use crate::query::{lookup, query_counts};
use crate::sqlite_store::{is_sqlite_path, SqliteStore};
use crate::store::{AggregateStore, JsonFileStore};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Pipeline phases, in the only order they may run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Idle,
    Loading,
    Mapping,
    Partitioning,
    Reducing,
    Merging,
    Persisting,
    /// The run's tally is durable. An aborted persist stays in `Persisting`.
    Persisted,
    Querying,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What one indexing run did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub files_planned: usize,
    pub files_counted: usize,
    /// `(path, error)` for every file that was skipped.
    pub failures: Vec<(PathBuf, String)>,
    /// Tokens counted in this run.
    pub words_counted: u64,
    /// Distinct words seen in this run.
    pub distinct_words: usize,
    /// Distinct words in the tally after merging.
    pub total_distinct_words: usize,
}

/// Orchestrator: owns the store, the worker pool, and the loaded tally.
///
/// ```no_run
/// use wordtally::WordCount;
/// let mut wc = WordCount::builder().store_path("word_map.json").open()?;
/// wc.index_files(&["books/*.txt"])?;
/// println!("{:?}", wc.query_words(&["today", "tomorrow"]));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct WordCount {
    opts: WordCountOptions,
    store: Box<dyn AggregateStore>,
    pool: rayon::ThreadPool,
    /// Present only when a read timeout is configured.
    readers: Option<ReaderPool>,
    aggregate: Aggregate,
    state: PipelineState,
}

/// Builder for `WordCount`.
#[derive(Clone, Debug, Default)]
pub struct WordCountBuilder {
    opts: WordCountOptions,
}

impl WordCountBuilder {
    // -------- Builder methods --------
    pub fn options(mut self, opts: WordCountOptions) -> Self { self.opts = opts; self }
    pub fn store_path(mut self, p: impl AsRef<Path>) -> Self { self.opts = self.opts.with_store_path(p); self }
    pub fn parallelism(mut self, threads: usize) -> Self { self.opts = self.opts.with_parallelism(threads); self }
    pub fn save_batch_size(mut self, n: usize) -> Self { self.opts = self.opts.with_save_batch_size(n); self }
    pub fn read_timeout(mut self, t: Option<std::time::Duration>) -> Self { self.opts = self.opts.with_read_timeout(t); self }
    pub fn lock_store(mut self, yes: bool) -> Self { self.opts = self.opts.with_lock_store(yes); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn io_read_buffer(mut self, bytes: usize) -> Self { self.opts = self.opts.with_io_read_buffer(bytes); self }

    /// Open the store at `store_path` and load the tally: SQLite for `.sqlite3`, `.sqlite`
    /// and `.db` paths, the JSON document store otherwise.
    /// Fails if the store cannot be created or its contents are corrupt.
    pub fn open(self) -> Result<WordCount> {
        let path = &self.opts.store_path;
        if is_sqlite_path(path) {
            let store = SqliteStore::open(path, self.opts.save_batch_size)
                .with_context(|| format!("initialize store {}", path.display()))?;
            self.open_with_store(store)
        } else {
            let store = JsonFileStore::open(path, self.opts.save_batch_size)
                .with_context(|| format!("initialize store {}", path.display()))?;
            self.open_with_store(store)
        }
    }

    /// Same as `open`, over any store implementation.
    pub fn open_with_store(self, store: impl AggregateStore + 'static) -> Result<WordCount> {
        let pool = build_pool(self.opts.parallelism)?;
        let readers = match self.opts.read_timeout {
            Some(timeout) => {
                let threads = self.opts.parallelism.unwrap_or_else(|| pool.current_num_threads());
                Some(ReaderPool::new(threads, threads * 2, timeout)?)
            }
            None => None,
        };
        let aggregate = store.load().context("load word map")?;
        Ok(WordCount { opts: self.opts, store: Box::new(store), pool, readers, aggregate, state: PipelineState::Idle })
    }
}

impl WordCount {
    pub fn builder() -> WordCountBuilder {
        WordCountBuilder::default()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The tally as of the last successful persist (or the initial load).
    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// A finished (or aborted) pass starts over from `Idle`.
    fn restart(&mut self) {
        if self.state != PipelineState::Idle {
            tracing::debug!("pipeline {} -> Idle", self.state);
            self.state = PipelineState::Idle;
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug_assert!(next >= self.state, "pipeline moved backwards: {} -> {}", self.state, next);
        tracing::debug!("pipeline {} -> {}", self.state, next);
        self.state = next;
    }

    /// Count words in every file matched by `patterns` and add them to the persisted tally.
    ///
    /// Unreadable files are skipped and listed in the report. A store failure while
    /// loading or persisting aborts the run; the in-memory tally then keeps its
    /// previous value.
    pub fn index_files<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<IndexReport> {
        let started = Instant::now();
        self.restart();
        let files = expand_patterns(patterns);

        let _lock = if self.opts.lock_store { self.store.lock_exclusive()? } else { None };

        // Reload under the lock so counts persisted by an earlier run are never lost.
        self.enter(PipelineState::Loading);
        let mut aggregate = self.store.load().context("load word map")?;

        self.enter(PipelineState::Mapping);
        let outcomes = self.map_all(&files);
        let mut report = IndexReport { files_planned: files.len(), ..Default::default() };
        let mut tables: Vec<WordTable> = Vec::with_capacity(outcomes.len());
        for out in outcomes {
            match out.error {
                None => report.files_counted += 1,
                Some(err) => report.failures.push((out.path, err)),
            }
            tables.push(out.table);
        }
        report.words_counted = tables.iter().flat_map(|t| t.values()).sum();
        for (path, err) in &report.failures {
            tracing::warn!("skipped {}: {}", path.display(), err);
        }
        tracing::info!(
            "mapped {} files ({} skipped), {} words",
            report.files_counted,
            report.failures.len(),
            report.words_counted
        );

        self.enter(PipelineState::Partitioning);
        let buckets = shuffle(tables);
        tracing::debug!("shuffled into {} partitions", buckets.len());

        self.enter(PipelineState::Reducing);
        let pb = maybe_count_progress(self.opts.progress, buckets.len() as u64, &self.opts.label("Reducing"));
        let parts = self.pool.install(|| reduce_partitions_with_progress(buckets, pb.as_ref()));
        if let Some(pb) = pb { pb.finish_with_message(self.opts.label("Reducing done")); }
        let merged = union_tables(parts);
        report.distinct_words = merged.len();

        self.enter(PipelineState::Merging);
        aggregate.merge(merged);
        report.total_distinct_words = aggregate.len();

        self.enter(PipelineState::Persisting);
        self.store.save(&aggregate).context("save word map")?;
        self.aggregate = aggregate;
        self.enter(PipelineState::Persisted);

        tracing::info!(
            "indexed {} distinct words ({} in tally) in {:.2?}",
            report.distinct_words,
            report.total_distinct_words,
            started.elapsed()
        );
        Ok(report)
    }

    fn map_all(&self, files: &[PathBuf]) -> Vec<FileOutcome> {
        let cfg = MapCfg { read_buffer_bytes: self.opts.read_buffer_bytes, readers: self.readers.as_ref() };
        let pb = maybe_count_progress(self.opts.progress, files.len() as u64, &self.opts.label("Mapping"));
        let outcomes: Vec<FileOutcome> = self.pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let out = map_file(path, cfg);
                    if let Some(pb) = &pb { pb.inc(1); }
                    out
                })
                .collect()
        });
        if let Some(pb) = pb { pb.finish_with_message(self.opts.label("Mapping done")); }
        outcomes
    }

    /// Count for one word (case-insensitive), 0 if absent.
    pub fn lookup(&self, word: &str) -> u64 {
        lookup(&self.aggregate, word)
    }

    /// Look up `words` against the tally; `(word as given, count)` in query order.
    pub fn query_words<S: AsRef<str>>(&mut self, words: &[S]) -> Vec<(String, u64)> {
        if self.state > PipelineState::Querying {
            self.restart();
        }
        self.enter(PipelineState::Querying);
        let counts = query_counts(&self.aggregate, words);
        self.enter(PipelineState::Done);
        counts
    }

    /// Index `input.index`, then answer `input.query`.
    pub fn run(&mut self, input: &InputDoc) -> Result<Vec<(String, u64)>> {
        self.index_files(input.index())?;
        Ok(self.query_words(input.query()))
    }

    /// Read the input document at `path`, then `run` it.
    pub fn from_input_file(&mut self, path: &Path) -> Result<Vec<(String, u64)>> {
        let input = InputDoc::from_path(path)?;
        self.run(&input)
    }
}
