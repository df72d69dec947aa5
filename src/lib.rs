mod config;
mod paths;
mod text_reader;
mod mapper;
mod partition;
mod counting;
mod aggregate;
mod store;
mod sqlite_store;
mod query;
mod input;

mod progress;
mod concurrency;
mod util;
mod pipeline;

pub use crate::config::{WordCountOptions, DEFAULT_STORE_PATH};
pub use crate::pipeline::{IndexReport, PipelineState, WordCount, WordCountBuilder};
pub use crate::input::InputDoc;
pub use crate::aggregate::Aggregate;

// Map / shuffle / reduce building blocks, usable without the orchestrator.
pub use crate::mapper::{count_words, map_file, tokenize, FileOutcome, MapCfg};
pub use crate::partition::{partition_key, shuffle, Buckets};
pub use crate::counting::{
    merge_counts, reduce_bucket, reduce_partitions, reduce_partitions_with_progress, reduce_sequential, union_tables, WordTable,
};

// Persistence contract and the bundled stores.
pub use crate::store::{AggregateStore, JsonFileStore, MemoryStore, StoreLock};
pub use crate::sqlite_store::{is_sqlite_path, SqliteStore};

// Query helpers and output rendering.
pub use crate::query::{lookup, query_counts, render_counts};

// Glob/directory expansion of `index` patterns.
pub use crate::paths::expand_patterns;

// Expose multiprogress so binaries can render bars alongside their own.
pub use crate::progress::set_global_multiprogress;

// Deadline-bounded reads for callers driving `map_file` themselves.
pub use crate::concurrency::ReaderPool;

pub use crate::util::init_tracing_once;
