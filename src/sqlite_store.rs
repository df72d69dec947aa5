//! SQLite-backed aggregate store.
//!
//! One table, `word_count(word TEXT PRIMARY KEY, count INTEGER NOT NULL CHECK (count >= 0))`.
//! A `save` is one transaction of batched `INSERT ... ON CONFLICT(word) DO UPDATE`
//! statements; any failed batch rolls the whole save back.

use anyhow::{bail, Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::aggregate::Aggregate;
use crate::store::{sibling_path, AggregateStore, StoreLock};

/// Two bound parameters per row; stays under SQLite's 32766-variable limit.
const MAX_ROWS_PER_STATEMENT: usize = 16_000;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS word_count (
        word  TEXT PRIMARY KEY NOT NULL,
        count INTEGER NOT NULL CHECK (count >= 0)
    )
"#;

/// Relational store over a single SQLite database file.
///
/// The store drives sqlx on its own current-thread runtime, so callers stay synchronous.
pub struct SqliteStore {
    pool: SqlitePool,
    rt: Runtime,
    path: PathBuf,
    batch_size: usize,
}

/// Whether `path` names a SQLite database by extension (`.sqlite3`, `.sqlite`, `.db`).
pub fn is_sqlite_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ["sqlite3", "sqlite", "db"].iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the table exists.
    /// A file that is not a SQLite database, or holds a negative count, fails here.
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::info!("init word count store at {}", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create store directory {}", parent.display()))?;
        }
        if path.is_dir() {
            bail!("store path {} is a directory", path.display());
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("build sqlite runtime")?;
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let pool = rt
            .block_on(SqlitePoolOptions::new().max_connections(1).connect_with(options))
            .with_context(|| format!("connect to {}", path.display()))?;

        let store = Self { pool, rt, path, batch_size: batch_size.clamp(1, MAX_ROWS_PER_STATEMENT) };
        store
            .rt
            .block_on(sqlx::query(SCHEMA).execute(&store.pool))
            .with_context(|| format!("create word_count table in {}", store.path.display()))?;
        store.read_all()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = self
            .rt
            .block_on(sqlx::query_as("SELECT word, count FROM word_count").fetch_all(&self.pool))
            .with_context(|| format!("read store {}", self.path.display()))?;
        let mut counts = BTreeMap::new();
        for (word, n) in rows {
            let n = u64::try_from(n).with_context(|| format!("negative count for {word:?} in {}", self.path.display()))?;
            counts.insert(word, n);
        }
        Ok(counts)
    }
}

impl AggregateStore for SqliteStore {
    fn load(&self) -> Result<Aggregate> {
        tracing::info!("load word map from {}", self.path.display());
        let counts = self.read_all()?;
        tracing::info!("done loading word map ({} words)", counts.len());
        Ok(Aggregate::from_map(counts))
    }

    fn save(&self, aggregate: &Aggregate) -> Result<()> {
        tracing::info!("save word map into {} ({} words)", self.path.display(), aggregate.len());
        let entries: Vec<(&str, u64)> = aggregate.iter().collect();
        self.rt.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (i, batch) in entries.chunks(self.batch_size).enumerate() {
                let rows = batch
                    .iter()
                    .map(|(word, n)| {
                        let n = i64::try_from(*n).with_context(|| format!("count for {word:?} does not fit in SQLite"))?;
                        Ok((*word, n))
                    })
                    .collect::<Result<Vec<(&str, i64)>>>()?;
                let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO word_count (word, count) ");
                qb.push_values(rows, |mut b, (word, n)| {
                    b.push_bind(word).push_bind(n);
                });
                qb.push(" ON CONFLICT(word) DO UPDATE SET count = excluded.count");
                qb.build().execute(&mut *tx).await?;
                tracing::debug!("upserted batch {} ({} words)", i + 1, batch.len());
            }
            tx.commit().await?;
            Ok::<(), anyhow::Error>(())
        })
        .with_context(|| format!("save store {}", self.path.display()))
    }

    fn lock_exclusive(&self) -> Result<Option<StoreLock>> {
        StoreLock::acquire(sibling_path(&self.path, ".lock")).map(Some)
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        self.rt.block_on(self.pool.close());
    }
}
