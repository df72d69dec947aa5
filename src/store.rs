//! Aggregate store: load-all and bulk-upsert persistence for the cumulative tally.
//!
//! File layout (JsonFileStore):
//!   <path>              pretty-printed JSON object `{"word": count}` + trailing newline
//!   <path>.inprogress   staged document written during `save` (temp)
//!   <path>.lock         advisory lock file; locked for the duration of an indexing run

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::aggregate::Aggregate;
use crate::util::{create_with_backoff, open_with_backoff, remove_with_backoff, replace_file_atomic_backoff};

/// Persistence contract consumed by the orchestrator.
pub trait AggregateStore: Send + Sync {
    /// Full persisted mapping; empty when nothing has been saved yet.
    fn load(&self) -> Result<Aggregate>;

    /// Bulk upsert: for every word in `aggregate` the stored count becomes exactly that
    /// value. Words already stored but absent from `aggregate` are left alone.
    fn save(&self, aggregate: &Aggregate) -> Result<()>;

    /// Take an exclusive hold on the store for one indexing run.
    /// Stores that cannot be shared between processes need no lock.
    fn lock_exclusive(&self) -> Result<Option<StoreLock>> {
        Ok(None)
    }
}

/// Apply `aggregate` onto `staged` in batches of `batch_size` words.
/// Batch boundaries never change the result: each word is set, not added.
fn upsert_batched(staged: &mut BTreeMap<String, u64>, aggregate: &Aggregate, batch_size: usize) {
    let entries: Vec<(&str, u64)> = aggregate.iter().collect();
    for (i, batch) in entries.chunks(batch_size.max(1)).enumerate() {
        for (word, n) in batch {
            staged.insert((*word).to_string(), *n);
        }
        tracing::debug!("upserted batch {} ({} words)", i + 1, batch.len());
    }
}

/// `<path><suffix>` next to `path`, e.g. `word_map.json.lock`.
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

// ----------------------------- JSON document store ------------------------------------

/// Flat-file store: one pretty-printed JSON document.
///
/// `save` stages every batch into a copy of the current document and promotes it with
/// a single rename, so a failure at any point leaves the previous document intact.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    batch_size: usize,
}

impl JsonFileStore {
    /// Open the store at `path`, creating its parent directory if needed.
    /// An existing document must parse; a corrupt store is an error here, before any work.
    pub fn open(path: impl AsRef<Path>, batch_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::info!("init word count store at {}", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create store directory {}", parent.display()))?;
        }
        if path.is_dir() {
            bail!("store path {} is a directory", path.display());
        }
        let store = Self { path, batch_size: batch_size.max(1) };
        store.read_document()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        sibling_path(&self.path, suffix)
    }

    fn read_document(&self) -> Result<BTreeMap<String, u64>> {
        let file = match open_with_backoff(&self.path, 16, 50) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e).with_context(|| format!("open store {}", self.path.display())),
        };
        let mut text = String::new();
        BufReader::new(file)
            .read_to_string(&mut text)
            .with_context(|| format!("read store {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let doc: UniqueCounts = serde_json::from_str(&text)
            .with_context(|| format!("parse store {}", self.path.display()))?;
        Ok(doc.0)
    }
}

impl AggregateStore for JsonFileStore {
    fn load(&self) -> Result<Aggregate> {
        tracing::info!("load word map from {}", self.path.display());
        let counts = self.read_document()?;
        tracing::info!("done loading word map ({} words)", counts.len());
        Ok(Aggregate::from_map(counts))
    }

    fn save(&self, aggregate: &Aggregate) -> Result<()> {
        tracing::info!("save word map into {} ({} words)", self.path.display(), aggregate.len());
        let mut staged = self.read_document()?;
        upsert_batched(&mut staged, aggregate, self.batch_size);

        let tmp = self.sibling(".inprogress");
        let written = (|| -> Result<()> {
            let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
            let mut w = BufWriter::new(f);
            serde_json::to_writer_pretty(&mut w, &staged)?;
            w.write_all(b"\n")?;
            w.flush()?;
            w.get_ref().sync_all()?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = remove_with_backoff(&tmp, 4, 20);
            return Err(e);
        }
        replace_file_atomic_backoff(&tmp, &self.path)
    }

    fn lock_exclusive(&self) -> Result<Option<StoreLock>> {
        StoreLock::acquire(self.sibling(".lock")).map(Some)
    }
}

/// Exclusive advisory lock on `<store>.lock`, held through the open handle.
///
/// The OS drops the lock when the handle closes, including when the process dies, so
/// a leftover lock file never blocks a later run. The file itself is left in place.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    _file: File,
}

impl StoreLock {
    pub fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("open lock {}", path.display()))?;
        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                bail!("store is locked by another run ({})", path.display())
            }
            Err(e) => return Err(e).with_context(|| format!("lock {}", path.display())),
        }
        // Holder pid, for whoever inspects the file. Not used for locking.
        if file.set_len(0).is_ok() {
            let _ = writeln!(file, "{}", std::process::id());
        }
        tracing::debug!("acquired store lock {}", path.display());
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Word→count document that rejects duplicate keys instead of letting the last one win.
struct UniqueCounts(BTreeMap<String, u64>);

impl<'de> Deserialize<'de> for UniqueCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = UniqueCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object mapping words to non-negative counts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut counts = BTreeMap::new();
                while let Some((word, n)) = access.next_entry::<String, u64>()? {
                    if counts.insert(word.clone(), n).is_some() {
                        return Err(serde::de::Error::custom(format!("duplicate word {word:?}")));
                    }
                }
                Ok(UniqueCounts(counts))
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

// ----------------------------- In-memory store ------------------------------------

/// Process-local store, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counts: Mutex<BTreeMap<String, u64>>,
    batch_size: usize,
}

impl MemoryStore {
    pub fn new(batch_size: usize) -> Self {
        Self { counts: Mutex::new(BTreeMap::new()), batch_size: batch_size.max(1) }
    }

    pub fn with_counts(counts: BTreeMap<String, u64>) -> Self {
        Self { counts: Mutex::new(counts), batch_size: 500 }
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.lock().clone()
    }
}

impl AggregateStore for MemoryStore {
    fn load(&self) -> Result<Aggregate> {
        Ok(Aggregate::from_map(self.snapshot()))
    }

    fn save(&self, aggregate: &Aggregate) -> Result<()> {
        let mut guard = self.counts.lock();
        let mut staged = guard.clone();
        upsert_batched(&mut staged, aggregate, self.batch_size);
        *guard = staged;
        Ok(())
    }
}
