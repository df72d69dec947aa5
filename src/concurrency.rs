//! Concurrency helpers: the bounded worker pool shared by the map and reduce phases, and
//! the bounded reader pool that enforces per-file read deadlines.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use crate::text_reader::read_text;

/// Build a dedicated pool with `parallelism` threads (rayon's default when `None`).
/// Built once per orchestrator and reused for every phase and every run.
pub fn build_pool(parallelism: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("wordtally-{i}"));
    if let Some(n) = parallelism.filter(|n| *n > 0) {
        builder = builder.num_threads(n);
    }
    builder.build().context("build worker pool")
}

/// Fixed set of reader threads that run reads against a deadline.
///
/// A read that misses its deadline keeps its reader thread until the OS call returns,
/// but never more than `threads` such threads exist. Jobs waiting or running count
/// against `max_in_flight`; past that cap new reads fail at once instead of queueing.
pub struct ReaderPool {
    pool: rayon::ThreadPool,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
    timeout: Duration,
}

/// Decrements the in-flight counter when a job ends, even by panic.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ReaderPool {
    pub fn new(threads: usize, max_in_flight: usize, timeout: Duration) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("wordtally-read-{i}"))
            .build()
            .context("build reader pool")?;
        Ok(Self {
            pool,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: max_in_flight.max(1),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reads queued or running right now, including ones whose caller gave up.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run `job` on a reader thread and wait at most `timeout` for its result.
    pub fn run_with_deadline<T, F>(&self, what: &str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let claimed = self.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight(self.in_flight.clone());
        if claimed >= self.max_in_flight {
            drop(guard);
            bail!("{what}: {claimed} reads already stalled or queued; not starting another");
        }
        let (tx, rx) = mpsc::sync_channel(1);
        self.pool.spawn(move || {
            let _guard = guard;
            let _ = tx.send(job());
        });
        match rx.recv_timeout(self.timeout) {
            Ok(res) => res,
            Err(RecvTimeoutError::Timeout) => Err(anyhow!("{what} timed out after {:?}", self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("{what}: reader exited without a result")),
        }
    }

    /// `read_text` bounded by this pool's deadline.
    pub fn read_text(&self, path: &Path, read_buf_bytes: usize) -> Result<String> {
        let owned = path.to_path_buf();
        self.run_with_deadline(&format!("read of {}", path.display()), move || read_text(&owned, read_buf_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Receiver;
    use std::sync::Mutex;

    fn blocker() -> (mpsc::Sender<()>, Arc<Mutex<Receiver<()>>>) {
        let (tx, rx) = mpsc::channel();
        (tx, Arc::new(Mutex::new(rx)))
    }

    #[test]
    fn fast_job_returns_its_result() {
        let readers = ReaderPool::new(2, 4, Duration::from_secs(30)).unwrap();
        assert_eq!(readers.run_with_deadline("job", || Ok(7)).unwrap(), 7);
    }

    #[test]
    fn stalled_job_times_out_and_cap_refuses_more() {
        let readers = ReaderPool::new(1, 2, Duration::from_millis(50)).unwrap();
        let (release, gate) = blocker();

        let g = gate.clone();
        let err = readers
            .run_with_deadline("first", move || {
                let _ = g.lock().unwrap().recv();
                Ok(())
            })
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        // The only reader thread is still stuck: this one queues behind it and times out.
        let err = readers.run_with_deadline("second", || Ok(())).unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(readers.in_flight(), 2);

        // Cap reached: refused without being queued.
        let err = readers.run_with_deadline("third", || Ok(())).unwrap_err();
        assert!(err.to_string().contains("not starting another"));
        assert_eq!(readers.in_flight(), 2);

        release.send(()).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while readers.in_flight() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(readers.in_flight(), 0);
        assert_eq!(readers.run_with_deadline("after", || Ok(1)).unwrap(), 1);
    }
}
