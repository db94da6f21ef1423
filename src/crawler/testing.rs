//! Test doubles for the crawler: a store with injectable failures and a
//! scripted page fetcher

use crate::crawler::fetcher::{FetchError, FetchOptions, PageContent, PageFetcher};
use crate::state::{BATCH_KEY_PREFIX, PROGRESS_KEY};
use crate::storage::{CheckpointStore, SqliteStore, StorageError, StorageResult, DEFAULT_MAX_RECORD_BYTES};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

struct BatchGate {
    entered: oneshot::Sender<()>,
    release: mpsc::Receiver<()>,
}

/// In-memory store that logs successful writes and can be told to fail
pub(crate) struct TestStore {
    inner: SqliteStore,
    puts: Mutex<Vec<String>>,
    failing_batches: AtomicUsize,
    failing_progress: AtomicUsize,
    gate: Mutex<Option<BatchGate>>,
}

impl TestStore {
    pub(crate) fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_RECORD_BYTES)
    }

    pub(crate) fn with_limit(max_record_bytes: usize) -> Self {
        Self {
            inner: SqliteStore::new_in_memory(max_record_bytes).unwrap(),
            puts: Mutex::new(Vec::new()),
            failing_batches: AtomicUsize::new(0),
            failing_progress: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Keys of successful writes, in order
    pub(crate) fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub(crate) fn fail_next_batches(&self, count: usize) {
        self.failing_batches.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_next_progress(&self, count: usize) {
        self.failing_progress.store(count, Ordering::SeqCst);
    }

    /// Holds the next batch write until the returned sender fires
    ///
    /// The receiver resolves once the write has started.
    pub(crate) fn block_next_batch(&self) -> (oneshot::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(BatchGate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl CheckpointStore for TestStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        if key.starts_with(BATCH_KEY_PREFIX) {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.entered.send(());
                let _ = gate.release.recv();
            }
            if Self::take_failure(&self.failing_batches) {
                return Err(StorageError::Database("injected batch failure".to_string()));
            }
        }
        if key == PROGRESS_KEY && Self::take_failure(&self.failing_progress) {
            return Err(StorageError::Database("injected progress failure".to_string()));
        }

        self.inner.put(key, value)?;
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.keys_with_prefix(prefix)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.clear()
    }
}

/// Fetcher returning canned content, with per-URL misbehavior
#[derive(Default)]
pub(crate) struct StubFetcher {
    delay: Duration,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub(crate) fn panicking(mut self, url: &str) -> Self {
        self.panicking.insert(url.to_string());
        self
    }

    /// The URL never finishes loading
    pub(crate) fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    /// URLs fetched so far, in dispatch order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Fetches started and not yet finished or cancelled
    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<PageContent, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.hanging.contains(url) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.panicking.contains(url) {
            panic!("stub fetcher panicked on {}", url);
        }
        if self.failing.contains(url) {
            return Err(FetchError::Browser(format!("navigation to {} failed", url)));
        }

        Ok(PageContent {
            loaded_url: Some(url.to_string()),
            status_code: Some(200),
            raw_content: Some(format!("<html>{}</html>", url)),
            extraction_result: options
                .script
                .as_ref()
                .map(|_| serde_json::json!({ "url": url })),
            async_extraction_result: None,
        })
    }
}
