//! Threaded thumbnail generator.
//!
//! - Small worker pool rendering through the shared `ThumbnailStore`
//! - flume channels for requests and results
//! - Pending set shared with workers so withdrawn items are skipped
//! - Resolution read at processing time so a running job can be retargeted

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use flume::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, trace, warn};

use super::generator::{GeneratorEvent, ThumbnailGenerator};
use super::group::ThumbnailGroup;
use super::store::{ThumbnailStore, DEFAULT_MAX_MEMORY_MB};
use crate::models::{Item, Url};

/// Worker threads started when the builder is not told otherwise.
const DEFAULT_WORKERS: usize = 2;

/// Upper bound on worker threads.
const MAX_WORKERS: usize = 4;

/// How often idle workers check for shutdown.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared between the loader and its workers.
struct Shared {
    /// Urls queued and not withdrawn; workers skip anything missing here.
    pending: RwLock<HashSet<Url>>,
    /// Resolution used for the next request a worker picks up.
    group: RwLock<ThumbnailGroup>,
    /// Workers currently rendering.
    active_workers: AtomicUsize,
    /// Shutdown signal for workers.
    shutdown: AtomicBool,
}

/// Worker-pool thumbnail generator.
pub struct ThumbnailLoader {
    /// Requests for the workers.
    request_tx: Sender<Item>,
    /// Results from the workers.
    event_rx: Receiver<GeneratorEvent>,
    /// Worker thread handles.
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    /// Store the workers render through.
    store: ThumbnailStore,
}

impl ThumbnailLoader {
    pub fn builder() -> ThumbnailLoaderBuilder {
        ThumbnailLoaderBuilder::new()
    }

    pub fn with_store(workers: usize, store: ThumbnailStore) -> Result<Self> {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        // Requests are withdrawn through the pending set, so the channel only
        // needs to hold what the view submitted
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();

        let shared = Arc::new(Shared {
            pending: RwLock::new(HashSet::new()),
            group: RwLock::new(ThumbnailGroup::Normal),
            active_workers: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });

        let mut handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let tx = event_tx.clone();
            let shared = Arc::clone(&shared);
            let store = store.clone();
            let handle = thread::Builder::new()
                .name(format!("thumb-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, rx, tx, shared, store))
                .context("Failed to spawn thumbnail worker")?;
            handles.push(handle);
        }

        debug!(num_workers, "Started thumbnail loader");

        Ok(Self {
            request_tx,
            event_rx,
            workers: handles,
            shared,
            store,
        })
    }

    /// Receiver for results, for hosts that await them.
    pub fn events(&self) -> Receiver<GeneratorEvent> {
        self.event_rx.clone()
    }

    /// Drain finished results without blocking.
    pub fn poll_events(&self) -> Vec<GeneratorEvent> {
        self.event_rx.try_iter().collect()
    }

    pub fn store(&self) -> &ThumbnailStore {
        &self.store
    }

    pub fn group(&self) -> ThumbnailGroup {
        *self.shared.group.read()
    }

    pub fn active_worker_count(&self) -> usize {
        self.shared.active_workers.load(Ordering::Acquire)
    }

    fn enqueue(&self, items: Vec<Item>) {
        let mut queued = 0usize;
        for item in items {
            if !self.shared.pending.write().insert(item.url.clone()) {
                trace!(url = %item.url, "Already pending");
                continue;
            }
            let url = item.url.clone();
            if self.request_tx.send(item).is_err() {
                error!("Thumbnail workers are gone");
                self.shared.pending.write().remove(&url);
                return;
            }
            queued += 1;
        }
        trace!(queued, "Queued thumbnail requests");
    }

    pub fn shutdown(&mut self) {
        debug!("Shutting down thumbnail loader");
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.pending.write().clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Thumbnail loader shutdown complete");
    }
}

impl ThumbnailGenerator for ThumbnailLoader {
    fn submit(&mut self, items: Vec<Item>, group: ThumbnailGroup) {
        *self.shared.group.write() = group;
        self.enqueue(items);
    }

    fn append(&mut self, items: Vec<Item>) {
        self.enqueue(items);
    }

    fn retarget(&mut self, group: ThumbnailGroup) {
        let mut current = self.shared.group.write();
        if *current != group {
            debug!(?group, "Retargeting thumbnail loader");
            *current = group;
        }
    }

    fn cancel(&mut self, urls: &[Url]) {
        let mut pending = self.shared.pending.write();
        for url in urls {
            pending.remove(url);
        }
    }

    fn pending(&self) -> Vec<Url> {
        self.shared.pending.read().iter().cloned().collect()
    }

    fn is_active(&self) -> bool {
        !self.shared.pending.read().is_empty() || self.active_worker_count() > 0
    }

    fn forget(&mut self, item: &Item) {
        self.store.remove(item);
    }
}

impl Drop for ThumbnailLoader {
    fn drop(&mut self) {
        if !self.shared.shutdown.load(Ordering::Relaxed) {
            self.shutdown();
        }
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<Item>,
    tx: Sender<GeneratorEvent>,
    shared: Arc<Shared>,
    store: ThumbnailStore,
) {
    debug!(worker_id, "Thumbnail worker started");

    while !shared.shutdown.load(Ordering::Relaxed) {
        let item = match rx.recv_timeout(WORKER_POLL_INTERVAL) {
            Ok(item) => item,
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        };

        // Count as active before leaving the pending set so the job never
        // looks idle in between
        shared.active_workers.fetch_add(1, Ordering::AcqRel);
        if !shared.pending.write().remove(&item.url) {
            trace!(worker_id, url = %item.url, "Skipping withdrawn request");
            shared.active_workers.fetch_sub(1, Ordering::AcqRel);
            continue;
        }

        let group = *shared.group.read();
        let event = process(&item, group, &store);
        if let Err(e) = tx.send(event) {
            warn!(worker_id, error = ?e, "Failed to send thumbnail result");
        }
        shared.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    debug!(worker_id, "Thumbnail worker stopped");
}

fn process(item: &Item, group: ThumbnailGroup, store: &ThumbnailStore) -> GeneratorEvent {
    trace!(url = %item.url, ?group, "Processing thumbnail request");
    match store.get_or_render(item, group) {
        Ok(rendered) => GeneratorEvent::Ready {
            item: item.clone(),
            pixmap: rendered.pixmap,
            full_size: rendered.full_size,
        },
        Err(e) => {
            debug!(url = %item.url, error = %format!("{e:#}"), "Thumbnail generation failed");
            GeneratorEvent::Failed {
                item: item.clone(),
                error: format!("{e:#}"),
            }
        }
    }
}

/// Builder for `ThumbnailLoader`.
pub struct ThumbnailLoaderBuilder {
    /// Number of worker threads.
    workers: usize,
    /// Memory layer budget in MB.
    max_memory_mb: usize,
    /// Store root; the platform cache directory when `None`.
    cache_dir: Option<PathBuf>,
}

impl ThumbnailLoaderBuilder {
    pub fn new() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            cache_dir: None,
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn max_memory_mb(mut self, mb: usize) -> Self {
        self.max_memory_mb = mb;
        self
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    pub fn build(self) -> Result<ThumbnailLoader> {
        let store = match self.cache_dir {
            Some(dir) => ThumbnailStore::new(dir, self.max_memory_mb),
            None => ThumbnailStore::open_default(self.max_memory_mb)?,
        };
        ThumbnailLoader::with_store(self.workers, store)
    }
}

impl Default for ThumbnailLoaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
