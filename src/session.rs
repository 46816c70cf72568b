//! Foreground controller for one video folder.
//!
//! A [`Session`] owns the published index and at most one background
//! indexing worker. The worker builds into its own store and publishes it
//! by swapping the shared `Arc` once the run completes, so searches never
//! observe a half-built index. Every folder change, rebuild or cancel bumps
//! a generation counter; a worker whose generation is stale never publishes.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        PoisonError,
        RwLock,
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    error::{Error, Result},
    index_store::{IndexStore, Occurrence},
    persistence,
    pipeline::{self, CancelToken, ProgressEvent, RunReport},
    query,
    transcriber::Transcriber,
    walker::ExtensionMatch,
};

/// How long a cancelled worker is waited for before it is detached.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Published index plus the generation it belongs to.
#[derive(Default)]
struct Published {
    generation: u64,
    store: Arc<IndexStore>,
}

type SharedIndex = Arc<RwLock<Published>>;

struct ActiveRun {
    cancel: CancelToken,
    progress: Receiver<ProgressEvent>,
    /// Hangs up when the worker thread ends, however it ends.
    done: Receiver<()>,
    handle: JoinHandle<Result<RunReport>>,
}

pub struct Session {
    folder: Option<PathBuf>,
    matching: ExtensionMatch,
    published: SharedIndex,
    last_results: Vec<Occurrence>,
    active: Option<ActiveRun>,
    /// Cancelled workers that did not stop within the grace period.
    detached: Vec<JoinHandle<Result<RunReport>>>,
    cancel_grace: Duration,
}

impl Session {
    pub fn new(matching: ExtensionMatch) -> Self {
        Self {
            folder: None,
            matching,
            published: SharedIndex::default(),
            last_results: Vec::new(),
            active: None,
            detached: Vec::new(),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    /// Current published index. Cheap: clones an `Arc`.
    pub fn index(&self) -> Arc<IndexStore> {
        let guard = self.published.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.store)
    }

    /// Replace the published index and invalidate every running worker.
    fn publish_now(&self, store: IndexStore) {
        let mut guard =
            self.published.write().unwrap_or_else(PoisonError::into_inner);
        guard.generation += 1;
        guard.store = Arc::new(store);
    }

    fn generation(&self) -> u64 {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Make `folder` the active scope and load its snapshot, if any.
    ///
    /// Any running worker is cancelled and the previous folder's index is
    /// dropped first. On a corrupt snapshot the error is returned and the
    /// index stays empty. Returns the number of words loaded.
    pub fn open(&mut self, folder: &Path) -> Result<usize> {
        if !folder.is_dir() {
            return Err(Error::NotFound {
                kind: "folder",
                name: folder.display().to_string(),
            });
        }

        self.cancel();
        self.folder = Some(folder.to_path_buf());
        self.last_results.clear();
        self.publish_now(IndexStore::new());

        match persistence::load(folder)? {
            Some(store) => {
                let words = store.len();
                self.publish_now(store);
                tracing::info!(
                    folder = %folder.display(),
                    words,
                    "loaded existing index"
                );
                Ok(words)
            }
            None => {
                tracing::debug!(folder = %folder.display(), "no saved index");
                Ok(0)
            }
        }
    }

    /// Drop the published index without touching the saved snapshot.
    pub fn clear(&mut self) {
        self.cancel();
        self.last_results.clear();
        self.publish_now(IndexStore::new());
    }

    /// Start an indexing run in the background.
    ///
    /// A plain build adds to the current index; a rebuild clears it first.
    /// A run already in progress is cancelled before the new one starts.
    pub fn start_build(
        &mut self,
        rebuild: bool,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<()> {
        let folder = self.folder.clone().ok_or(Error::NoFolder)?;
        self.cancel();

        if rebuild {
            self.last_results.clear();
            self.publish_now(IndexStore::new());
        }

        let generation = self.generation();
        let base = self.index();
        let shared = Arc::clone(&self.published);
        let matching = self.matching;
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("vidseek-indexer".to_string())
            .spawn(move || {
                let _done = done_tx;
                let mut fresh = IndexStore::new();
                let mut report = pipeline::run(
                    &folder,
                    matching,
                    &mut fresh,
                    transcriber.as_ref(),
                    &worker_cancel,
                    |event| {
                        // The receiver may be gone if the session was dropped.
                        let _ = tx.send(event);
                    },
                )?;
                if report.cancelled {
                    return Ok(report);
                }

                let mut merged = (*base).clone();
                merged.extend_from(fresh);
                let merged = Arc::new(merged);

                {
                    let mut guard =
                        shared.write().unwrap_or_else(PoisonError::into_inner);
                    if guard.generation != generation
                        || worker_cancel.is_cancelled()
                    {
                        tracing::debug!("superseded run, discarding result");
                        report.cancelled = true;
                        return Ok(report);
                    }
                    guard.store = Arc::clone(&merged);
                }

                if let Err(e) = persistence::save(&folder, &merged) {
                    tracing::warn!(
                        folder = %folder.display(),
                        error = %e,
                        "index built but snapshot could not be saved"
                    );
                    report.save_error = Some(e.to_string());
                }
                Ok(report)
            })
            .map_err(|e| Error::Worker(e.to_string()))?;

        self.active = Some(ActiveRun {
            cancel,
            progress: rx,
            done: done_rx,
            handle,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Drain progress events without blocking.
    pub fn poll_progress(&mut self) -> Vec<ProgressEvent> {
        self.reap_detached();
        match &self.active {
            Some(run) => run.progress.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Wait up to `timeout` for the next progress event.
    ///
    /// Returns `None` on timeout or once the worker has hung up.
    pub fn next_progress(&self, timeout: Duration) -> Option<ProgressEvent> {
        let run = self.active.as_ref()?;
        run.progress.recv_timeout(timeout).ok()
    }

    /// Block until the active run ends and return its report.
    pub fn wait(&mut self) -> Result<Option<RunReport>> {
        let Some(run) = self.active.take() else {
            return Ok(None);
        };
        join_worker(run.handle).map(Some)
    }

    /// Cancel the active run, waiting up to the grace period for it to stop.
    ///
    /// Returns the report when the worker stopped in time.
    pub fn cancel(&mut self) -> Option<RunReport> {
        let run = self.active.take()?;
        run.cancel.cancel();
        {
            // Invalidate without replacing the published store.
            let mut guard =
                self.published.write().unwrap_or_else(PoisonError::into_inner);
            guard.generation += 1;
        }

        let stopped = match run.done.recv_timeout(self.cancel_grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };

        if stopped {
            match join_worker(run.handle) {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!(error = %e, "cancelled run ended with error");
                    None
                }
            }
        } else {
            tracing::warn!(
                grace_ms = self.cancel_grace.as_millis() as u64,
                "indexing worker did not stop in time, detaching it"
            );
            self.detached.push(run.handle);
            None
        }
    }

    fn reap_detached(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .detached
            .drain(..)
            .partition(|handle| handle.is_finished());
        self.detached = running;
        for handle in finished {
            if let Err(e) = join_worker(handle) {
                tracing::debug!(error = %e, "detached worker ended with error");
            }
        }
    }

    /// Block until every detached worker has exited.
    pub fn join_detached(&mut self) {
        for handle in self.detached.drain(..) {
            let _ = join_worker(handle);
        }
    }

    /// Search the published index and remember the results.
    pub fn search(&mut self, query: &str) -> &[Occurrence] {
        let store = self.index();
        self.last_results = query::search(&store, query);
        &self.last_results
    }

    pub fn last_results(&self) -> &[Occurrence] {
        &self.last_results
    }

    /// Result at `position` (0-based) of the last search.
    pub fn result(&self, position: usize) -> Option<&Occurrence> {
        self.last_results.get(position)
    }

    pub fn words(&self) -> Vec<String> {
        self.index().words()
    }

    /// Absolute path of the video an occurrence refers to.
    pub fn video_path(&self, occurrence: &Occurrence) -> Option<PathBuf> {
        self.folder.as_ref().map(|f| f.join(&occurrence.video))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.cancel.cancel();
        }
    }
}

fn join_worker(handle: JoinHandle<Result<RunReport>>) -> Result<RunReport> {
    handle
        .join()
        .map_err(|_| Error::Worker("indexing thread panicked".to_string()))?
}
