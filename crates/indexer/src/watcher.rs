use crate::discovery::FileDiscovery;
use crate::error::{IndexerError, Result};
use crate::indexer::Indexer;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches a project root and re-indexes files as they change (§4.7). A
/// per-path timer coalesces bursts of events; deletes bypass debouncing
/// entirely since `delete_by_file` is idempotent.
pub struct FileWatcher {
    indexer: Arc<Indexer>,
    debounce: Duration,
    running: AtomicBool,
    inner: TokioMutex<Option<WatcherHandles>>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("indexer", &self.indexer)
            .field("debounce", &self.debounce)
            .field("running", &self.running)
            .finish()
    }
}

struct WatcherHandles {
    _watcher: RecommendedWatcher,
    consumer: JoinHandle<()>,
}

impl FileWatcher {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self::with_debounce(indexer, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(indexer: Arc<Indexer>, debounce: Duration) -> Self {
        Self {
            indexer,
            debounce,
            running: AtomicBool::new(false),
            inner: TokioMutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starting an already-running watcher is a no-op.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(1024);
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.blocking_send(res);
            },
            notify::Config::default(),
        )
        .map_err(|err| IndexerError::Watch(err.to_string()))?;

        watcher
            .watch(self.indexer.root(), RecursiveMode::Recursive)
            .map_err(|err| IndexerError::Watch(err.to_string()))?;

        let indexer = self.indexer.clone();
        let debounce = self.debounce;
        let discovery = Arc::new(FileDiscovery::new(self.indexer.root()));
        let consumer = tokio::spawn(async move {
            let pending: Arc<TokioMutex<HashMap<PathBuf, JoinHandle<()>>>> =
                Arc::new(TokioMutex::new(HashMap::new()));
            while let Some(event) = rx.recv().await {
                match event {
                    Ok(evt) => handle_event(evt, &indexer, &discovery, &pending, debounce).await,
                    Err(err) => log::warn!("watcher error: {err}"),
                }
            }
        });

        *self.inner.lock().await = Some(WatcherHandles { _watcher: watcher, consumer });
        Ok(())
    }

    /// Joins the consumer task so no late event races a registry teardown.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handles) = self.inner.lock().await.take() {
            drop(handles._watcher);
            handles.consumer.abort();
            let _ = handles.consumer.await;
        }
    }
}

async fn handle_event(
    event: Event,
    indexer: &Arc<Indexer>,
    discovery: &Arc<FileDiscovery>,
    pending: &Arc<TokioMutex<HashMap<PathBuf, JoinHandle<()>>>>,
    debounce: Duration,
) {
    for path in &event.paths {
        if path.is_dir() {
            continue;
        }
        match event.kind {
            EventKind::Remove(_) => {
                let relative = relative_to(indexer.root(), path);
                let store = indexer_store(indexer);
                if let Err(err) = store.delete_by_file(&relative) {
                    log::warn!("failed to delete stale chunks for {relative}: {err}");
                }
            }
            EventKind::Create(_) | EventKind::Modify(_) => {
                if !FileDiscovery::is_recognized(path) || discovery.is_ignored(path) {
                    continue;
                }
                schedule_debounced_index(indexer.clone(), path.clone(), pending.clone(), debounce)
                    .await;
            }
            _ => {}
        }
    }
}

async fn schedule_debounced_index(
    indexer: Arc<Indexer>,
    path: PathBuf,
    pending: Arc<TokioMutex<HashMap<PathBuf, JoinHandle<()>>>>,
    debounce: Duration,
) {
    let mut guard = pending.lock().await;
    if let Some(previous) = guard.remove(&path) {
        previous.abort();
    }
    let pending_for_task = pending.clone();
    let path_for_task = path.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(debounce).await;
        pending_for_task.lock().await.remove(&path_for_task);
        if let Err(err) = indexer.index_file(&path_for_task).await {
            log::warn!("failed to index {}: {err}", path_for_task.display());
        }
    });
    guard.insert(path, handle);
}

fn relative_to(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn indexer_store(indexer: &Arc<Indexer>) -> Arc<lgrep_store::ChunkStore> {
    indexer.store_handle()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgrep_embed::{Embedder, EmbeddingTransport, TransportError};
    use lgrep_store::ChunkStore;
    use std::fs;
    use tempfile::tempdir;

    struct ConstantTransport;

    #[async_trait::async_trait]
    impl EmbeddingTransport for ConstantTransport {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<(Vec<Vec<f32>>, usize), TransportError> {
            Ok((texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect(), texts.len()))
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn start_twice_is_a_no_op() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let embedder = Arc::new(Embedder::new(Arc::new(ConstantTransport)));
        let indexer = Arc::new(Indexer::new(dir.path(), store, embedder));
        let watcher = FileWatcher::new(indexer);

        watcher.start().await.unwrap();
        assert!(watcher.is_running());
        watcher.start().await.unwrap();
        assert!(watcher.is_running());
        watcher.stop().await;
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn restart_after_stop_creates_a_fresh_observer() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let embedder = Arc::new(Embedder::new(Arc::new(ConstantTransport)));
        let indexer = Arc::new(Indexer::new(dir.path(), store, embedder));
        let watcher = FileWatcher::new(indexer);

        watcher.start().await.unwrap();
        watcher.stop().await;
        watcher.start().await.unwrap();
        assert!(watcher.is_running());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn file_creation_triggers_debounced_index() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let embedder = Arc::new(Embedder::new(Arc::new(ConstantTransport)));
        let indexer = Arc::new(Indexer::new(dir.path(), store.clone(), embedder));
        let watcher = FileWatcher::with_debounce(indexer, Duration::from_millis(50));

        watcher.start().await.unwrap();
        fs::write(
            dir.path().join("new.py"),
            "def greet():\n    return 'hello world, this has enough tokens'\n",
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(store.count().unwrap() > 0, "debounced event must eventually index the file");
        watcher.stop().await;
    }

    #[tokio::test]
    async fn ignored_file_creation_is_never_indexed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "ignored.py\n").unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let embedder = Arc::new(Embedder::new(Arc::new(ConstantTransport)));
        let indexer = Arc::new(Indexer::new(dir.path(), store.clone(), embedder));
        let watcher = FileWatcher::with_debounce(indexer, Duration::from_millis(50));

        watcher.start().await.unwrap();
        fs::write(
            dir.path().join("ignored.py"),
            "def greet():\n    return 'hello world, this has enough tokens'\n",
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.count().unwrap(), 0, "an ignored file must never be indexed");
        watcher.stop().await;
    }
}
