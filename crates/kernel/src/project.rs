use lgrep_indexer::{FileWatcher, Indexer};
use lgrep_store::ChunkStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One project's live state: store handle, indexer, and an (always
/// constructed but possibly stopped) watcher (§4.8).
#[derive(Debug)]
pub struct ProjectState {
    pub root: PathBuf,
    pub store: Arc<ChunkStore>,
    pub indexer: Arc<Indexer>,
    pub watcher: Arc<FileWatcher>,
    watching: AtomicBool,
}

impl ProjectState {
    pub fn new(root: PathBuf, store: Arc<ChunkStore>, indexer: Arc<Indexer>) -> Self {
        let watcher = Arc::new(FileWatcher::new(indexer.clone()));
        Self { root, store, indexer, watcher, watching: AtomicBool::new(false) }
    }

    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }

    pub async fn start_watching(&self) -> lgrep_indexer::Result<()> {
        self.watcher.start().await?;
        self.watching.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stop_watching(&self) {
        self.watcher.stop().await;
        self.watching.store(false, Ordering::SeqCst);
    }
}
