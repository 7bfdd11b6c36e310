use crate::config::ServerConfig;
use crate::error::{KernelError, Result};
use crate::project::ProjectState;
use crate::voyage::VoyageTransport;
use lgrep_embed::Embedder;
use lgrep_indexer::Indexer;
use lgrep_store::ChunkStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

pub const MAX_PROJECTS: usize = 20;
const WARN_OCCUPANCY_RATIO: f64 = 0.8;
const AUTO_INDEX_MAX_ATTEMPTS: u32 = 2;
const AUTO_INDEX_RETRY_BASE_DELAY_MS: u64 = 100;

/// Holds every live project keyed by resolved absolute path, a shared
/// embedder, and the single-flight bookkeeping for concurrent auto-index
/// callers (§4.8).
pub struct ProjectRegistry {
    config: ServerConfig,
    projects: Mutex<HashMap<PathBuf, Arc<ProjectState>>>,
    in_flight: Mutex<HashMap<PathBuf, broadcast::Sender<bool>>>,
    embedder: Mutex<Option<Arc<Embedder>>>,
}

impl ProjectRegistry {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            projects: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            embedder: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn get(&self, path: &Path) -> Option<Arc<ProjectState>> {
        let resolved = resolve_path(path).ok()?;
        self.projects.lock().await.get(&resolved).cloned()
    }

    pub async fn len(&self) -> usize {
        self.projects.lock().await.len()
    }

    pub async fn snapshot(&self) -> Vec<(PathBuf, Arc<ProjectState>)> {
        self.projects
            .lock()
            .await
            .iter()
            .map(|(path, state)| (path.clone(), state.clone()))
            .collect()
    }

    /// §4.8 `ensure`: double-checked locking with a lock-free fast path.
    pub async fn ensure(&self, path: &Path) -> Result<Arc<ProjectState>> {
        let resolved = resolve_path(path)?;

        if let Some(state) = self.projects.lock().await.get(&resolved) {
            return Ok(state.clone());
        }

        let mut guard = self.projects.lock().await;
        if let Some(state) = guard.get(&resolved) {
            return Ok(state.clone());
        }

        if guard.len() >= MAX_PROJECTS {
            return Err(KernelError::CapacityExceeded);
        }
        if guard.len() as f64 >= MAX_PROJECTS as f64 * WARN_OCCUPANCY_RATIO {
            log::warn!("project registry at {}/{MAX_PROJECTS} capacity", guard.len());
        }

        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or(KernelError::MissingApiKey)?;
        let embedder = self.get_or_init_embedder(api_key).await;

        let cache_root = self.config.cache_dir.clone();
        let cache_dir = lgrep_store::project_cache_dir(&cache_root, &resolved);
        let store = Arc::new(
            tokio::task::spawn_blocking(move || ChunkStore::open(&cache_dir))
                .await
                .expect("store open worker panicked")?,
        );
        let indexer = Arc::new(Indexer::new(resolved.clone(), store.clone(), embedder));
        let state = Arc::new(ProjectState::new(resolved.clone(), store, indexer));
        guard.insert(resolved.clone(), state.clone());
        Ok(state)
    }

    async fn get_or_init_embedder(&self, api_key: String) -> Arc<Embedder> {
        let mut guard = self.embedder.lock().await;
        if let Some(embedder) = guard.as_ref() {
            return embedder.clone();
        }
        let embedder = Arc::new(Embedder::new(Arc::new(VoyageTransport::new(api_key))));
        *guard = Some(embedder.clone());
        embedder
    }

    /// §4.8 `autoIndex`: exactly one caller per path runs `index_all`;
    /// concurrent callers wait on a capacity-1 broadcast and re-read the
    /// registry once it fires.
    pub async fn auto_index(&self, path: &Path) -> Result<Arc<ProjectState>> {
        let resolved = resolve_path(path)?;

        let follower_rx = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(tx) = in_flight.get(&resolved) {
                Some(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(1);
                in_flight.insert(resolved.clone(), tx);
                None
            }
        };

        if let Some(mut rx) = follower_rx {
            let _ = rx.recv().await;
            return self
                .projects
                .lock()
                .await
                .get(&resolved)
                .cloned()
                .ok_or(KernelError::AutoIndexFailed);
        }

        let outcome = self.run_auto_index_with_retry(&resolved).await;

        let tx = self.in_flight.lock().await.remove(&resolved);
        if let Some(tx) = tx {
            let _ = tx.send(outcome.is_ok());
        }
        outcome
    }

    async fn run_auto_index_with_retry(&self, resolved: &Path) -> Result<Arc<ProjectState>> {
        let mut last_err = None;
        for attempt in 0..AUTO_INDEX_MAX_ATTEMPTS {
            match self.try_auto_index_once(resolved).await {
                Ok(state) => return Ok(state),
                Err(err) => {
                    log::warn!(
                        "auto-index attempt {} for {} failed: {err}",
                        attempt + 1,
                        resolved.display()
                    );
                    last_err = Some(err);
                    if attempt + 1 < AUTO_INDEX_MAX_ATTEMPTS {
                        let delay_ms = AUTO_INDEX_RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }
        self.projects.lock().await.remove(resolved);
        log::warn!("auto-index exhausted retries for {}: {last_err:?}", resolved.display());
        Err(KernelError::AutoIndexFailed)
    }

    async fn try_auto_index_once(&self, resolved: &Path) -> Result<Arc<ProjectState>> {
        let state = self.ensure(resolved).await?;
        state.indexer.index_all().await?;
        Ok(state)
    }

    /// §4.8 `warm`: load existing on-disk caches only, never reindex.
    pub async fn warm(self: &Arc<Self>) {
        let current_len = self.projects.lock().await.len();
        let capacity_left = MAX_PROJECTS.saturating_sub(current_len);

        let mut candidates = Vec::new();
        for path in &self.config.warm_paths {
            if candidates.len() >= capacity_left {
                log::warn!("warm list truncated at capacity ({capacity_left} slots left)");
                break;
            }
            if !path.is_dir() {
                log::warn!("skipping warm path {}: not a directory", path.display());
                continue;
            }
            if !lgrep_store::has_disk_cache(&self.config.cache_dir, path) {
                log::warn!("skipping warm path {}: no on-disk cache", path.display());
                continue;
            }
            candidates.push(path.clone());
        }

        let mut joinset = tokio::task::JoinSet::new();
        for path in candidates {
            let registry = self.clone();
            joinset.spawn(async move {
                match registry.ensure(&path).await {
                    Ok(_) => log::info!("warmed project {}", path.display()),
                    Err(err) => log::warn!("failed to warm {}: {err}", path.display()),
                }
            });
        }
        while joinset.join_next().await.is_some() {}
    }

    /// §4.8 `close`: tear down every watcher, drop all state.
    pub async fn close(&self) {
        let mut guard = self.projects.lock().await;
        for (_, state) in guard.drain() {
            if state.is_watching() {
                state.stop_watching().await;
            }
        }
        drop(guard);
        *self.embedder.lock().await = None;
    }

    /// §4.8 `remove`: eviction. On-disk cache survives.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        let resolved = resolve_path(path)?;
        let state = self.projects.lock().await.remove(&resolved);
        if let Some(state) = state {
            if state.is_watching() {
                state.stop_watching().await;
            }
        }
        Ok(())
    }
}

fn resolve_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path)
        .map_err(|_| KernelError::PathNotFound(path.to_string_lossy().to_string()))
}
