//! The server kernel (§4.8, §4.9): a multi-project registry plus the five
//! tool operations every transport (stdio MCP, streamable HTTP, CLI)
//! dispatches into.

mod config;
mod error;
mod project;
mod registry;
mod voyage;

pub use config::ServerConfig;
pub use error::{KernelError, Result};
pub use project::ProjectState;
pub use registry::{ProjectRegistry, MAX_PROJECTS};
pub use voyage::VoyageTransport;

use lgrep_protocol::{
    MatchType as WireMatchType, ProjectStatus, SearchResponse, SearchResultItem, StatusResponse,
    WatchStartResponse, WatchStopResponse,
};
use lgrep_store::MatchType as StoreMatchType;
use std::path::Path;
use std::sync::Arc;

/// Owns the [`ProjectRegistry`] and exposes the five operations a tool
/// dispatcher forwards requests to (§4.9). This is the single thing a
/// binary (`lgrep-cli`, `lgrep-mcp-server`) holds an `Arc` to.
pub struct Kernel {
    registry: Arc<ProjectRegistry>,
}

impl Kernel {
    pub fn new(config: ServerConfig) -> Self {
        Self { registry: Arc::new(ProjectRegistry::new(config)) }
    }

    pub async fn warm(&self) {
        self.registry.warm().await;
    }

    pub async fn shutdown(&self) {
        self.registry.close().await;
    }

    /// Admission order per §4.9: in-memory, then on-disk cache, then
    /// auto-index a real directory, else a not-found error.
    async fn admit(&self, path: &Path) -> Result<Arc<ProjectState>> {
        if let Some(state) = self.registry.get(path).await {
            return Ok(state);
        }
        let cache_dir = self.registry.config().cache_dir.clone();
        if let Ok(resolved) = std::fs::canonicalize(path) {
            if lgrep_store::has_disk_cache(&cache_dir, &resolved) {
                return self.registry.ensure(&resolved).await;
            }
        }
        if path.is_dir() {
            return self.registry.auto_index(path).await;
        }
        Err(KernelError::PathNotFound(path.to_string_lossy().to_string()))
    }

    pub async fn search(
        &self,
        query: &str,
        path: &Path,
        limit: usize,
        hybrid: bool,
    ) -> Result<SearchResponse> {
        let state = self.admit(path).await?;
        let query_vector = state
            .indexer
            .embedder_handle()
            .embed_query(query)
            .await
            .map_err(|err| KernelError::Indexer(err.to_string()))?;

        let results = if hybrid {
            tokio::task::spawn_blocking({
                let store = state.store.clone();
                let query_vector = query_vector.clone();
                let query = query.to_string();
                move || store.search_hybrid(&query_vector, &query, limit)
            })
            .await
            .expect("search worker panicked")?
        } else {
            tokio::task::spawn_blocking({
                let store = state.store.clone();
                let query_vector = query_vector.clone();
                move || store.search_vector(&query_vector, limit)
            })
            .await
            .expect("search worker panicked")?
        };

        Ok(SearchResponse {
            results: results
                .results
                .into_iter()
                .map(|r| SearchResultItem {
                    file_path: r.file_path,
                    start_line: r.start_line,
                    end_line: r.end_line,
                    content: r.content,
                    score: r.score,
                    match_type: match r.match_type {
                        StoreMatchType::Vector => WireMatchType::Vector,
                        StoreMatchType::Hybrid => WireMatchType::Hybrid,
                    },
                })
                .collect(),
            query_time_ms: results.query_time_ms,
            total_chunks: results.total_chunks,
        })
    }

    pub async fn index(&self, path: &Path) -> Result<lgrep_protocol::IndexResponse> {
        let state = self.registry.ensure(path).await?;
        let summary = state.indexer.index_all().await?;
        Ok(lgrep_protocol::IndexResponse {
            file_count: summary.file_count as u64,
            chunk_count: summary.chunk_count as u64,
            duration_ms: summary.duration_ms,
            total_tokens: summary.total_tokens as u64,
        })
    }

    pub async fn status(&self, path: Option<&Path>) -> Result<StatusResponse> {
        match path {
            Some(path) => Ok(StatusResponse::Single(self.project_status(path).await?)),
            None => {
                let mut projects = Vec::new();
                for (_, state) in self.registry.snapshot().await {
                    if let Ok(status) = self.status_of_state(&state, false).await {
                        projects.push(status);
                    }
                }
                Ok(StatusResponse::All { projects })
            }
        }
    }

    async fn project_status(&self, path: &Path) -> Result<ProjectStatus> {
        if let Some(state) = self.registry.get(path).await {
            return self.status_of_state(&state, false).await;
        }
        let cache_dir = self.registry.config().cache_dir.clone();
        let resolved = std::fs::canonicalize(path)
            .map_err(|_| KernelError::PathNotFound(path.to_string_lossy().to_string()))?;
        if !lgrep_store::has_disk_cache(&cache_dir, &resolved) {
            return Err(KernelError::PathNotFound(path.to_string_lossy().to_string()));
        }
        let store_dir = lgrep_store::project_cache_dir(&cache_dir, &resolved);
        let store = tokio::task::spawn_blocking(move || lgrep_store::ChunkStore::open(&store_dir))
            .await
            .expect("store open worker panicked")?;
        let chunk_count = store.count()?;
        let file_count = store.get_indexed_files()?.len() as u64;
        Ok(ProjectStatus {
            path: resolved.to_string_lossy().to_string(),
            chunk_count,
            file_count,
            watching: false,
            disk_cache: true,
        })
    }

    async fn status_of_state(&self, state: &Arc<ProjectState>, disk_cache: bool) -> Result<ProjectStatus> {
        let chunk_count = state.store.count()?;
        let file_count = state.store.get_indexed_files()?.len() as u64;
        Ok(ProjectStatus {
            path: state.root.to_string_lossy().to_string(),
            chunk_count,
            file_count,
            watching: state.is_watching(),
            disk_cache,
        })
    }

    pub async fn watch_start(&self, path: &Path) -> Result<WatchStartResponse> {
        let state = self.registry.ensure(path).await?;
        state.start_watching().await?;
        Ok(WatchStartResponse {
            path: state.root.to_string_lossy().to_string(),
            watching: true,
        })
    }

    pub async fn watch_stop(&self, path: Option<&Path>) -> Result<WatchStopResponse> {
        match path {
            Some(path) => {
                let state = self
                    .registry
                    .get(path)
                    .await
                    .ok_or_else(|| KernelError::PathNotFound(path.to_string_lossy().to_string()))?;
                state.stop_watching().await;
                Ok(WatchStopResponse::Single {
                    stopped: true,
                    project: state.root.to_string_lossy().to_string(),
                })
            }
            None => {
                let mut stopped_projects = Vec::new();
                for (_, state) in self.registry.snapshot().await {
                    if state.is_watching() {
                        state.stop_watching().await;
                        stopped_projects.push(state.root.to_string_lossy().to_string());
                    }
                }
                Ok(WatchStopResponse::All { stopped: true, projects_stopped: stopped_projects })
            }
        }
    }

    /// Administrative eviction (§4.8); not exposed as a tool.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        self.registry.remove(path).await
    }

    pub fn registry(&self) -> &Arc<ProjectRegistry> {
        &self.registry
    }
}
