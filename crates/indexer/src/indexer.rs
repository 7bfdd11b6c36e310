use crate::discovery::FileDiscovery;
use crate::error::Result;
use lgrep_chunker::Chunker;
use lgrep_embed::Embedder;
use lgrep_store::{Chunk, ChunkStore};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Aggregate result of `index_all` (§4.6).
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    pub file_count: usize,
    pub chunk_count: usize,
    pub total_tokens: usize,
    pub duration_ms: f64,
}

/// Drives content-hash-gated incremental indexing for one project.
pub struct Indexer {
    root: PathBuf,
    store: Arc<ChunkStore>,
    chunker: Chunker,
    embedder: Arc<Embedder>,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer").field("root", &self.root).finish()
    }
}

impl Indexer {
    pub fn new(root: impl Into<PathBuf>, store: Arc<ChunkStore>, embedder: Arc<Embedder>) -> Self {
        Self {
            root: root.into(),
            store,
            chunker: Chunker::new(),
            embedder,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_handle(&self) -> Arc<ChunkStore> {
        self.store.clone()
    }

    pub fn embedder_handle(&self) -> Arc<Embedder> {
        self.embedder.clone()
    }

    /// §4.6 `index_all`: reconcile the store against a fresh directory
    /// scan, then re-index every discovered file (cheap for unchanged
    /// files thanks to the hash-skip contract in `index_file`).
    pub async fn index_all(&self) -> Result<IndexSummary> {
        let started = Instant::now();
        let discovered = FileDiscovery::new(&self.root).scan();
        let discovered_relative: std::collections::HashSet<String> = discovered
            .iter()
            .map(|p| self.relative_path(p))
            .collect();

        let indexed_files = self.store.get_indexed_files()?;
        for stale in indexed_files.difference(&discovered_relative) {
            if let Err(err) = self.store.delete_by_file(stale) {
                log::warn!("failed to remove stale file {stale}: {err}");
            }
        }

        let mut chunk_count = 0usize;
        let mut total_tokens = 0usize;
        let mut file_count = 0usize;
        for path in &discovered {
            match self.index_file(path).await {
                Ok(outcome) => {
                    file_count += 1;
                    chunk_count += outcome.chunks_written;
                    total_tokens += outcome.tokens;
                }
                Err(err) => {
                    log::warn!("failed to index {}: {err}", path.display());
                }
            }
        }

        Ok(IndexSummary {
            file_count,
            chunk_count,
            total_tokens,
            duration_ms: lgrep_protocol::round_ms(started.elapsed()),
        })
    }

    /// §4.6 `index_file`: hash-gated skip, chunk, embed, delete-then-add.
    pub async fn index_file(&self, path: &Path) -> Result<FileIndexOutcome> {
        let relative = self.relative_path(path);
        let content = tokio::fs::read_to_string(path).await?;
        let hash = content_hash(&content);

        if self.store.get_file_hash(&relative)?.as_deref() == Some(hash.as_str()) {
            return Ok(FileIndexOutcome { chunks_written: 0, tokens: 0, skipped: true });
        }

        let chunk_infos = {
            let chunker = self.chunker;
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || chunker.chunk_file(&path, &content))
                .await
                .expect("chunking worker panicked")?
        };

        if chunk_infos.is_empty() {
            self.store.delete_by_file(&relative)?;
            return Ok(FileIndexOutcome { chunks_written: 0, tokens: 0, skipped: false });
        }

        let texts: Vec<String> = chunk_infos.iter().map(|c| c.text.clone()).collect();
        let (vectors, tokens) = self.embedder.embed_documents(&texts).await?;

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let chunks: Vec<Chunk> = chunk_infos
            .into_iter()
            .zip(vectors)
            .map(|(info, embedding)| Chunk {
                id: Chunk::make_id(&relative, info.chunk_index as u32),
                file_path: relative.clone(),
                chunk_index: info.chunk_index as u32,
                start_line: info.start_line,
                end_line: info.end_line,
                text: info.text,
                embedding,
                file_hash: hash.clone(),
                indexed_at_unix_ms: now_ms,
            })
            .collect();

        let written = chunks.len();
        self.store.delete_by_file(&relative)?;
        self.store.add(&chunks)?;

        Ok(FileIndexOutcome { chunks_written: written, tokens, skipped: false })
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

pub struct FileIndexOutcome {
    pub chunks_written: usize,
    pub tokens: usize,
    #[allow(dead_code)]
    pub skipped: bool,
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgrep_embed::{EmbedError, EmbeddingTransport, TransportError};
    use std::fs;
    use tempfile::tempdir;

    struct ConstantTransport;

    #[async_trait::async_trait]
    impl EmbeddingTransport for ConstantTransport {
        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<(Vec<Vec<f32>>, usize), TransportError> {
            Ok((texts.iter().map(|_| vec![0.1, 0.2, 0.3]).collect(), texts.len() * 10))
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn test_embedder() -> Arc<Embedder> {
        Arc::new(Embedder::new(Arc::new(ConstantTransport)))
    }

    #[tokio::test]
    async fn index_file_skips_unchanged_content() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let file = dir.path().join("a.py");
        fs::write(&file, "def greet():\n    return 'hello world, this has enough tokens'\n").unwrap();

        let indexer = Indexer::new(dir.path(), store.clone(), test_embedder());
        let first = indexer.index_file(&file).await.unwrap();
        assert!(!first.skipped);
        assert!(first.chunks_written > 0);

        let second = indexer.index_file(&file).await.unwrap();
        assert!(second.skipped, "identical content must be skipped");
    }

    #[tokio::test]
    async fn index_file_reindexes_after_change() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let file = dir.path().join("a.py");
        fs::write(&file, "def greet():\n    return 'hello world, this has enough tokens'\n").unwrap();

        let indexer = Indexer::new(dir.path(), store.clone(), test_embedder());
        indexer.index_file(&file).await.unwrap();

        fs::write(&file, "def farewell():\n    return 'goodbye world, this also has enough tokens'\n").unwrap();
        let second = indexer.index_file(&file).await.unwrap();
        assert!(!second.skipped);
    }

    #[tokio::test]
    async fn index_all_removes_stale_files_not_on_disk() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        let file = dir.path().join("a.py");
        fs::write(&file, "def greet():\n    return 'hello world, this has enough tokens'\n").unwrap();

        let indexer = Indexer::new(dir.path(), store.clone(), test_embedder());
        indexer.index_all().await.unwrap();
        assert!(store.count().unwrap() > 0);

        fs::remove_file(&file).unwrap();
        indexer.index_all().await.unwrap();
        assert_eq!(store.count().unwrap(), 0, "deleted files must be reconciled away");
    }

    #[tokio::test]
    async fn index_all_is_resilient_to_per_file_errors() {
        let dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let store = Arc::new(ChunkStore::open(store_dir.path()).unwrap());
        fs::write(dir.path().join("ok.py"), "def greet():\n    return 'hello world, enough tokens here'\n").unwrap();

        let indexer = Indexer::new(dir.path(), store.clone(), test_embedder());
        let summary = indexer.index_all().await.unwrap();
        assert_eq!(summary.file_count, 1);

        let _ = EmbedError::from(TransportError::Unavailable("unused".into()));
    }
}
