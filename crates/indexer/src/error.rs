use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunking failed: {0}")]
    Chunker(#[from] lgrep_chunker::ChunkerError),

    #[error("embedding failed: {0}")]
    Embed(#[from] lgrep_embed::EmbedError),

    #[error("store error: {0}")]
    Store(#[from] lgrep_store::StoreError),

    #[error("watcher error: {0}")]
    Watch(String),
}
