use thiserror::Error;

pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Error, Debug, Clone)]
pub enum KernelError {
    #[error("Maximum project limit reached. Restart the server or evict unused projects.")]
    CapacityExceeded,

    #[error("No embedding API key is configured.")]
    MissingApiKey,

    #[error("path does not exist or is not a directory: {0}")]
    PathNotFound(String),

    #[error("Failed to auto-index project on first search")]
    AutoIndexFailed,

    #[error("store error: {0}")]
    Store(String),

    #[error("indexer error: {0}")]
    Indexer(String),
}

impl From<lgrep_store::StoreError> for KernelError {
    fn from(err: lgrep_store::StoreError) -> Self {
        KernelError::Store(err.to_string())
    }
}

impl From<lgrep_indexer::IndexerError> for KernelError {
    fn from(err: lgrep_indexer::IndexerError) -> Self {
        KernelError::Indexer(err.to_string())
    }
}

impl KernelError {
    /// Maps onto the tool-boundary error taxonomy (§7) so handlers don't
    /// each re-derive it from the message text.
    pub fn category(&self) -> lgrep_protocol::ErrorCategory {
        use lgrep_protocol::ErrorCategory;
        match self {
            KernelError::CapacityExceeded => ErrorCategory::Configuration,
            KernelError::MissingApiKey => ErrorCategory::Configuration,
            KernelError::PathNotFound(_) => ErrorCategory::InputValidation,
            KernelError::AutoIndexFailed => ErrorCategory::PartialIndexing,
            KernelError::Store(_) => ErrorCategory::StoreCorruption,
            KernelError::Indexer(_) => ErrorCategory::DependencyFailure,
        }
    }
}
