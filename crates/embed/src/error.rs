use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors a transport can raise for one request. The distinction between
/// variants drives the retry policy: `MaxTokensExceeded` triggers a
/// batch-split retry, `Authentication`/`MalformedRequest` propagate
/// immediately, everything else gets generic exponential-backoff retry.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("batch exceeds the provider's max-tokens limit")]
    MaxTokensExceeded,

    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Whether the generic exponential-backoff retry loop should retry
    /// this error. `Authentication`/`MalformedRequest` propagate
    /// immediately; `MaxTokensExceeded` is handled one level up by the
    /// batch-split retry instead of the generic loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }
}

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("embedding retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },

    #[error("no embedding API key configured")]
    MissingApiKey,
}
