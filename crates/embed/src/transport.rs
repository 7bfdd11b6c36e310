use crate::error::TransportError;
use async_trait::async_trait;

/// The out-of-scope leg: one HTTP round trip to an embedding provider.
/// The batching, retry, and cost logic in [`crate::Embedder`] is the
/// in-scope kernel behavior and is unit-testable against a stub
/// implementation of this trait.
#[async_trait]
pub trait EmbeddingTransport: Send + Sync {
    /// Embed a batch of document texts. Returns one vector per input text,
    /// in order, plus the provider-reported token count for the batch.
    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<(Vec<Vec<f32>>, usize), TransportError>;

    /// The fixed output dimension this transport produces.
    fn dimension(&self) -> usize;
}
