//! Document and query embedding: token-aware batching, retry with jitter,
//! and cost accounting, all driven against an injected
//! [`EmbeddingTransport`] so the actual HTTP leg (out of scope for this
//! crate) stays a test double.

mod batching;
mod embedder;
mod error;
mod transport;

pub use batching::{estimate_tokens, pack_batches, split_in_half, MAX_BATCH_SIZE, MAX_BATCH_TOKENS};
pub use embedder::{exceeds_token_cap, Embedder, MAX_RETRIES};
pub use error::{EmbedError, Result, TransportError};
pub use transport::EmbeddingTransport;

/// Build-time constant: the fixed dimension every vector in the system
/// carries (§3). A real transport must agree with this.
pub const EMBEDDING_DIM: usize = 1024;
