use crate::batching::{estimate_tokens, pack_batches, split_in_half, MAX_BATCH_SIZE, MAX_BATCH_TOKENS};
use crate::error::{EmbedError, Result, TransportError};
use crate::transport::EmbeddingTransport;
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_RETRIES: u32 = 5;
const BASE_DELAY_SECS: f64 = 1.0;

/// USD 0.18 per million tokens, the reference provider's list price. Cost
/// is advisory (§4.4) — it only gates one-shot log warnings, never a
/// caller-visible decision.
const COST_PER_MILLION_TOKENS: f64 = 0.18;
const COST_WARNING_THRESHOLDS_USD: [f64; 2] = [5.0, 10.0];

/// Turns chunk texts and queries into fixed-dimension vectors. Generic
/// over an injected [`EmbeddingTransport`] so the HTTP leg stays
/// out of this crate's test surface.
pub struct Embedder {
    transport: Arc<dyn EmbeddingTransport>,
    cumulative_tokens: AtomicU64,
    warned_threshold_index: AtomicUsize,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("cumulative_tokens", &self.cumulative_tokens)
            .finish()
    }
}

impl Embedder {
    pub fn new(transport: Arc<dyn EmbeddingTransport>) -> Self {
        Self {
            transport,
            cumulative_tokens: AtomicU64::new(0),
            warned_threshold_index: AtomicUsize::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.transport.dimension()
    }

    /// `embed_documents(texts) -> (vectors, tokens)` per §4.4.
    pub async fn embed_documents(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, usize)> {
        if texts.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let batches = pack_batches(texts, MAX_BATCH_SIZE, MAX_BATCH_TOKENS);
        let mut vectors = Vec::with_capacity(texts.len());
        let mut total_tokens = 0usize;

        for batch in batches {
            let (batch_vectors, batch_tokens) = self.embed_batch_with_split_retry(&batch).await?;
            vectors.extend(batch_vectors);
            total_tokens += batch_tokens;
        }

        self.account_cost(total_tokens);
        Ok((vectors, total_tokens))
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let (mut vectors, tokens) = self.embed_batch_with_split_retry(&[text.to_string()]).await?;
        self.account_cost(tokens);
        Ok(vectors.pop().unwrap_or_default())
    }

    /// Embed one batch, splitting it in half and retrying recursively if
    /// the provider rejects it as too large, before falling through to
    /// generic exponential-backoff retry.
    fn embed_batch_with_split_retry<'a>(
        &'a self,
        batch: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(Vec<Vec<f32>>, usize)>> + Send + 'a>> {
        Box::pin(async move {
            match self.embed_batch_with_retry(batch).await {
                Ok(result) => Ok(result),
                Err(EmbedError::Transport(TransportError::MaxTokensExceeded)) => match split_in_half(batch) {
                    Some((left, right)) => {
                        log::warn!(
                            "batch of {} texts exceeded max tokens, splitting in half",
                            batch.len()
                        );
                        let (mut left_vecs, left_tokens) =
                            self.embed_batch_with_split_retry(&left).await?;
                        let (right_vecs, right_tokens) =
                            self.embed_batch_with_split_retry(&right).await?;
                        left_vecs.extend(right_vecs);
                        Ok((left_vecs, left_tokens + right_tokens))
                    }
                    None => Err(EmbedError::Transport(TransportError::MaxTokensExceeded)),
                },
                Err(other) => Err(other),
            }
        })
    }

    /// Generic retry: up to `MAX_RETRIES` attempts with exponential
    /// backoff and uniform jitter in [0, 1) second; delay at attempt `n`
    /// (zero-based) is `1·2^n + rand`. Non-retryable errors propagate
    /// immediately.
    async fn embed_batch_with_retry(&self, batch: &[String]) -> Result<(Vec<Vec<f32>>, usize)> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.transport.embed_batch(batch).await {
                Ok(result) => return Ok(result),
                Err(err) if !err.is_retryable() => return Err(EmbedError::Transport(err)),
                Err(err) => {
                    log::warn!("embedding attempt {attempt} failed: {err}");
                    let delay = backoff_delay(attempt);
                    last_err = Some(err);
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(EmbedError::RetriesExhausted {
            attempts: MAX_RETRIES,
            last: last_err.expect("loop runs at least once"),
        })
    }

    fn account_cost(&self, tokens: usize) {
        let total = self.cumulative_tokens.fetch_add(tokens as u64, Ordering::Relaxed) + tokens as u64;
        let cost_usd = total as f64 / 1_000_000.0 * COST_PER_MILLION_TOKENS;

        loop {
            let idx = self.warned_threshold_index.load(Ordering::Relaxed);
            let Some(&threshold) = COST_WARNING_THRESHOLDS_USD.get(idx) else {
                break;
            };
            if cost_usd < threshold {
                break;
            }
            if self
                .warned_threshold_index
                .compare_exchange(idx, idx + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                log::warn!(
                    "cumulative embedding cost has crossed ${threshold:.0} (≈${cost_usd:.2} so far)"
                );
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY_SECS * 2f64.powi(attempt as i32);
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(base + jitter)
}

/// Whether an estimated token count would exceed the token cap on its own
/// — exposed for callers that want to warn before even attempting a batch.
pub fn exceeds_token_cap(text: &str) -> bool {
    estimate_tokens(text) > MAX_BATCH_TOKENS
}
