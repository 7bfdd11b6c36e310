use lgrep_embed::{EmbeddingTransport, TransportError, EMBEDDING_DIM};
use serde::{Deserialize, Serialize};

const VOYAGE_EMBEDDINGS_URL: &str = "https://api.voyageai.com/v1/embeddings";
const VOYAGE_MODEL: &str = "voyage-code-3";

/// The one concrete [`EmbeddingTransport`]: a single HTTP round trip to
/// Voyage AI's embeddings endpoint per batch. Everything upstream of this
/// (batching, retry, cost accounting) lives in `lgrep-embed` and is
/// tested against a stub transport instead — this type only exists to be
/// wired into the kernel's real `Embedder`.
pub struct VoyageTransport {
    client: reqwest::Client,
    api_key: String,
}

impl VoyageTransport {
    pub fn new(api_key: String) -> Self {
        Self { client: reqwest::Client::new(), api_key }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
    usage: Usage,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: usize,
}

#[async_trait::async_trait]
impl EmbeddingTransport for VoyageTransport {
    async fn embed_batch(&self, texts: &[String]) -> Result<(Vec<Vec<f32>>, usize), TransportError> {
        let body = EmbedRequest { input: texts, model: VOYAGE_MODEL, input_type: "document" };

        let response = self
            .client
            .post(VOYAGE_EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::Authentication("invalid Voyage API key".to_string()));
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            if text.to_lowercase().contains("max") && text.to_lowercase().contains("token") {
                return Err(TransportError::MaxTokensExceeded);
            }
            return Err(TransportError::MalformedRequest(text));
        }
        if !status.is_success() {
            return Err(TransportError::Unavailable(format!("voyage returned {status}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;

        let vectors = parsed.data.into_iter().map(|d| d.embedding).collect();
        Ok((vectors, parsed.usage.total_tokens))
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }
}
