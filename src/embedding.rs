//! Embedding capability and its validating client adapter.
//!
//! The [`Embedder`] trait is the seam to the external embedding model.
//! [`OpenAiEmbedder`] implements it against an OpenAI-compatible
//! `/v1/embeddings` endpoint. [`EmbeddingClient`] wraps any embedder with
//! input validation (fail fast, before spending an external call) and
//! dimension verification, yielding a uniform result/error shape.
//!
//! Transient upstream failures are classified, not retried here — retry
//! budgets belong to the ingestion pipeline and query orchestrator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{GatewayError, GatewayResult};

/// External embedding capability: text in, fixed-dimension vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality every call returns.
    fn dims(&self) -> usize;
    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>>;
}

/// Embedder backed by an OpenAI-compatible embeddings API.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    api_key: String,
}

impl OpenAiEmbedder {
    /// The API key is read from the configured environment variable once,
    /// at construction; pipeline logic never touches the environment.
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            dims: config.dims,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let json: serde_json::Value = response.json().await.map_err(|e| {
                GatewayError::Unavailable(format!("malformed embedding response: {e}"))
            })?;
            return parse_embedding_response(&json);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(classify_status(status, &detail))
    }
}

fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Unavailable(format!("embedding call timed out: {err}"))
    } else {
        GatewayError::Unavailable(format!("embedding endpoint unreachable: {err}"))
    }
}

fn classify_status(status: reqwest::StatusCode, detail: &str) -> GatewayError {
    if status.as_u16() == 429 {
        GatewayError::rate_limited(format!("embedding API throttled: {detail}"), None)
    } else if status.is_server_error() {
        GatewayError::Unavailable(format!("embedding API error {status}: {detail}"))
    } else {
        GatewayError::Malformed(format!("embedding API rejected request {status}: {detail}"))
    }
}

fn parse_embedding_response(json: &serde_json::Value) -> GatewayResult<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            GatewayError::Unavailable("embedding response missing data[0].embedding".to_string())
        })?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Validating adapter over an [`Embedder`].
///
/// Rejects empty or oversized text before calling the external capability
/// and verifies the returned vector has the expected dimensionality.
#[derive(Clone)]
pub struct EmbeddingClient {
    inner: Arc<dyn Embedder>,
    max_input_chars: usize,
}

impl EmbeddingClient {
    pub fn new(inner: Arc<dyn Embedder>, max_input_chars: usize) -> Self {
        Self {
            inner,
            max_input_chars,
        }
    }

    pub fn dims(&self) -> usize {
        self.inner.dims()
    }

    pub async fn embed(&self, text: &str) -> GatewayResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(GatewayError::Validation(
                "text must not be empty".to_string(),
            ));
        }
        let len = text.chars().count();
        if len > self.max_input_chars {
            return Err(GatewayError::Validation(format!(
                "text length {len} exceeds maximum of {} characters",
                self.max_input_chars
            )));
        }

        let vector = self.inner.embed(text).await?;

        let dims = self.inner.dims();
        if vector.len() != dims {
            return Err(GatewayError::Unavailable(format!(
                "embedding model '{}' returned {} dimensions, expected {dims}",
                self.inner.model_name(),
                vector.len()
            )));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counting embedder double: returns a constant vector of `dims` length
    /// (or a wrong length, when misbehaving).
    struct FakeEmbedder {
        dims: usize,
        returned_len: usize,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn well_behaved(dims: usize) -> Self {
            Self {
                dims,
                returned_len: dims,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, _text: &str) -> GatewayResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5; self.returned_len])
        }
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_external_call() {
        let embedder = Arc::new(FakeEmbedder::well_behaved(4));
        let client = EmbeddingClient::new(embedder.clone(), 100);
        let err = client.embed("   ").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_text_rejected_before_external_call() {
        let embedder = Arc::new(FakeEmbedder::well_behaved(4));
        let client = EmbeddingClient::new(embedder.clone(), 8);
        let err = client.embed("this text is too long").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_wrapped() {
        let embedder = Arc::new(FakeEmbedder {
            dims: 4,
            returned_len: 3,
            calls: AtomicUsize::new(0),
        });
        let client = EmbeddingClient::new(embedder, 100);
        let err = client.embed("hello").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Unavailable);
        assert!(err.to_string().contains("expected 4"));
    }

    #[tokio::test]
    async fn test_valid_text_embedded() {
        let embedder = Arc::new(FakeEmbedder::well_behaved(4));
        let client = EmbeddingClient::new(embedder.clone(), 100);
        let vector = client.embed("hello world").await.unwrap();
        assert_eq!(vector.len(), 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_status_classification() {
        let err = classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.kind(), crate::error::ErrorKind::RateLimited);
        let err = classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.kind(), crate::error::ErrorKind::Unavailable);
        let err = classify_status(reqwest::StatusCode::BAD_REQUEST, "bad input");
        assert_eq!(err.kind(), crate::error::ErrorKind::Malformed);
    }

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({
            "data": [{"embedding": [0.1, 0.2, 0.3]}],
            "model": "fake"
        });
        let vector = parse_embedding_response(&json).unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);

        let missing = serde_json::json!({"data": []});
        assert!(parse_embedding_response(&missing).is_err());
    }
}
