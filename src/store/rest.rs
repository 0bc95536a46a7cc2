//! REST [`VectorStore`] adapter for a remote vector backend.
//!
//! Speaks a plain JSON protocol against per-index endpoints:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upsert | `POST {base}/indexes/{index}/upsert` with the full document |
//! | query  | `POST {base}/indexes/{index}/query` with vector/top_k/filter |
//! | delete | `DELETE {base}/indexes/{index}/vectors/{id}` |
//!
//! Physical index names are derived from partitions by [`IndexNaming`], so
//! tenant routing decisions never leak into request-handling code. The
//! backend's failure modes are mapped onto the gateway taxonomy: timeouts
//! and 5xx → `Unavailable`, 429 → `RateLimited` (honoring `Retry-After`),
//! other 4xx → `Malformed`. A 404 on delete is success — deletion is
//! idempotent.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::BackendConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{Document, MetadataFilter, Partition};
use crate::partition::IndexNaming;

use super::{ScoredId, VectorStore};

pub struct RestVectorStore {
    client: reqwest::Client,
    base_url: String,
    naming: IndexNaming,
    api_key: Option<String>,
}

impl RestVectorStore {
    pub fn new(config: &BackendConfig, naming: IndexNaming) -> anyhow::Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("backend.base_url required for the rest backend"))?;
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| anyhow::anyhow!("{var} environment variable not set"))?,
            ),
            None => None,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            naming,
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }
}

#[derive(serde::Deserialize)]
struct QueryResponse {
    matches: Vec<ScoredId>,
}

#[async_trait]
impl VectorStore for RestVectorStore {
    async fn upsert(&self, partition: &Partition, document: &Document) -> GatewayResult<()> {
        let index = self.naming.index_name(partition);
        let url = format!("{}/indexes/{}/upsert", self.base_url, index);
        let response = self
            .request(reqwest::Method::POST, url)
            .json(document)
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(classify_error_response(response).await)
    }

    async fn query(
        &self,
        partition: &Partition,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> GatewayResult<Vec<ScoredId>> {
        let index = self.naming.index_name(partition);
        let url = format!("{}/indexes/{}/query", self.base_url, index);
        let body = serde_json::json!({
            "vector": vector,
            "top_k": top_k,
            "filter": filter,
        });
        let response = self
            .request(reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let parsed: QueryResponse = response.json().await.map_err(|e| {
                GatewayError::Unavailable(format!("malformed backend query response: {e}"))
            })?;
            return Ok(parsed.matches);
        }
        Err(classify_error_response(response).await)
    }

    async fn delete(&self, partition: &Partition, id: &str) -> GatewayResult<()> {
        let index = self.naming.index_name(partition);
        let url = format!("{}/indexes/{}/vectors/{}", self.base_url, index, id);
        let response = self
            .request(reqwest::Method::DELETE, url)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        // Absent document: deletion is idempotent, not an error.
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(classify_error_response(response).await)
    }
}

/// Reads the `Retry-After` header before consuming the body, then classifies.
async fn classify_error_response(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let detail = response.text().await.unwrap_or_default();
    match classify_status(status, &detail) {
        GatewayError::RateLimited {
            detail,
            retry_after: body_hint,
        } => GatewayError::RateLimited {
            detail,
            retry_after: retry_after.or(body_hint),
        },
        other => other,
    }
}

fn classify_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Unavailable(format!("vector backend call timed out: {err}"))
    } else {
        GatewayError::Unavailable(format!("vector backend unreachable: {err}"))
    }
}

fn classify_status(status: reqwest::StatusCode, detail: &str) -> GatewayError {
    if status.as_u16() == 429 {
        GatewayError::rate_limited(
            format!("vector backend throttled: {detail}"),
            parse_retry_after(detail),
        )
    } else if status.is_server_error() {
        GatewayError::Unavailable(format!("vector backend error {status}: {detail}"))
    } else {
        GatewayError::Malformed(format!("vector backend rejected request {status}: {detail}"))
    }
}

/// Some backends put the wait hint in the throttling body as plain seconds.
fn parse_retry_after(detail: &str) -> Option<Duration> {
    serde_json::from_str::<serde_json::Value>(detail)
        .ok()
        .and_then(|v| v.get("retry_after_secs").and_then(|s| s.as_u64()))
        .map(Duration::from_secs)
}
