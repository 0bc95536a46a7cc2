//! Vector storage abstraction.
//!
//! The [`VectorStore`] trait defines the uniform CRUD + similarity-query
//! contract over the external vector backend, abstracting shared and
//! private partitions behind one interface. Implementations must be
//! `Send + Sync`:
//!
//! - [`memory::InMemoryVectorStore`] — brute-force cosine search over
//!   in-process maps; used in tests and `backend.kind = "memory"` setups.
//! - [`rest::RestVectorStore`] — JSON REST calls against a remote backend.

pub mod memory;
pub mod rest;

pub use memory::InMemoryVectorStore;
pub use rest::RestVectorStore;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GatewayResult;
use crate::models::{Document, MetadataFilter, Partition};

/// A candidate returned from a partition similarity query, before merging.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredId {
    #[serde(alias = "id")]
    pub document_id: String,
    pub score: f32,
}

/// Uniform storage contract across partition types.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or fully replace the document keyed by its id.
    ///
    /// Idempotent: re-upserting the same id replaces vector and metadata
    /// atomically; no mixed old/new state is observable.
    async fn upsert(&self, partition: &Partition, document: &Document) -> GatewayResult<()>;

    /// Similarity query returning up to `top_k` candidates ordered by score
    /// descending (ties broken by document id ascending).
    async fn query(
        &self,
        partition: &Partition,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> GatewayResult<Vec<ScoredId>>;

    /// Remove a document by id. Idempotent: absent ids are a no-op success.
    async fn delete(&self, partition: &Partition, id: &str) -> GatewayResult<()>;
}
