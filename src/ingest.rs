//! Ingestion pipeline: text in, addressable vector record out.
//!
//! A straight-line flow with no internal branching: validate → resolve the
//! single write-target partition → embed → upsert. Each stage failure is
//! wrapped with its stage name and surfaced, never swallowed. Transient
//! store and embedding failures are retried within the configured budget;
//! validation failures fail fast without spending an external call.
//!
//! Upserts are idempotent full replaces keyed by document id. Concurrent
//! upserts to the same id are last-write-wins at the backend; the pipeline
//! does not serialize them.

use std::sync::Arc;

use uuid::Uuid;

use crate::embedding::EmbeddingClient;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{CallerId, Document, DocumentInput, Partition, Scope};
use crate::partition;
use crate::report::FailureReporter;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::VectorStore;

pub struct IngestionPipeline {
    embedding: EmbeddingClient,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
    reporter: FailureReporter,
}

impl IngestionPipeline {
    pub fn new(
        embedding: EmbeddingClient,
        store: Arc<dyn VectorStore>,
        retry: RetryPolicy,
        reporter: FailureReporter,
    ) -> Self {
        Self {
            embedding,
            store,
            retry,
            reporter,
        }
    }

    /// Ingest a document into the caller's resolved partition.
    ///
    /// Returns the stored document id (caller-supplied or generated).
    pub async fn ingest(
        &self,
        caller: &CallerId,
        scope: Scope,
        input: DocumentInput,
    ) -> GatewayResult<String> {
        if input.text.trim().is_empty() {
            return Err(GatewayError::Validation(
                "document text must not be empty".to_string(),
            ));
        }
        if let Some(id) = &input.id {
            if id.trim().is_empty() {
                return Err(GatewayError::Validation(
                    "document id must not be empty when supplied".to_string(),
                ));
            }
        }

        let target = match partition::resolve_write(caller, scope) {
            Ok(partition) => partition,
            Err(err) => {
                self.reporter.report_error(&err, None);
                return Err(err);
            }
        };

        let result = self.ingest_into(&target, input).await;
        if let Err(err) = &result {
            self.reporter.report_error(err, Some(target.clone()));
        }
        result
    }

    async fn ingest_into(
        &self,
        target: &Partition,
        input: DocumentInput,
    ) -> GatewayResult<String> {
        let vector = with_retry(&self.retry, "embed", || self.embedding.embed(&input.text)).await?;

        let id = input
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let document = Document {
            id: id.clone(),
            text: input.text,
            metadata: input.metadata,
            vector,
        };

        with_retry(&self.retry, "upsert", || {
            self.store.upsert(target, &document)
        })
        .await?;

        tracing::debug!(partition = %target, id = %id, "document ingested");
        Ok(id)
    }

    /// Delete a document from the caller's resolved partition.
    ///
    /// Idempotent: deleting an absent id succeeds.
    pub async fn delete(&self, caller: &CallerId, scope: Scope, id: &str) -> GatewayResult<()> {
        if id.trim().is_empty() {
            return Err(GatewayError::Validation(
                "document id must not be empty".to_string(),
            ));
        }

        let target = match partition::resolve_write(caller, scope) {
            Ok(partition) => partition,
            Err(err) => {
                self.reporter.report_error(&err, None);
                return Err(err);
            }
        };

        let result = with_retry(&self.retry, "delete", || self.store.delete(&target, id)).await;
        if let Err(err) = &result {
            self.reporter.report_error(err, Some(target.clone()));
        }
        result
    }
}
