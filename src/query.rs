//! Query orchestration across one or more index partitions.
//!
//! The query text is embedded once and shared across every resolved
//! partition. Per-partition searches run concurrently and are joined before
//! merging; the joined futures stay owned by the request future, so a
//! caller-initiated cancellation abandons in-flight backend calls instead
//! of leaking them.
//!
//! Federated similarity search has no useful all-or-nothing semantics: when
//! some partitions fail after their retry budget but at least one succeeds,
//! the result is returned with `partial = true` and the degraded partitions
//! labeled, and one failure event is emitted per degraded partition. Only
//! when every partition fails does the whole request fail.

use std::sync::Arc;

use futures::future::join_all;

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    CallerId, DegradedPartition, FailureEvent, QueryOutcome, QueryRequest, SearchHit,
};
use crate::partition;
use crate::report::FailureReporter;
use crate::retry::{with_retry, RetryPolicy};
use crate::store::VectorStore;

pub struct QueryOrchestrator {
    embedding: EmbeddingClient,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
    reporter: FailureReporter,
    retrieval: RetrievalConfig,
}

impl QueryOrchestrator {
    pub fn new(
        embedding: EmbeddingClient,
        store: Arc<dyn VectorStore>,
        retry: RetryPolicy,
        reporter: FailureReporter,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedding,
            store,
            retry,
            reporter,
            retrieval,
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.retrieval.default_top_k
    }

    /// Execute a similarity query over the caller's resolved partitions.
    pub async fn query(
        &self,
        caller: &CallerId,
        request: QueryRequest,
    ) -> GatewayResult<QueryOutcome> {
        if request.text.trim().is_empty() {
            return Err(GatewayError::Validation(
                "query text must not be empty".to_string(),
            ));
        }
        if request.top_k < 1 {
            return Err(GatewayError::Validation("top_k must be >= 1".to_string()));
        }
        if request.top_k > self.retrieval.max_top_k {
            return Err(GatewayError::Validation(format!(
                "top_k {} exceeds maximum of {}",
                request.top_k, self.retrieval.max_top_k
            )));
        }

        let partitions = match partition::resolve_read(caller, request.scope) {
            Ok(partitions) => partitions,
            Err(err) => {
                self.reporter.report_error(&err, None);
                return Err(err);
            }
        };
        if partitions.is_empty() {
            // Unreachable given the resolver's contract; fatal if it happens.
            let err = GatewayError::Resolution("resolved partition set is empty".to_string());
            self.reporter.report_error(&err, None);
            return Err(err);
        }
        let partition_count = partitions.len();

        // Embed once, shared across all partitions in the set.
        let vector = match with_retry(&self.retry, "embed", || {
            self.embedding.embed(&request.text)
        })
        .await
        {
            Ok(vector) => vector,
            Err(err) => {
                self.reporter.report_error(&err, None);
                return Err(err);
            }
        };

        let query_vector = &vector;
        let filter = request.filter.as_ref();
        let top_k = request.top_k;
        let searches = partitions.iter().map(|target| {
            with_retry(&self.retry, "search", move || {
                self.store.query(target, query_vector, top_k, filter)
            })
        });
        let outcomes = join_all(searches).await;

        let mut hits: Vec<SearchHit> = Vec::new();
        let mut degraded: Vec<DegradedPartition> = Vec::new();
        for (target, outcome) in partitions.into_iter().zip(outcomes) {
            match outcome {
                Ok(candidates) => {
                    hits.extend(candidates.into_iter().map(|c| SearchHit {
                        document_id: c.document_id,
                        score: c.score,
                        partition: target.clone(),
                    }));
                }
                Err(err) => {
                    tracing::warn!(partition = %target, "partition degraded: {err}");
                    self.reporter
                        .report(FailureEvent::from_error(&err, Some(target.clone())));
                    degraded.push(DegradedPartition {
                        partition: target,
                        kind: err.kind(),
                    });
                }
            }
        }

        if degraded.len() == partition_count {
            return Err(GatewayError::Unavailable(format!(
                "query: all {partition_count} target partition(s) failed"
            )));
        }

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        hits.truncate(request.top_k);

        Ok(QueryOutcome {
            hits,
            partial: !degraded.is_empty(),
            degraded,
        })
    }
}
