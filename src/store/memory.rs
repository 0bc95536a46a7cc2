//! In-memory [`VectorStore`] for tests and single-process deployments.
//!
//! Brute-force cosine similarity over all stored vectors, per partition.
//! Uses `std::sync::RwLock` — no lock is ever held across an await point
//! because all operations complete synchronously.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::GatewayResult;
use crate::models::{Document, MetadataFilter, Partition};

use super::{ScoredId, VectorStore};

#[derive(Default)]
pub struct InMemoryVectorStore {
    partitions: RwLock<HashMap<Partition, BTreeMap<String, Document>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored in a partition.
    pub fn len(&self, partition: &Partition) -> usize {
        self.partitions
            .read()
            .unwrap()
            .get(partition)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, partition: &Partition) -> bool {
        self.len(partition) == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, partition: &Partition, document: &Document) -> GatewayResult<()> {
        let mut partitions = self.partitions.write().unwrap();
        partitions
            .entry(partition.clone())
            .or_default()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn query(
        &self,
        partition: &Partition,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> GatewayResult<Vec<ScoredId>> {
        let partitions = self.partitions.read().unwrap();
        let docs = match partitions.get(partition) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };

        let mut candidates: Vec<ScoredId> = docs
            .values()
            .filter(|doc| filter.map_or(true, |f| f.matches(&doc.metadata)))
            .map(|doc| ScoredId {
                document_id: doc.id.clone(),
                score: cosine_similarity(vector, &doc.vector),
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        candidates.truncate(top_k);
        Ok(candidates)
    }

    async fn delete(&self, partition: &Partition, id: &str) -> GatewayResult<()> {
        let mut partitions = self.partitions.write().unwrap();
        if let Some(docs) = partitions.get_mut(partition) {
            docs.remove(id);
        }
        Ok(())
    }
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
