//! Core data types flowing through the ingestion and query pipelines.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, GatewayError};

/// Opaque caller identity resolved by the external auth capability.
///
/// Used only as a partition key; never persisted beyond request scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        CallerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A scalar metadata value attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Document metadata: a flat string-to-scalar mapping.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// An AND-of-equalities predicate over document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataFilter(pub BTreeMap<String, MetadataValue>);

impl MetadataFilter {
    /// True when every filter entry is present in `metadata` with an equal value.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.0
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// Caller-facing document shape before embedding.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    /// Caller-supplied id; generated (UUID v4) when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A stored, addressable vector record.
///
/// `vector` is derived, never caller-supplied, and always exactly the
/// configured dimensionality. Documents are immutable except for full
/// replace-upsert keyed by `id`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub vector: Vec<f32>,
}

/// Request-declared target corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Shared,
    Private,
    Both,
}

/// A logical, isolated storage region within the vector backend.
///
/// `Private` partitions are only ever constructed by the resolver from the
/// authenticated caller's id — request input cannot name another tenant's
/// partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Shared,
    Private(CallerId),
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Shared => f.write_str("shared"),
            Partition::Private(owner) => write!(f, "private:{owner}"),
        }
    }
}

/// A validated similarity query.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub text: String,
    pub scope: Scope,
    pub top_k: usize,
    pub filter: Option<MetadataFilter>,
}

/// A single ranked match.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document_id: String,
    pub score: f32,
    pub partition: Partition,
}

/// A partition that could not be reached during a query.
#[derive(Debug, Clone, Serialize)]
pub struct DegradedPartition {
    pub partition: Partition,
    pub kind: ErrorKind,
}

/// Outcome of a similarity query.
///
/// `hits` is sorted by score descending with ties broken by `document_id`
/// ascending, truncated to the requested top-K. `partial` is true when one
/// or more target partitions were unreachable but at least one succeeded —
/// degraded results are always labeled, never presented as complete.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub hits: Vec<SearchHit>,
    pub partial: bool,
    pub degraded: Vec<DegradedPartition>,
}

/// A normalized internal failure, forwarded to the notification capability.
#[derive(Debug, Clone, Serialize)]
pub struct FailureEvent {
    pub kind: ErrorKind,
    pub partition: Option<Partition>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureEvent {
    pub fn from_error(error: &GatewayError, partition: Option<Partition>) -> Self {
        FailureEvent {
            kind: error.kind(),
            partition,
            detail: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}
