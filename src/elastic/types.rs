//! Shared types used by the Elasticsearch client and its callers.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Errors returned while interacting with Elasticsearch.
#[derive(Debug, Error)]
pub enum ElasticError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Elasticsearch URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Elasticsearch responded with an unexpected status code.
    #[error("Unexpected Elasticsearch response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Elasticsearch.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A document could not be serialized into the bulk payload.
    #[error("Failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ElasticError {
    /// True when the engine could not be reached at all (refused connection, timeout).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Http(err) if err.is_connect() || err.is_timeout())
    }
}

/// Persisted form of one paragraph, as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Title of the book the paragraph belongs to.
    pub title: String,
    /// Author of the book.
    pub author: String,
    /// Zero-based ordinal of the paragraph within the book.
    pub location: usize,
    /// Cleaned paragraph text.
    pub text: String,
}

/// Field mapping applied to the index on every reset.
pub fn document_schema() -> Value {
    serde_json::json!({
        "title": { "type": "keyword" },
        "author": { "type": "keyword" },
        "location": { "type": "integer" },
        "text": { "type": "text" }
    })
}

/// Outcome of one bulk request as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    /// Number of documents sent in the request.
    pub submitted: usize,
    /// Number of documents the engine acknowledged without an item error.
    pub accepted: usize,
    /// First per-item error reported by the engine, if any.
    pub first_error: Option<String>,
}

impl BulkSummary {
    /// Every submitted document was accepted.
    pub fn is_complete(&self) -> bool {
        self.accepted == self.submitted && self.first_error.is_none()
    }
}

/// Subset of `GET /_cluster/health` we log on connect.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name reported by the engine.
    #[serde(default)]
    pub cluster_name: String,
    /// Health colour (`green`, `yellow`, `red`).
    #[serde(default)]
    pub status: String,
    /// Number of nodes in the cluster.
    #[serde(default)]
    pub number_of_nodes: u64,
}

/// One ranked hit returned by a search request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    /// Engine-assigned document id.
    pub id: String,
    /// Relevance score; absent for sorted (non-scored) queries.
    pub score: Option<f64>,
    /// Stored document.
    pub document: IndexDocument,
    /// Highlighted `text` fragments, empty when highlighting was not requested.
    pub highlights: Vec<String>,
}

/// A page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchPage {
    /// Total number of matching documents in the index.
    pub total: u64,
    /// Hits on this page, in engine order.
    pub hits: Vec<ScoredDocument>,
}

#[derive(Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub(crate) items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Deserialize)]
pub(crate) struct BulkItem {
    pub(crate) status: u16,
    #[serde(default)]
    pub(crate) error: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) hits: SearchHits,
}

#[derive(Deserialize)]
pub(crate) struct SearchHits {
    #[serde(default)]
    pub(crate) total: Option<SearchTotal>,
    #[serde(default)]
    pub(crate) hits: Vec<SearchHit>,
}

// Pre-7.0 engines report a bare number.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum SearchTotal {
    Count(u64),
    Object { value: u64 },
}

#[derive(Deserialize)]
pub(crate) struct SearchHit {
    #[serde(rename = "_id")]
    pub(crate) id: String,
    #[serde(rename = "_score", default)]
    pub(crate) score: Option<f64>,
    #[serde(rename = "_source")]
    pub(crate) source: IndexDocument,
    #[serde(default)]
    pub(crate) highlight: Option<Map<String, Value>>,
}
