//! Elasticsearch integration over its REST API.

pub mod client;
pub mod types;

pub use client::{ElasticService, ElasticSettings};
pub use types::{
    BulkSummary, ClusterHealth, ElasticError, IndexDocument, ScoredDocument, SearchPage,
    document_schema,
};
