#![warn(missing_docs)]

//! Core library for gutensearch: book ingestion into Elasticsearch and paragraph search.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Elasticsearch REST client.
pub mod elastic;
/// Book parsing, batched loading and index lifecycle.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Term search and paragraph-range queries.
pub mod search;
