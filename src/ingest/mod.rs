//! Text-ingestion pipeline: extraction, batched loading, orchestration and index lifecycle.

pub mod extract;
pub mod lifecycle;
pub mod loader;
pub mod orchestrator;
pub mod types;

pub use extract::extract;
pub use lifecycle::IndexLifecycle;
pub use loader::{BatchLoader, DocumentStore};
pub use orchestrator::{Ingestor, list_source_files, run_ingestion};
pub use types::{
    BookMetadata, ExtractedBook, ExtractionError, FileOutcome, FileReport, IngestError,
    IngestionReport, LifecycleError, LoadError, LoadResult, Paragraph, UNKNOWN_AUTHOR,
};
