//! Bulk loading of one book's paragraphs in bounded, ordered batches.

use super::types::{BookMetadata, LoadError, LoadResult, Paragraph};
use crate::elastic::{BulkSummary, ElasticError, ElasticService, IndexDocument};
use async_trait::async_trait;

/// Write side of the search engine used by the loader.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Submit one batch of documents in a single bulk request.
    async fn bulk_index(&self, documents: &[IndexDocument]) -> Result<BulkSummary, ElasticError>;
}

#[async_trait]
impl DocumentStore for ElasticService {
    async fn bulk_index(&self, documents: &[IndexDocument]) -> Result<BulkSummary, ElasticError> {
        ElasticService::bulk_index(self, documents).await
    }
}

/// Converts paragraphs into index documents and writes them batch by batch.
///
/// Batches are submitted sequentially in ordinal order and each one is verified before the
/// next is sent, so a failure always names the exact batch that broke.
pub struct BatchLoader<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: DocumentStore + ?Sized> BatchLoader<'a, S> {
    /// Create a loader; a `batch_size` of zero is treated as one.
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Maximum number of documents per bulk request.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write every paragraph of one book.
    pub async fn load(
        &self,
        metadata: &BookMetadata,
        paragraphs: &[Paragraph],
    ) -> Result<LoadResult, LoadError> {
        let mut result = LoadResult::default();

        for (batch, chunk) in paragraphs.chunks(self.batch_size).enumerate() {
            let documents: Vec<IndexDocument> = chunk
                .iter()
                .map(|paragraph| to_document(metadata, paragraph))
                .collect();
            let written = result.paragraphs_written;

            let summary = self.store.bulk_index(&documents).await.map_err(|source| {
                if source.is_unreachable() {
                    LoadError::EngineUnreachable {
                        batch,
                        written,
                        source,
                    }
                } else {
                    LoadError::BatchRejected {
                        batch,
                        written,
                        source,
                    }
                }
            })?;
            result.batches += 1;

            if summary.submitted != documents.len() || !summary.is_complete() {
                tracing::warn!(
                    title = %metadata.title,
                    batch,
                    submitted = documents.len(),
                    accepted = summary.accepted,
                    error = ?summary.first_error,
                    "Bulk batch only partially accepted"
                );
                return Err(LoadError::BatchMismatch {
                    batch,
                    submitted: documents.len(),
                    accepted: summary.accepted,
                    written,
                    detail: summary.first_error,
                });
            }

            result.paragraphs_written += documents.len();
            tracing::info!(
                title = %metadata.title,
                first = chunk[0].ordinal,
                last = chunk[chunk.len() - 1].ordinal,
                "Indexed paragraphs"
            );
        }

        Ok(result)
    }
}

fn to_document(metadata: &BookMetadata, paragraph: &Paragraph) -> IndexDocument {
    IndexDocument {
        title: metadata.title.clone(),
        author: metadata.author.clone(),
        location: paragraph.ordinal,
        text: paragraph.text.clone(),
    }
}
