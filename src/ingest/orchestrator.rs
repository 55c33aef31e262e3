//! Walks the source directory and drives extraction and loading for each book.

use super::extract::extract;
use super::lifecycle::IndexLifecycle;
use super::loader::{BatchLoader, DocumentStore};
use super::types::{FileOutcome, IngestError, IngestionReport};
use crate::config::ConnectPolicy;
use crate::elastic::ElasticService;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Extension (case-insensitive) of files treated as books.
pub const SOURCE_EXTENSION: &str = "txt";

/// Sequential per-book ingestion over one directory.
pub struct Ingestor<'a, S: DocumentStore + ?Sized> {
    loader: BatchLoader<'a, S>,
    cancel: CancellationToken,
}

impl<'a, S: DocumentStore + ?Sized> Ingestor<'a, S> {
    /// Create an ingestor writing through `store` in batches of `batch_size`.
    pub fn new(store: &'a S, batch_size: usize, cancel: CancellationToken) -> Self {
        Self {
            loader: BatchLoader::new(store, batch_size),
            cancel,
        }
    }

    /// Ingest every book in `source_dir`, one at a time, in file-name order.
    ///
    /// Per-file failures are recorded in the report and never abort the run; only failing to
    /// enumerate the directory does.
    pub async fn run(&self, source_dir: &Path) -> Result<IngestionReport, IngestError> {
        let files = list_source_files(source_dir)?;
        tracing::info!(dir = %source_dir.display(), files = files.len(), "Found source files");

        let mut report = IngestionReport::default();
        for path in files {
            if self.cancel.is_cancelled() {
                tracing::warn!(next = %path.display(), "Ingestion interrupted before next book");
                report.interrupted = true;
                break;
            }
            let outcome = self.ingest_file(&path).await;
            report.record(&path, outcome);
        }

        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            paragraphs = report.paragraphs_written(),
            interrupted = report.interrupted,
            "Ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_file(&self, path: &Path) -> FileOutcome {
        tracing::info!(file = %path.display(), "Reading file");
        let raw = match tokio::fs::read(path).await {
            Ok(bytes) => decode(path, bytes),
            Err(err) => {
                tracing::error!(file = %path.display(), error = %err, "Failed to read file");
                return FileOutcome::Unreadable {
                    reason: err.to_string(),
                };
            }
        };

        let book = match extract(&raw) {
            Ok(book) => book,
            Err(kind) => {
                tracing::warn!(file = %path.display(), error = %kind, "Skipping malformed book");
                return FileOutcome::ExtractionFailed { kind };
            }
        };
        drop(raw);
        tracing::info!(
            title = %book.metadata.title,
            author = %book.metadata.author,
            paragraphs = book.paragraphs.len(),
            "Parsed book"
        );

        match self.loader.load(&book.metadata, &book.paragraphs).await {
            Ok(result) => FileOutcome::Indexed {
                title: book.metadata.title,
                author: book.metadata.author,
                paragraphs: result.paragraphs_written,
                batches: result.batches,
            },
            Err(err) => {
                tracing::error!(title = %book.metadata.title, error = %err, "Failed to index book");
                FileOutcome::LoadFailed {
                    paragraphs_written: err.paragraphs_written(),
                    title: book.metadata.title,
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Regular `.txt` files directly inside `dir`, sorted by file name.
pub fn list_source_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| IngestError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;
        let is_source = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if is_source {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn decode(path: &Path, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(file = %path.display(), "File is not valid UTF-8; decoding lossily");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

/// Full ingestion run: wait for the engine, reset the index, load every book, refresh.
pub async fn run_ingestion(
    elastic: &ElasticService,
    policy: ConnectPolicy,
    source_dir: &Path,
    batch_size: usize,
    cancel: &CancellationToken,
) -> Result<IngestionReport, IngestError> {
    IndexLifecycle::new(elastic, policy).prepare(cancel).await?;

    let report = Ingestor::new(elastic, batch_size, cancel.clone())
        .run(source_dir)
        .await?;

    if let Err(err) = elastic.refresh().await {
        tracing::warn!(error = %err, "Index refresh after ingestion failed");
    }
    Ok(report)
}
