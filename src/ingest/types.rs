//! Data model and error definitions for the ingestion pipeline.

use crate::elastic::ElasticError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Author recorded when a book has no usable `Author:` line.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Book-level metadata shared by every paragraph of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    /// Value of the `Title:` line.
    pub title: String,
    /// Value of the `Author:` line, or [`UNKNOWN_AUTHOR`].
    pub author: String,
}

/// One cleaned paragraph and its position within the book body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Zero-based, contiguous position among the surviving paragraphs.
    pub ordinal: usize,
    /// Non-empty paragraph text.
    pub text: String,
}

/// Result of parsing one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBook {
    /// Title and author.
    pub metadata: BookMetadata,
    /// Paragraphs in body order; `paragraphs[i].ordinal == i`.
    pub paragraphs: Vec<Paragraph>,
}

/// Structural problems that make a source file unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionError {
    /// No non-blank `Title:` line.
    #[error("no `Title:` line found")]
    MissingTitle,
    /// No `*** START OF ... ***` line.
    #[error("no body start marker found")]
    MissingStartMarker,
    /// No `*** END OF ... ***` line.
    #[error("no body end marker found")]
    MissingEndMarker,
    /// The only end marker precedes the start marker.
    #[error("body end marker precedes the start marker")]
    MarkersOutOfOrder,
}

/// Counters for a book that was written completely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadResult {
    /// Documents acknowledged by the engine.
    pub paragraphs_written: usize,
    /// Bulk requests issued.
    pub batches: usize,
}

/// Unrecoverable write failure for one book. Remaining batches of that book are skipped.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The engine acknowledged fewer documents than were sent, or flagged an item.
    #[error(
        "batch {batch} accepted {accepted} of {submitted} documents: {}",
        .detail.as_deref().unwrap_or("count mismatch")
    )]
    BatchMismatch {
        /// Zero-based index of the failing batch.
        batch: usize,
        /// Documents in the failing batch.
        submitted: usize,
        /// Documents the engine accepted from it.
        accepted: usize,
        /// Documents fully written by earlier batches.
        written: usize,
        /// First per-item error reported by the engine.
        detail: Option<String>,
    },
    /// The engine could not be reached while submitting a batch.
    #[error("engine unreachable while writing batch {batch}: {source}")]
    EngineUnreachable {
        /// Zero-based index of the failing batch.
        batch: usize,
        /// Documents fully written by earlier batches.
        written: usize,
        /// Transport error.
        #[source]
        source: ElasticError,
    },
    /// The engine answered the bulk request with an error.
    #[error("engine rejected batch {batch}: {source}")]
    BatchRejected {
        /// Zero-based index of the failing batch.
        batch: usize,
        /// Documents fully written by earlier batches.
        written: usize,
        /// Engine error.
        #[source]
        source: ElasticError,
    },
}

impl LoadError {
    /// Documents written before the failure; they are not rolled back.
    pub fn paragraphs_written(&self) -> usize {
        match self {
            Self::BatchMismatch { written, .. }
            | Self::EngineUnreachable { written, .. }
            | Self::BatchRejected { written, .. } => *written,
        }
    }
}

/// Failures that leave the index in an unknown state; the run must not continue.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Health checks kept failing until the retry policy was exhausted.
    #[error("search engine unreachable after {attempts} attempts: {source}")]
    Unreachable {
        /// Health probes issued.
        attempts: u32,
        /// Error from the last probe.
        #[source]
        source: ElasticError,
    },
    /// The connectivity check was cancelled before the index was touched.
    #[error("connectivity check cancelled")]
    Cancelled,
    /// Deleting, creating or mapping the index failed.
    #[error("index reset failed: {0}")]
    Engine(#[from] ElasticError),
}

/// Fatal errors for a whole ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The index could not be prepared.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// The source directory could not be enumerated.
    #[error("failed to read source directory {}: {source}", .path.display())]
    Directory {
        /// Directory being scanned.
        path: PathBuf,
        /// Underlying traversal error.
        #[source]
        source: walkdir::Error,
    },
}

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Every paragraph was written.
    Indexed {
        /// Book title.
        title: String,
        /// Book author.
        author: String,
        /// Paragraphs written.
        paragraphs: usize,
        /// Bulk requests issued.
        batches: usize,
    },
    /// The file could not be read.
    Unreadable {
        /// I/O error message.
        reason: String,
    },
    /// The file was read but is not a well-formed book.
    ExtractionFailed {
        /// Which structural element was missing.
        kind: ExtractionError,
    },
    /// Writing the book's paragraphs failed part-way.
    LoadFailed {
        /// Book title.
        title: String,
        /// Paragraphs written before the failure.
        paragraphs_written: usize,
        /// Error message.
        reason: String,
    },
}

impl FileOutcome {
    /// True for [`FileOutcome::Indexed`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }
}

/// Outcome for one file, keyed by its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Source file path.
    pub path: PathBuf,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Aggregate outcome of an ingestion run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    /// One entry per processed file.
    pub files: Vec<FileReport>,
    /// The run stopped early on request; unprocessed files have no entry.
    pub interrupted: bool,
}

impl IngestionReport {
    pub(crate) fn record(&mut self, path: &Path, outcome: FileOutcome) {
        self.files.push(FileReport {
            path: path.to_path_buf(),
            outcome,
        });
    }

    /// Files whose paragraphs were all written.
    pub fn succeeded(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| file.outcome.is_success())
    }

    /// Files that failed at any stage.
    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| !file.outcome.is_success())
    }

    /// Total paragraphs written, including partial writes of failed books.
    pub fn paragraphs_written(&self) -> usize {
        self.files
            .iter()
            .map(|file| match &file.outcome {
                FileOutcome::Indexed { paragraphs, .. } => *paragraphs,
                FileOutcome::LoadFailed {
                    paragraphs_written, ..
                } => *paragraphs_written,
                _ => 0,
            })
            .sum()
    }

    /// Every file succeeded and the run was not interrupted.
    pub fn is_clean(&self) -> bool {
        !self.interrupted && self.failed().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_partitions_outcomes_and_sums_writes() {
        let mut report = IngestionReport::default();
        report.record(
            Path::new("books/a.txt"),
            FileOutcome::Indexed {
                title: "A".into(),
                author: UNKNOWN_AUTHOR.into(),
                paragraphs: 10,
                batches: 1,
            },
        );
        report.record(
            Path::new("books/b.txt"),
            FileOutcome::ExtractionFailed {
                kind: ExtractionError::MissingTitle,
            },
        );
        report.record(
            Path::new("books/c.txt"),
            FileOutcome::LoadFailed {
                title: "C".into(),
                paragraphs_written: 4,
                reason: "boom".into(),
            },
        );

        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.failed().count(), 2);
        assert_eq!(report.paragraphs_written(), 14);
        assert!(!report.is_clean());
    }

    #[test]
    fn report_serializes_with_status_tags() {
        let mut report = IngestionReport::default();
        report.record(
            Path::new("b.txt"),
            FileOutcome::ExtractionFailed {
                kind: ExtractionError::MarkersOutOfOrder,
            },
        );

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["files"][0]["status"], "extraction_failed");
        assert_eq!(json["files"][0]["kind"], "markers_out_of_order");
        assert_eq!(json["files"][0]["path"], "b.txt");
        assert_eq!(json["interrupted"], false);
    }

    #[test]
    fn load_error_reports_partial_progress() {
        let err = LoadError::BatchMismatch {
            batch: 2,
            submitted: 500,
            accepted: 499,
            written: 1000,
            detail: None,
        };
        assert_eq!(err.paragraphs_written(), 1000);
        assert_eq!(
            err.to_string(),
            "batch 2 accepted 499 of 500 documents: count mismatch"
        );
    }
}
