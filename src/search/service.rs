//! Read-side query service used by the HTTP surface.

use super::queries::{MAX_RANGE_SIZE, paragraph_range_query, term_query};
use crate::elastic::{ElasticError, ElasticService, IndexDocument, SearchPage};
use async_trait::async_trait;
use thiserror::Error;

/// Longest accepted search term, in characters.
pub const TERM_MAX_LEN: usize = 60;
/// Longest accepted book title, in characters.
pub const TITLE_MAX_LEN: usize = 256;

/// Errors emitted by term search and paragraph retrieval.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Term was empty or longer than [`TERM_MAX_LEN`].
    #[error("term must be between 1 and 60 characters")]
    InvalidTerm,
    /// Title was empty or longer than [`TITLE_MAX_LEN`].
    #[error("bookTitle must be between 1 and 256 characters")]
    InvalidTitle,
    /// `end` did not exceed `start`.
    #[error("end ({end}) must be greater than start ({start})")]
    InvalidRange {
        /// Requested first location.
        start: usize,
        /// Requested last location.
        end: usize,
    },
    /// The range covers more than [`MAX_RANGE_SIZE`] paragraphs.
    #[error("range [{start}, {end}] covers more than 10000 paragraphs")]
    RangeTooWide {
        /// Requested first location.
        start: usize,
        /// Requested last location.
        end: usize,
    },
    /// The engine request failed.
    #[error("search request failed: {0}")]
    Elastic(#[from] ElasticError),
}

impl SearchError {
    /// True for errors caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        !matches!(self, Self::Elastic(_))
    }
}

/// Query operations exposed to the HTTP layer.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Ranked paragraphs matching `term`, with highlighted snippets.
    async fn query_term(&self, term: &str, offset: usize) -> Result<SearchPage, SearchError>;

    /// Paragraphs of `book_title` with location in `[start, end]`, ascending.
    async fn get_paragraphs(
        &self,
        book_title: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<IndexDocument>, SearchError>;
}

/// Query service over the populated index.
pub struct SearchService {
    elastic: ElasticService,
}

impl SearchService {
    /// Wrap an engine handle.
    pub fn new(elastic: ElasticService) -> Self {
        Self { elastic }
    }

    /// Release the engine handle.
    pub fn close(self) {
        self.elastic.close();
    }

    /// Ranked paragraphs matching `term`, with highlighted snippets.
    pub async fn query_term(&self, term: &str, offset: usize) -> Result<SearchPage, SearchError> {
        let term = term.trim();
        if term.is_empty() || term.chars().count() > TERM_MAX_LEN {
            return Err(SearchError::InvalidTerm);
        }

        let page = self.elastic.search(&term_query(term, offset)).await?;
        tracing::debug!(term, offset, total = page.total, hits = page.hits.len(), "Term search");
        Ok(page)
    }

    /// Paragraphs of `book_title` with location in `[start, end]`, ascending.
    pub async fn get_paragraphs(
        &self,
        book_title: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<IndexDocument>, SearchError> {
        if book_title.trim().is_empty() || book_title.chars().count() > TITLE_MAX_LEN {
            return Err(SearchError::InvalidTitle);
        }
        if end <= start {
            return Err(SearchError::InvalidRange { start, end });
        }
        if end - start >= MAX_RANGE_SIZE {
            return Err(SearchError::RangeTooWide { start, end });
        }

        let page = self
            .elastic
            .search(&paragraph_range_query(book_title, start, end))
            .await?;
        let paragraphs: Vec<IndexDocument> = page.hits.into_iter().map(|hit| hit.document).collect();
        tracing::debug!(
            title = book_title,
            start,
            end,
            returned = paragraphs.len(),
            "Paragraph range"
        );
        Ok(paragraphs)
    }
}

#[async_trait]
impl QueryApi for SearchService {
    async fn query_term(&self, term: &str, offset: usize) -> Result<SearchPage, SearchError> {
        SearchService::query_term(self, term, offset).await
    }

    async fn get_paragraphs(
        &self,
        book_title: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<IndexDocument>, SearchError> {
        SearchService::get_paragraphs(self, book_title, start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elastic::ElasticSettings;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn service(url: String) -> SearchService {
        SearchService::new(
            ElasticService::connect(&ElasticSettings {
                url,
                index: "library".into(),
                ..Default::default()
            })
            .expect("client"),
        )
    }

    fn hit(location: usize, text: &str) -> serde_json::Value {
        json!({
            "_id": format!("doc-{location}"),
            "_score": null,
            "_source": {
                "title": "A Study",
                "author": "Unknown Author",
                "location": location,
                "text": text
            },
            "sort": [location]
        })
    }

    #[tokio::test]
    async fn get_paragraphs_returns_inclusive_range_in_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/library/_search").json_body_partial(
                    r#"{
                        "size": 2,
                        "sort": [{ "location": "asc" }],
                        "query": { "bool": { "filter": [
                            { "term": { "title": "A Study" } },
                            { "range": { "location": { "gte": 0, "lte": 1 } } }
                        ] } }
                    }"#,
                );
                then.status(200).json_body(json!({
                    "hits": {
                        "total": { "value": 2, "relation": "eq" },
                        "hits": [hit(0, "Para one."), hit(1, "Para two.with italics.")]
                    }
                }));
            })
            .await;

        let paragraphs = service(server.base_url())
            .get_paragraphs("A Study", 0, 1)
            .await
            .expect("paragraphs");

        mock.assert_async().await;
        let texts: Vec<(usize, &str)> = paragraphs
            .iter()
            .map(|doc| (doc.location, doc.text.as_str()))
            .collect();
        assert_eq!(texts, vec![(0, "Para one."), (1, "Para two.with italics.")]);
    }

    #[tokio::test]
    async fn query_term_sends_trimmed_term() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/library/_search")
                    .json_body_partial(r#"{ "from": 10, "query": { "match": { "text": "hound" } } }"#);
                then.status(200).json_body(json!({
                    "hits": { "total": 0, "hits": [] }
                }));
            })
            .await;

        let page = service(server.base_url())
            .query_term("  hound ", 10)
            .await
            .expect("search");

        mock.assert_async().await;
        assert_eq!(page.total, 0);
        assert!(page.hits.is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_request() {
        let service = service("http://127.0.0.1:1".into());

        assert!(matches!(
            service.query_term("   ", 0).await,
            Err(SearchError::InvalidTerm)
        ));
        assert!(matches!(
            service.query_term(&"x".repeat(TERM_MAX_LEN + 1), 0).await,
            Err(SearchError::InvalidTerm)
        ));
        assert!(matches!(
            service.get_paragraphs("", 0, 10).await,
            Err(SearchError::InvalidTitle)
        ));
        let err = service
            .get_paragraphs("A Study", 5, 5)
            .await
            .expect_err("empty range");
        assert!(err.is_invalid_input());
        assert!(matches!(err, SearchError::InvalidRange { start: 5, end: 5 }));
    }

    #[tokio::test]
    async fn oversized_range_is_rejected_before_any_request() {
        let service = service("http://127.0.0.1:1".into());

        let err = service
            .get_paragraphs("A Study", 0, usize::MAX)
            .await
            .expect_err("range too wide");
        assert!(err.is_invalid_input());
        assert!(matches!(
            err,
            SearchError::RangeTooWide {
                start: 0,
                end: usize::MAX
            }
        ));
        assert!(matches!(
            service.get_paragraphs("A Study", 7, 7 + MAX_RANGE_SIZE).await,
            Err(SearchError::RangeTooWide { .. })
        ));
    }

    #[tokio::test]
    async fn widest_allowed_range_requests_full_window() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/library/_search")
                    .json_body_partial(r#"{ "size": 10000 }"#);
                then.status(200).json_body(json!({
                    "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] }
                }));
            })
            .await;

        let paragraphs = service(server.base_url())
            .get_paragraphs("A Study", 0, MAX_RANGE_SIZE - 1)
            .await
            .expect("paragraphs");

        mock.assert_async().await;
        assert!(paragraphs.is_empty());
    }

    #[tokio::test]
    async fn engine_failure_is_not_invalid_input() {
        let err = service("http://127.0.0.1:1".into())
            .query_term("watson", 0)
            .await
            .expect_err("unreachable");
        assert!(!err.is_invalid_input());
    }
}
