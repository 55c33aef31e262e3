//! HTTP client wrapper for interacting with Elasticsearch.

use crate::config::{Config, DEFAULT_INDEX_NAME, DEFAULT_REQUEST_TIMEOUT};
use crate::elastic::types::{
    BulkResponse, BulkSummary, ClusterHealth, ElasticError, IndexDocument, ScoredDocument,
    SearchPage, SearchResponse, SearchTotal,
};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Upper bound on establishing a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`ElasticService::connect`].
#[derive(Debug, Clone)]
pub struct ElasticSettings {
    /// Base URL of the Elasticsearch node.
    pub url: String,
    /// Index all operations target.
    pub index: String,
    /// Optional legacy mapping type name.
    pub doc_type: Option<String>,
    /// Upper bound on a whole request, connection included.
    pub timeout: Duration,
}

impl Default for ElasticSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".into(),
            index: DEFAULT_INDEX_NAME.into(),
            doc_type: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ElasticSettings {
    /// Derive connection settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.elastic_url.clone(),
            index: config.index_name.clone(),
            doc_type: config.doc_type.clone(),
            timeout: config.request_timeout,
        }
    }
}

/// Explicit handle over one Elasticsearch index.
///
/// Built once by [`ElasticService::connect`] and passed to the lifecycle manager, the batch
/// loader and the query service. [`ElasticService::close`] ends its lifetime.
pub struct ElasticService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) index: String,
    pub(crate) doc_type: Option<String>,
}

impl ElasticService {
    /// Build a client for the configured node. No request is made until the first call.
    pub fn connect(settings: &ElasticSettings) -> Result<Self, ElasticError> {
        let client = Client::builder()
            .user_agent("gutensearch/0.1")
            .connect_timeout(settings.timeout.min(CONNECT_TIMEOUT))
            .timeout(settings.timeout)
            .build()?;
        let base_url = normalize_base_url(&settings.url).map_err(ElasticError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            index = %settings.index,
            doc_type = ?settings.doc_type,
            timeout_ms = settings.timeout.as_millis() as u64,
            "Initialized Elasticsearch HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            index: settings.index.clone(),
            doc_type: settings.doc_type.clone(),
        })
    }

    /// Release the handle.
    pub fn close(self) {
        tracing::debug!(url = %self.base_url, index = %self.index, "Closed Elasticsearch client");
    }

    /// Name of the index this handle targets.
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Query cluster health; succeeds as soon as the node answers.
    pub async fn cluster_health(&self) -> Result<ClusterHealth, ElasticError> {
        let response = self.request(Method::GET, "_cluster/health").send().await?;
        let response = self.ensure_success(response).await?;
        Ok(response.json().await?)
    }

    /// Whether the target index currently exists.
    pub async fn index_exists(&self) -> Result<bool, ElasticError> {
        let response = self.request(Method::HEAD, &self.index).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = ElasticError::UnexpectedStatus { status, body };
                tracing::error!(index = %self.index, error = %error, "Index existence check failed");
                Err(error)
            }
        }
    }

    /// Delete the target index. A missing index is not an error.
    pub async fn delete_index(&self) -> Result<(), ElasticError> {
        let response = self.request(Method::DELETE, &self.index).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(index = %self.index, "Index already absent");
            return Ok(());
        }
        self.ensure_success(response).await?;
        tracing::debug!(index = %self.index, "Index deleted");
        Ok(())
    }

    /// Create the target index with default settings.
    pub async fn create_index(&self) -> Result<(), ElasticError> {
        let response = self.request(Method::PUT, &self.index).send().await?;
        self.ensure_success(response).await?;
        tracing::debug!(index = %self.index, "Index created");
        Ok(())
    }

    /// Apply a field mapping (`properties`) to the target index.
    pub async fn put_mapping(&self, properties: &Value) -> Result<(), ElasticError> {
        let path = match &self.doc_type {
            Some(doc_type) => format!("{}/_mapping/{doc_type}", self.index),
            None => format!("{}/_mapping", self.index),
        };
        let response = self
            .request(Method::PUT, &path)
            .json(&json!({ "properties": properties }))
            .send()
            .await?;
        self.ensure_success(response).await?;
        tracing::debug!(index = %self.index, "Mapping applied");
        Ok(())
    }

    /// Submit documents in one `_bulk` request and summarize the per-item results.
    pub async fn bulk_index(&self, documents: &[IndexDocument]) -> Result<BulkSummary, ElasticError> {
        if documents.is_empty() {
            return Ok(BulkSummary::default());
        }

        let body = encode_bulk_body(&self.index, self.doc_type.as_deref(), documents)?;
        let response = self
            .request(Method::POST, &format!("{}/_bulk", self.index))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let response = self.ensure_success(response).await?;
        let payload: BulkResponse = response.json().await?;

        let mut summary = BulkSummary {
            submitted: documents.len(),
            ..BulkSummary::default()
        };
        for item in payload.items.into_iter().flat_map(|entry| entry.into_values()) {
            match item.error {
                Some(error) => {
                    summary.first_error.get_or_insert_with(|| describe_item_error(&error));
                }
                None if (200..300).contains(&item.status) => summary.accepted += 1,
                None => {
                    summary
                        .first_error
                        .get_or_insert_with(|| format!("item rejected with status {}", item.status));
                }
            }
        }

        tracing::debug!(
            index = %self.index,
            submitted = summary.submitted,
            accepted = summary.accepted,
            "Bulk request applied"
        );
        Ok(summary)
    }

    /// Make recently written documents visible to search.
    pub async fn refresh(&self) -> Result<(), ElasticError> {
        let response = self
            .request(Method::POST, &format!("{}/_refresh", self.index))
            .send()
            .await?;
        self.ensure_success(response).await?;
        Ok(())
    }

    /// Run a search request body against the target index.
    pub async fn search(&self, body: &Value) -> Result<SearchPage, ElasticError> {
        let response = self
            .request(Method::POST, &format!("{}/_search", self.index))
            .json(body)
            .send()
            .await?;
        let response = self.ensure_success(response).await?;
        let payload: SearchResponse = response.json().await?;

        let total = match payload.hits.total {
            Some(SearchTotal::Count(value)) | Some(SearchTotal::Object { value }) => value,
            None => payload.hits.hits.len() as u64,
        };
        let hits = payload
            .hits
            .hits
            .into_iter()
            .map(|hit| ScoredDocument {
                id: hit.id,
                score: hit.score,
                document: hit.source,
                highlights: hit
                    .highlight
                    .and_then(|mut fields| fields.remove("text"))
                    .map(string_array)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(SearchPage { total, hits })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format_endpoint(&self.base_url, path))
    }

    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ElasticError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let error = ElasticError::UnexpectedStatus { status, body };
        tracing::error!(url = %url, error = %error, "Elasticsearch request failed");
        Err(error)
    }
}

/// Build the NDJSON payload: one action line followed by one source line per document.
pub(crate) fn encode_bulk_body(
    index: &str,
    doc_type: Option<&str>,
    documents: &[IndexDocument],
) -> Result<String, ElasticError> {
    let mut action = json!({ "index": { "_index": index } });
    if let Some(doc_type) = doc_type {
        action["index"]["_type"] = Value::String(doc_type.to_string());
    }
    let action_line = serde_json::to_string(&action)?;

    let mut body = String::new();
    for document in documents {
        body.push_str(&action_line);
        body.push('\n');
        body.push_str(&serde_json::to_string(document)?);
        body.push('\n');
    }
    Ok(body)
}

fn describe_item_error(error: &Value) -> String {
    let kind = error.get("type").and_then(Value::as_str);
    let reason = error.get("reason").and_then(Value::as_str);
    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (None, Some(reason)) => reason.to_string(),
        _ => error.to_string(),
    }
}

fn string_array(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        Value::String(text) => vec![text],
        _ => Vec::new(),
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{DELETE, GET, HEAD, POST},
        MockServer,
    };

    fn service(server: &MockServer, doc_type: Option<&str>) -> ElasticService {
        ElasticService::connect(&ElasticSettings {
            url: server.base_url(),
            index: "library".into(),
            doc_type: doc_type.map(str::to_string),
            ..ElasticSettings::default()
        })
        .expect("client")
    }

    fn document(location: usize, text: &str) -> IndexDocument {
        IndexDocument {
            title: "A Study".into(),
            author: "Unknown Author".into(),
            location,
            text: text.into(),
        }
    }

    #[test]
    fn bulk_body_pairs_actions_with_documents() {
        let body = encode_bulk_body(
            "library",
            Some("novel"),
            &[document(0, "Para one."), document(1, "Para two.")],
        )
        .expect("body");
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));
        let action: Value = serde_json::from_str(lines[0]).expect("action json");
        assert_eq!(action["index"]["_index"], "library");
        assert_eq!(action["index"]["_type"], "novel");
        let source: IndexDocument = serde_json::from_str(lines[3]).expect("source json");
        assert_eq!(source, document(1, "Para two."));
    }

    #[test]
    fn endpoints_join_without_doubled_slashes() {
        assert_eq!(
            normalize_base_url("http://localhost:9200/").expect("url"),
            "http://localhost:9200/"
        );
        assert_eq!(
            format_endpoint("http://localhost:9200/", "/library/_bulk"),
            "http://localhost:9200/library/_bulk"
        );
        assert!(normalize_base_url("not a url").is_err());
    }

    #[tokio::test]
    async fn bulk_index_counts_accepted_items() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/library/_bulk")
                    .header("content-type", "application/x-ndjson")
                    .body_contains("\"location\":1");
                then.status(200).json_body(json!({
                    "took": 3,
                    "errors": false,
                    "items": [
                        { "index": { "_id": "a", "status": 201 } },
                        { "index": { "_id": "b", "status": 201 } }
                    ]
                }));
            })
            .await;

        let summary = service(&server, None)
            .bulk_index(&[document(0, "Para one."), document(1, "Para two.")])
            .await
            .expect("bulk");

        mock.assert_async().await;
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.accepted, 2);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn bulk_index_surfaces_item_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/library/_bulk");
                then.status(200).json_body(json!({
                    "errors": true,
                    "items": [
                        { "index": { "status": 201 } },
                        { "index": { "status": 400, "error": {
                            "type": "mapper_parsing_exception",
                            "reason": "failed to parse field [location]"
                        } } }
                    ]
                }));
            })
            .await;

        let summary = service(&server, None)
            .bulk_index(&[document(0, "one"), document(1, "two")])
            .await
            .expect("bulk");

        assert_eq!(summary.accepted, 1);
        assert!(!summary.is_complete());
        assert_eq!(
            summary.first_error.as_deref(),
            Some("mapper_parsing_exception: failed to parse field [location]")
        );
    }

    #[tokio::test]
    async fn bulk_index_skips_request_for_empty_batch() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/library/_bulk");
                then.status(200).json_body(json!({ "items": [] }));
            })
            .await;

        let summary = service(&server, None).bulk_index(&[]).await.expect("bulk");

        assert_eq!(mock.hits_async().await, 0);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn index_lifecycle_calls_map_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/library");
                then.status(404);
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/library");
                then.status(404).json_body(json!({ "error": "index_not_found_exception" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/_cluster/health");
                then.status(200).json_body(json!({
                    "cluster_name": "docker-cluster",
                    "status": "yellow",
                    "number_of_nodes": 1
                }));
            })
            .await;

        let service = service(&server, None);
        assert!(!service.index_exists().await.expect("exists"));
        service.delete_index().await.expect("delete tolerates 404");
        delete.assert_async().await;
        let health = service.cluster_health().await.expect("health");
        assert_eq!(health.status, "yellow");
        assert_eq!(health.number_of_nodes, 1);
    }

    #[tokio::test]
    async fn search_maps_hits_and_highlights() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/library/_search")
                    .json_body_partial(r#"{ "query": { "match": { "text": "opium" } } }"#);
                then.status(200).json_body(json!({
                    "hits": {
                        "total": { "value": 7, "relation": "eq" },
                        "hits": [
                            {
                                "_id": "x1",
                                "_score": 1.5,
                                "_source": {
                                    "title": "The Man with the Twisted Lip",
                                    "author": "Arthur Conan Doyle",
                                    "location": 12,
                                    "text": "an opium den"
                                },
                                "highlight": { "text": ["an <em>opium</em> den"] }
                            }
                        ]
                    }
                }));
            })
            .await;

        let page = service(&server, None)
            .search(&json!({ "query": { "match": { "text": "opium" } } }))
            .await
            .expect("search");

        mock.assert_async().await;
        assert_eq!(page.total, 7);
        assert_eq!(page.hits.len(), 1);
        let hit = &page.hits[0];
        assert_eq!(hit.id, "x1");
        assert_eq!(hit.document.location, 12);
        assert_eq!(hit.highlights, vec!["an <em>opium</em> den".to_string()]);
    }

    #[tokio::test]
    async fn unexpected_status_carries_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/library/_refresh");
                then.status(503).body("unavailable");
            })
            .await;

        let err = service(&server, None).refresh().await.expect_err("refresh fails");
        match err {
            ElasticError::UnexpectedStatus { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
