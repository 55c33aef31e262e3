//! HTTP surface for gutensearch.
//!
//! - `GET /search?term=&offset=` – ranked paragraphs matching `term` with highlighted
//!   snippets. `term` is required (at most 60 characters); `offset` defaults to `0`.
//! - `GET /paragraphs?bookTitle=&start=&end=` – paragraphs of one book with location in
//!   `[start, end]`, ascending. `start` defaults to `0`, `end` to `10`, and `end` must
//!   exceed `start`. A range may cover at most 10000 paragraphs.
//!
//! Malformed or out-of-range parameters produce `400`; engine failures produce `502`.
//! Every response carries `Access-Control-Allow-Origin: *`.

use crate::elastic::{IndexDocument, SearchPage};
use crate::search::{QueryApi, SearchError};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{
    LatencyUnit,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Build the HTTP router over a query service.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QueryApi + 'static,
{
    Router::new()
        .route("/search", get(search::<S>))
        .route("/paragraphs", get(paragraphs::<S>))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(service)
}

/// Query string for `GET /search`.
#[derive(Deserialize)]
struct SearchParams {
    term: String,
    #[serde(default)]
    offset: usize,
}

async fn search<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, AppError>
where
    S: QueryApi,
{
    let page = service.query_term(&params.term, params.offset).await?;
    Ok(Json(page))
}

/// Query string for `GET /paragraphs`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphParams {
    book_title: String,
    #[serde(default)]
    start: usize,
    #[serde(default = "default_end")]
    end: usize,
}

fn default_end() -> usize {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphsResponse {
    book_title: String,
    start: usize,
    end: usize,
    paragraphs: Vec<IndexDocument>,
}

async fn paragraphs<S>(
    State(service): State<Arc<S>>,
    Query(params): Query<ParagraphParams>,
) -> Result<Json<ParagraphsResponse>, AppError>
where
    S: QueryApi,
{
    let ParagraphParams {
        book_title,
        start,
        end,
    } = params;
    let paragraphs = service.get_paragraphs(&book_title, start, end).await?;
    Ok(Json(ParagraphsResponse {
        book_title,
        start,
        end,
        paragraphs,
    }))
}

struct AppError(SearchError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.is_invalid_input() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "Search request failed");
            StatusCode::BAD_GATEWAY
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<SearchError> for AppError {
    fn from(inner: SearchError) -> Self {
        Self(inner)
    }
}
