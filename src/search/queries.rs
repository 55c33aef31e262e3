//! Builders for Elasticsearch query bodies.

use serde_json::{Value, json};

/// Hits returned per page of term search.
pub const PAGE_SIZE: usize = 10;

/// Largest paragraph range one request may cover; matches the engine's default result window.
pub const MAX_RANGE_SIZE: usize = 10_000;

/// Full-text match on paragraph text with highlighted fragments, paged by `offset`.
pub fn term_query(term: &str, offset: usize) -> Value {
    json!({
        "from": offset,
        "size": PAGE_SIZE,
        "query": {
            "match": { "text": term }
        },
        "highlight": {
            "fields": { "text": {} }
        }
    })
}

/// Paragraphs of one book with `location` in `[start, end]`, ascending.
///
/// The requested size never exceeds [`MAX_RANGE_SIZE`].
pub fn paragraph_range_query(book_title: &str, start: usize, end: usize) -> Value {
    let size = end
        .saturating_sub(start)
        .saturating_add(1)
        .min(MAX_RANGE_SIZE);
    json!({
        "size": size,
        "sort": [
            { "location": "asc" }
        ],
        "query": {
            "bool": {
                "filter": [
                    { "term": { "title": book_title } },
                    { "range": { "location": { "gte": start, "lte": end } } }
                ]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_query_pages_and_highlights_text() {
        let body = term_query("opium den", 20);
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], PAGE_SIZE);
        assert_eq!(body["query"]["match"]["text"], "opium den");
        assert!(body["highlight"]["fields"]["text"].is_object());
    }

    #[test]
    fn range_query_is_inclusive_and_sorted() {
        let body = paragraph_range_query("A Study", 0, 1);
        assert_eq!(body["size"], 2);
        assert_eq!(body["sort"][0]["location"], "asc");
        let filter = &body["query"]["bool"]["filter"];
        assert_eq!(filter[0]["term"]["title"], "A Study");
        assert_eq!(filter[1]["range"]["location"]["gte"], 0);
        assert_eq!(filter[1]["range"]["location"]["lte"], 1);
    }

    #[test]
    fn range_query_size_is_capped_at_the_result_window() {
        let body = paragraph_range_query("A Study", 0, usize::MAX);
        assert_eq!(body["size"], MAX_RANGE_SIZE);
        assert_eq!(body["query"]["bool"]["filter"][1]["range"]["location"]["lte"], usize::MAX);

        let body = paragraph_range_query("A Study", 5, 5 + MAX_RANGE_SIZE - 1);
        assert_eq!(body["size"], MAX_RANGE_SIZE);
    }
}
