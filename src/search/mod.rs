//! Term search and paragraph-range retrieval over the populated index.

pub mod queries;
mod service;

pub use queries::{MAX_RANGE_SIZE, PAGE_SIZE};
pub use service::{QueryApi, SearchError, SearchService, TERM_MAX_LEN, TITLE_MAX_LEN};
