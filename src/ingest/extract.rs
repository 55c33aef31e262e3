//! Turns a raw Project Gutenberg text into metadata and an ordered paragraph list.
//!
//! The body is whatever lies between the `*** START OF ... ***` and `*** END OF ... ***`
//! marker lines. It is split on blank lines; each paragraph has its hard line breaks folded
//! into spaces and its `_italic_` underscores removed. Empty paragraphs are dropped before
//! ordinals are assigned, so ordinals are always `0..N`.

use super::types::{BookMetadata, ExtractedBook, ExtractionError, Paragraph, UNKNOWN_AUTHOR};
use regex::Regex;
use std::sync::LazyLock;

static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Title:[ \t]*(.*?)[ \t]*\r?$").expect("title pattern"));

static AUTHOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Author:[ \t]*(.*?)[ \t]*\r?$").expect("author pattern"));

static START_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*{3}[ \t]*START OF (?:THIS|THE) [^\n]*?\*{3}[ \t]*\r?$")
        .expect("start marker pattern")
});

static END_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*{3}[ \t]*END OF (?:THIS|THE) [^\n]*?\*{3}[ \t]*\r?$")
        .expect("end marker pattern")
});

// A line break followed by at least one whitespace-only line.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n(?:[ \t]*\r?\n)+").expect("paragraph break pattern"));

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*\r?\n[ \t]*").expect("line break pattern"));

/// Parse one source text.
pub fn extract(raw: &str) -> Result<ExtractedBook, ExtractionError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let metadata = extract_metadata(raw)?;
    let body = locate_body(raw)?;
    let paragraphs = split_paragraphs(body)
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Paragraph { ordinal, text })
        .collect();

    Ok(ExtractedBook {
        metadata,
        paragraphs,
    })
}

/// Read the `Title:` and `Author:` lines.
pub fn extract_metadata(raw: &str) -> Result<BookMetadata, ExtractionError> {
    let title = capture_line(&TITLE_LINE, raw).ok_or(ExtractionError::MissingTitle)?;
    let author = capture_line(&AUTHOR_LINE, raw).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    Ok(BookMetadata { title, author })
}

fn capture_line(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Slice between the start and end marker lines, both excluded.
pub fn locate_body(raw: &str) -> Result<&str, ExtractionError> {
    let start = START_MARKER
        .find(raw)
        .ok_or(ExtractionError::MissingStartMarker)?
        .end();

    let mut end_markers = END_MARKER.find_iter(raw).peekable();
    if end_markers.peek().is_none() {
        return Err(ExtractionError::MissingEndMarker);
    }
    let end = end_markers
        .map(|found| found.start())
        .find(|&position| position >= start)
        .ok_or(ExtractionError::MarkersOutOfOrder)?;

    Ok(&raw[start..end])
}

/// Split a body into cleaned, non-empty paragraphs in order.
pub fn split_paragraphs(body: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(body)
        .map(clean_paragraph)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

fn clean_paragraph(candidate: &str) -> String {
    LINE_BREAK
        .replace_all(candidate, " ")
        .replace('_', "")
        .trim()
        .to_string()
}
