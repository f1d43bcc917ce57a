//! Inline metadata tag extraction.
//!
//! The model may annotate its narrative text with search metadata:
//!
//! - `<search_quality_score>N</search_quality_score>`
//! - `<search_quality_reflection>...</search_quality_reflection>`
//! - `<search_query>...</search_query>` (any number)
//!
//! Extraction always runs over the whole accumulated buffer, so a tag split
//! across several text chunks is recognised as soon as its closing marker
//! arrives, and running it again on an unchanged buffer gives the same result.

use chatstream_types::SearchMetadata;
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_QUALITY_SCORE: u8 = 5;

const OPENING_MARKERS: [&str; 3] = [
    "<search_quality_score>",
    "<search_quality_reflection>",
    "<search_query>",
];

static SCORE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<search_quality_score>(.*?)</search_quality_score>").unwrap()
});

static REFLECTION_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<search_quality_reflection>(.*?)</search_quality_reflection>").unwrap()
});

static QUERY_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<search_query>(.*?)</search_query>").unwrap()
});

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

/// How to treat markup that has not been closed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// More text may follow: hide unclosed tags and partial opening markers.
    Streaming,
    /// The buffer is final: complete tags and stray opening markers are
    /// removed, the text around an unclosed marker is kept.
    Final,
}

/// Clean text plus whatever metadata the buffer carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub content: String,
    pub metadata: Option<SearchMetadata>,
}

/// Derive clean content and search metadata from the full raw buffer.
pub fn extract(buffer: &str, mode: ExtractMode) -> Extraction {
    let metadata = SearchMetadata {
        quality_score: last_score(buffer),
        explanation: REFLECTION_TAG
            .captures_iter(buffer)
            .last()
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty()),
        queries: Some(
            QUERY_TAG
                .captures_iter(buffer)
                .map(|c| c[1].trim().to_string())
                .filter(|q| !q.is_empty())
                .collect::<Vec<_>>(),
        )
        .filter(|q| !q.is_empty()),
    };

    let mut content = strip_complete_tags(buffer);
    match mode {
        ExtractMode::Streaming => truncate_pending_markup(&mut content),
        ExtractMode::Final => strip_stray_markers(&mut content),
    }

    Extraction {
        content: normalize_whitespace(&content),
        metadata: (!metadata.is_empty()).then_some(metadata),
    }
}

/// Latest score tag with a numeric body wins.
fn last_score(buffer: &str) -> Option<u8> {
    SCORE_TAG
        .captures_iter(buffer)
        .filter_map(|c| c[1].trim().parse::<u64>().ok())
        .last()
        .map(|score| score.min(MAX_QUALITY_SCORE as u64) as u8)
}

fn strip_complete_tags(buffer: &str) -> String {
    let text = SCORE_TAG.replace_all(buffer, "");
    let text = REFLECTION_TAG.replace_all(&text, "");
    QUERY_TAG.replace_all(&text, "").into_owned()
}

/// Cut an opening marker still waiting for its close, or a trailing fragment
/// that may grow into one.
fn truncate_pending_markup(text: &mut String) {
    if let Some(pos) = OPENING_MARKERS.iter().filter_map(|m| text.find(m)).min() {
        text.truncate(pos);
    }

    truncate_marker_prefix(text);
}

/// Drop opening markers that never got a close, keeping the text after them.
fn strip_stray_markers(text: &mut String) {
    // Removing one marker can join its neighbours into another
    while let Some(marker) = OPENING_MARKERS.into_iter().find(|m| text.contains(m)) {
        *text = text.replace(marker, "");
    }
    truncate_marker_prefix(text);
}

fn truncate_marker_prefix(text: &mut String) {
    if let Some(pos) = text.rfind('<') {
        let tail = &text[pos..];
        if OPENING_MARKERS
            .iter()
            .any(|m| tail.len() < m.len() && m.starts_with(tail))
        {
            text.truncate(pos);
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    EXCESS_BLANK_LINES.replace_all(text, "\n\n").trim().to_string()
}
