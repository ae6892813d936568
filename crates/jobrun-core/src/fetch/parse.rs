//! Feed URL construction and search feed (JSON) parsing.

use serde::Deserialize;
use url::Url;

use super::FetchError;

/// One entry of a search feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// Parsed search feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    /// Total matches upstream, when the feed reports it.
    #[serde(default)]
    pub total: Option<usize>,
    pub entries: Vec<SearchEntry>,
}

pub(super) fn feed_url(base: &str, query: &str, start: usize, max: usize) -> Result<Url, FetchError> {
    let start = start.to_string();
    let max = max.to_string();
    Url::parse_with_params(
        base,
        &[
            ("q", query),
            ("start-index", start.as_str()),
            ("max-results", max.as_str()),
        ],
    )
    .map_err(|_| FetchError::InvalidUrl)
}

pub(super) fn parse_feed(body: &[u8]) -> Result<SearchResult, FetchError> {
    serde_json::from_slice::<SearchResult>(body).map_err(|e| classify(&e))
}

fn classify(e: &serde_json::Error) -> FetchError {
    use serde_json::error::Category;
    match e.classify() {
        Category::Io => FetchError::Io,
        Category::Syntax | Category::Eof => FetchError::Parser,
        Category::Data => FetchError::UnexpectedFormat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_carries_query_params() {
        let url = feed_url("https://feeds.example.org/api/search", "blue train", 1, 25).unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("q=blue+train"), "{query}");
        assert!(query.contains("start-index=1"), "{query}");
        assert!(query.contains("max-results=25"), "{query}");
    }

    #[test]
    fn feed_url_rejects_malformed_base() {
        assert_eq!(
            feed_url("not a base", "x", 1, 10),
            Err(FetchError::InvalidUrl)
        );
    }

    #[test]
    fn parse_feed_reads_entries() {
        let body = br#"{
            "total": 2,
            "entries": [
                {"id": "a1", "title": "First", "author": "someone"},
                {"id": "b2", "title": "Second", "thumbnail_url": "https://img.example.org/b2.jpg"}
            ]
        }"#;
        let feed = parse_feed(body).unwrap();
        assert_eq!(feed.total, Some(2));
        assert_eq!(feed.entries.len(), 2);
        assert_eq!(feed.entries[0].author.as_deref(), Some("someone"));
        assert!(feed.entries[1].author.is_none());
        assert_eq!(
            feed.entries[1].thumbnail_url.as_deref(),
            Some("https://img.example.org/b2.jpg")
        );
    }

    #[test]
    fn parse_feed_flags_malformed_json_as_parser_failure() {
        assert_eq!(parse_feed(b"{not json"), Err(FetchError::Parser));
        assert_eq!(parse_feed(b""), Err(FetchError::Parser));
    }

    #[test]
    fn parse_feed_flags_wrong_shape_as_unexpected_format() {
        assert_eq!(parse_feed(b"{\"entries\": 5}"), Err(FetchError::UnexpectedFormat));
        assert_eq!(
            parse_feed(b"{\"entries\": [{\"title\": \"missing id\"}]}"),
            Err(FetchError::UnexpectedFormat)
        );
    }
}
