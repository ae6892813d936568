//! Search and thumbnail fetching on a dedicated worker thread.
//!
//! Collaborator boundary for the runner: each request is dispatched on the
//! helper's own single background worker (not the runner's pool) and exactly
//! one completion callback per request is delivered on the owner context.
//! Runner-hosted jobs may delegate to this helper internally.

mod parse;

pub use parse::{SearchEntry, SearchResult};

use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;

use crate::config::JobrunConfig;
use crate::owner::{Owner, OwnerHandle};

/// Closed set of fetch failures. Success is carried by `Ok`, so there is no
/// "no error" member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid URL")]
    InvalidUrl,
    #[error("I/O failure")]
    Io,
    #[error("unexpected feed format")]
    UnexpectedFormat,
    #[error("feed parser failure")]
    Parser,
    #[error("unknown failure")]
    Unknown,
}

/// Search request. `tag` is an opaque caller correlation id, echoed back in
/// the completion callback.
#[derive(Debug, Clone)]
pub struct SearchArg {
    pub tag: u64,
    pub query: String,
    /// 1-based start index into the feed.
    pub start: usize,
    /// Maximum number of entries to return.
    pub max: usize,
}

/// Thumbnail request. The raw image bytes are returned; decoding is the
/// caller's concern.
#[derive(Debug, Clone)]
pub struct ThumbnailArg {
    pub tag: u64,
    pub url: String,
}

type SearchDoneFn = Arc<dyn Fn(SearchArg, Result<SearchResult, FetchError>) + Send + Sync>;
type ThumbnailDoneFn = Arc<dyn Fn(ThumbnailArg, Result<Vec<u8>, FetchError>) + Send + Sync>;

/// Fetch helper with one dedicated worker thread. Completion callbacks are
/// posted to the owner context handed to `open`.
pub struct FetchHelper {
    owner: OwnerHandle,
    worker: Owner,
    cfg: JobrunConfig,
    search_done: Arc<RwLock<Option<SearchDoneFn>>>,
    thumbnail_done: Arc<RwLock<Option<ThumbnailDoneFn>>>,
}

impl FetchHelper {
    /// Spawns the helper's worker thread.
    pub fn open(owner: OwnerHandle, cfg: &JobrunConfig) -> Self {
        Self {
            owner,
            worker: Owner::spawn("jobrun-fetch"),
            cfg: cfg.clone(),
            search_done: Arc::new(RwLock::new(None)),
            thumbnail_done: Arc::new(RwLock::new(None)),
        }
    }

    /// Single-slot receiver for search completions; latest call wins.
    pub fn set_search_done_receiver(
        &self,
        f: impl Fn(SearchArg, Result<SearchResult, FetchError>) + Send + Sync + 'static,
    ) {
        *self.search_done.write().unwrap() = Some(Arc::new(f));
    }

    /// Single-slot receiver for thumbnail completions; latest call wins.
    pub fn set_thumbnail_done_receiver(
        &self,
        f: impl Fn(ThumbnailArg, Result<Vec<u8>, FetchError>) + Send + Sync + 'static,
    ) {
        *self.thumbnail_done.write().unwrap() = Some(Arc::new(f));
    }

    /// Queues a search. The request range is validated fail-fast: a zero
    /// start/max or a max above the configured bound is a caller bug.
    pub fn search_async(&self, arg: SearchArg) {
        assert!(
            arg.start > 0 && arg.max > 0 && arg.max <= self.cfg.search_max_results,
            "search range out of bounds"
        );
        let owner = self.owner.clone();
        let cfg = self.cfg.clone();
        let receiver = Arc::clone(&self.search_done);
        self.worker.handle().post(move || {
            let result = run_search(&cfg, &arg);
            let listener = receiver.read().unwrap().clone();
            let Some(listener) = listener else { return };
            owner.post(move || listener(arg, result));
        });
    }

    /// Queues a thumbnail fetch.
    pub fn load_thumbnail_async(&self, arg: ThumbnailArg) {
        let owner = self.owner.clone();
        let cfg = self.cfg.clone();
        let receiver = Arc::clone(&self.thumbnail_done);
        self.worker.handle().post(move || {
            let result = run_thumbnail(&cfg, &arg);
            let listener = receiver.read().unwrap().clone();
            let Some(listener) = listener else { return };
            owner.post(move || listener(arg, result));
        });
    }

    /// Stops the worker thread. Requests already queued are still processed
    /// before the worker exits.
    pub fn close(self) {}
}

fn run_search(cfg: &JobrunConfig, arg: &SearchArg) -> Result<SearchResult, FetchError> {
    let url = parse::feed_url(&cfg.search_feed_url, &arg.query, arg.start, arg.max)?;
    let body = load_url(cfg, url.as_str())?;
    parse::parse_feed(&body)
}

fn run_thumbnail(cfg: &JobrunConfig, arg: &ThumbnailArg) -> Result<Vec<u8>, FetchError> {
    let url = url::Url::parse(&arg.url).map_err(|_| FetchError::InvalidUrl)?;
    load_url(cfg, url.as_str())
}

/// GET with bounded connection retries (I/O failures only; anything else is
/// final on the first attempt).
fn load_url(cfg: &JobrunConfig, url: &str) -> Result<Vec<u8>, FetchError> {
    let attempts = cfg.network_retry.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch_once(cfg, url) {
            Ok(body) => return Ok(body),
            Err(e) => {
                if e != FetchError::Io || attempt >= attempts {
                    return Err(e);
                }
                tracing::debug!(attempt, url, "fetch retry after I/O failure");
            }
        }
    }
}

fn fetch_once(cfg: &JobrunConfig, url: &str) -> Result<Vec<u8>, FetchError> {
    let mut body: Vec<u8> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(|_| FetchError::InvalidUrl)?;
    easy.follow_location(true).map_err(|_| FetchError::Unknown)?;
    easy.connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .map_err(|_| FetchError::Unknown)?;
    easy.timeout(Duration::from_secs(cfg.request_timeout_secs))
        .map_err(|_| FetchError::Unknown)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(|_| FetchError::Unknown)?;
        transfer.perform().map_err(|_| FetchError::Io)?;
    }

    let code = easy.response_code().map_err(|_| FetchError::Unknown)?;
    if !(200..300).contains(&code) {
        tracing::warn!(code, url, "fetch returned non-success status");
        return Err(FetchError::Io);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Owner;

    #[test]
    #[should_panic(expected = "search range out of bounds")]
    fn search_rejects_zero_max() {
        let owner = Owner::spawn("fetch-test");
        let helper = FetchHelper::open(owner.handle(), &JobrunConfig::default());
        helper.search_async(SearchArg {
            tag: 0,
            query: "x".into(),
            start: 1,
            max: 0,
        });
    }

    #[test]
    #[should_panic(expected = "search range out of bounds")]
    fn search_rejects_max_above_configured_bound() {
        let owner = Owner::spawn("fetch-test");
        let cfg = JobrunConfig::default();
        let max = cfg.search_max_results + 1;
        let helper = FetchHelper::open(owner.handle(), &cfg);
        helper.search_async(SearchArg {
            tag: 0,
            query: "x".into(),
            start: 1,
            max,
        });
    }

    #[test]
    fn thumbnail_with_malformed_url_reports_invalid_url() {
        let cfg = JobrunConfig::default();
        let arg = ThumbnailArg {
            tag: 7,
            url: "not a url".into(),
        };
        assert_eq!(run_thumbnail(&cfg, &arg), Err(FetchError::InvalidUrl));
    }
}
