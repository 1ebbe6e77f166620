use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use super::http::{FeedFetcher, FetchError};
use super::normalize::{ItemNormalizer, NormalizedItem, Source};
use super::parser::{parse_feed_xml, RawFeedDocument};
use crate::taxonomy::Taxonomy;
use crate::util::{downgrade_to_http, validate_url};

/// Time budget of a single attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_millis(4000);
/// Time budget of one feed across all its attempts, counted from the start
/// of that feed's processing.
pub const FEED_DEADLINE: Duration = Duration::from_millis(6500);

pub const INVALID_URL_MESSAGE: &str = "Invalid URL";
pub const FEED_FAILED_MESSAGE: &str = "Timeout / error reading feed";

const PRIMARY_PROXY: &str = "https://api.allorigins.win/raw?url=";
const FALLBACK_PROXY: &str = "https://cors.isomorphic-git.org/";

/// One way of reaching a feed. Tried in [`Strategy::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The URL as given
    Direct,
    /// Through the read-through proxy
    Proxy,
    /// Scheme downgraded to plain http
    HttpDowngrade,
    /// Downgraded URL through the read-through proxy
    ProxyHttpDowngrade,
    /// Through the last-resort proxy (rate limited)
    FallbackProxy,
}

impl Strategy {
    pub const ORDER: [Strategy; 5] = [
        Strategy::Direct,
        Strategy::Proxy,
        Strategy::HttpDowngrade,
        Strategy::ProxyHttpDowngrade,
        Strategy::FallbackProxy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Proxy => "proxy",
            Strategy::HttpDowngrade => "http",
            Strategy::ProxyHttpDowngrade => "proxy+http",
            Strategy::FallbackProxy => "fallback-proxy",
        }
    }

    /// URL to request for `original` (already validated as `parsed`).
    pub fn target(self, original: &str, parsed: &Url) -> String {
        match self {
            Strategy::Direct => original.to_string(),
            Strategy::Proxy => format!("{PRIMARY_PROXY}{}", encode_component(original)),
            Strategy::HttpDowngrade => downgrade_to_http(parsed).to_string(),
            Strategy::ProxyHttpDowngrade => format!(
                "{PRIMARY_PROXY}{}",
                encode_component(downgrade_to_http(parsed).as_str())
            ),
            Strategy::FallbackProxy => format!("{FALLBACK_PROXY}{}", encode_component(original)),
        }
    }
}

fn encode_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// A feed that could not be read. The message is deliberately coarse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedError {
    pub url: String,
    pub message: String,
}

impl FeedError {
    fn new(url: &str, message: &str) -> Self {
        Self {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

/// Items of every readable feed plus one error per unreadable feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchFeedsResult {
    /// Newest first; undated items last.
    pub items: Vec<NormalizedItem>,
    pub errors: Vec<FeedError>,
}

/// Trims, drops blanks and removes duplicates, keeping first-seen order.
pub fn dedupe_urls<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.as_ref().trim();
        if !url.is_empty() && !unique.iter().any(|u| u == url) {
            unique.push(url.to_string());
        }
    }
    unique
}

/// Fetches, parses, normalizes and merges feeds using the built-in taxonomy.
///
/// See [`fetch_feeds_with_taxonomy`].
pub async fn fetch_feeds<F, S>(urls: &[S], fetcher: &F) -> FetchFeedsResult
where
    F: FeedFetcher + ?Sized,
    S: AsRef<str>,
{
    let taxonomy = Taxonomy::builtin();
    fetch_feeds_with_taxonomy(urls, fetcher, &taxonomy).await
}

/// Fetches, parses, normalizes and merges feeds.
///
/// # Behavior
///
/// - URLs are trimmed and deduplicated; blanks are ignored
/// - Every unique URL is processed concurrently with the others
/// - Non-http(s) URLs fail with `"Invalid URL"` without any request
/// - Per feed, the [`Strategy::ORDER`] attempts run one after another until
///   one yields a parsable document; each attempt gets [`ATTEMPT_TIMEOUT`],
///   and no new attempt starts once [`FEED_DEADLINE`] has passed
/// - A feed with no successful attempt contributes one error and no items
/// - Items are merged and stable-sorted newest first, undated items last.
///   Duplicates across feeds are kept.
///
/// Never fails: invalid input yields no items and one error per URL.
pub async fn fetch_feeds_with_taxonomy<F, S>(
    urls: &[S],
    fetcher: &F,
    taxonomy: &Taxonomy,
) -> FetchFeedsResult
where
    F: FeedFetcher + ?Sized,
    S: AsRef<str>,
{
    let unique = dedupe_urls(urls);

    let outcomes = join_all(
        unique
            .iter()
            .map(|url| fetch_one(url, fetcher, taxonomy)),
    )
    .await;

    let mut items = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(mut feed_items) => items.append(&mut feed_items),
            Err(e) => errors.push(e),
        }
    }

    // Stable: equal timestamps keep feed order, then document order
    items.sort_by(|a, b| b.timestamp_millis().cmp(&a.timestamp_millis()));

    tracing::info!(
        feeds = unique.len(),
        items = items.len(),
        errors = errors.len(),
        "Feeds aggregated"
    );

    FetchFeedsResult { items, errors }
}

async fn fetch_one<F>(
    url: &str,
    fetcher: &F,
    taxonomy: &Taxonomy,
) -> Result<Vec<NormalizedItem>, FeedError>
where
    F: FeedFetcher + ?Sized,
{
    let started = Instant::now();

    let parsed = match validate_url(url).map_err(FetchError::from) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Rejecting feed URL");
            return Err(FeedError::new(url, INVALID_URL_MESSAGE));
        }
    };

    for strategy in Strategy::ORDER {
        if started.elapsed() > FEED_DEADLINE {
            tracing::debug!(url = %url, strategy = strategy.label(), "Feed deadline passed, skipping remaining attempts");
            break;
        }

        let target = strategy.target(url, &parsed);
        match attempt(fetcher, &target).await {
            Ok(doc) => {
                let source = Arc::new(Source::from_document(&doc));
                let normalizer = ItemNormalizer::new(taxonomy, source);
                let items: Vec<NormalizedItem> = doc
                    .items
                    .into_iter()
                    .map(|raw| normalizer.normalize(raw))
                    .collect();
                tracing::debug!(
                    url = %url,
                    strategy = strategy.label(),
                    items = items.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Feed read"
                );
                return Ok(items);
            }
            Err(e) => {
                tracing::debug!(
                    url = %url,
                    strategy = strategy.label(),
                    error = %e,
                    "Feed attempt failed"
                );
            }
        }
    }

    tracing::warn!(
        url = %url,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Giving up on feed"
    );
    Err(FeedError::new(url, FEED_FAILED_MESSAGE))
}

/// One bounded attempt: fetch and parse, racing [`ATTEMPT_TIMEOUT`].
///
/// On timeout the in-flight request future is dropped, which cancels it.
async fn attempt<F>(fetcher: &F, target: &str) -> Result<RawFeedDocument, FetchError>
where
    F: FeedFetcher + ?Sized,
{
    tokio::time::timeout(ATTEMPT_TIMEOUT, async {
        let text = fetcher.fetch_text(target).await?;
        Ok::<_, FetchError>(parse_feed_xml(&text)?)
    })
    .await
    .map_err(|_| FetchError::Timeout)?
}
