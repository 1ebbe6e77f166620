//! Feed retrieval, parsing and normalization.
//!
//! The pipeline for one feed is:
//!
//! - [`fetch_feeds`] picks a [`Strategy`] and asks a [`FeedFetcher`] for text
//! - [`parse_feed_xml`] turns RSS 2.0, RSS 1.0 (RDF) or Atom into a
//!   [`RawFeedDocument`]
//! - [`ItemNormalizer`] turns every [`RawItem`] into a [`NormalizedItem`],
//!   classified against a [`Taxonomy`](crate::taxonomy::Taxonomy)
//!
//! Many feeds are processed concurrently and merged newest first.
//!
//! # Example
//!
//! ```no_run
//! use feedmix::feed::{fetch_feeds, HttpFetcher};
//!
//! # async fn run() {
//! let fetcher = HttpFetcher::default();
//! let result = fetch_feeds(&["https://example.com/feed.xml"], &fetcher).await;
//! for item in &result.items {
//!     println!("{} [{}]", item.title, item.categories.join(", "));
//! }
//! # }
//! ```

mod dom;
mod fetcher;
mod http;
mod normalize;
mod parser;

pub use dom::ParseError;
pub use fetcher::{
    dedupe_urls, fetch_feeds, fetch_feeds_with_taxonomy, FeedError, FetchFeedsResult, Strategy,
    ATTEMPT_TIMEOUT, FEED_DEADLINE, FEED_FAILED_MESSAGE, INVALID_URL_MESSAGE,
};
pub use http::{FeedFetcher, FetchError, HttpFetcher, FEED_ACCEPT, MAX_FEED_SIZE};
pub use normalize::{
    classification_text, normalize, parse_date, pick_image, to_iso, AttributionStripper,
    ItemNormalizer, NormalizedItem, Source, CLASSIFICATION_MAX_CHARS, SUMMARY_MAX_CHARS, UNTITLED,
};
pub use parser::{parse_feed_xml, Enclosure, RawFeedDocument, RawItem};
