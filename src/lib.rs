//! feedmix: merge many RSS/Atom feeds into one categorized, newest-first list.
//!
//! The library is split by concern:
//!
//! - [`feed`] fetches, parses and normalizes feeds
//! - [`taxonomy`] loads topic tables and classifies text
//! - [`digest`] groups and labels items for display
//! - [`config`] reads the optional user configuration file
//! - [`util`] holds URL and text helpers shared by the above

pub mod config;
pub mod digest;
pub mod feed;
pub mod taxonomy;
pub mod util;

pub use feed::{
    fetch_feeds, fetch_feeds_with_taxonomy, parse_feed_xml, FeedError, FeedFetcher,
    FetchFeedsResult, HttpFetcher, NormalizedItem,
};
pub use taxonomy::Taxonomy;
