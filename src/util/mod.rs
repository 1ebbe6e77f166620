//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: scheme checks and the http downgrade used by the fetcher
//! - **Text processing**: keyword folding, tag stripping, terminal sanitizing
//!
//! # Examples
//!
//! ```
//! use feedmix::util::{normalize_text, truncate_chars, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(normalize_text("Canción"), "cancion");
//! assert_eq!(truncate_chars("Long article title", 4), "Long");
//! ```

mod text;
mod url_validator;

pub use text::{
    collapse_whitespace, normalize_text, strip_control_chars, strip_tags, truncate_chars,
};
pub use url_validator::{domain, downgrade_to_http, validate_url, UrlValidationError};
