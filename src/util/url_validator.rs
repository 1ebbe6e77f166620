use thiserror::Error;
use url::Url;

/// Errors that can occur during feed URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates a URL string for use as a feed source.
///
/// Only the HTTP family is accepted; `ftp://`, `file://`, `mailto:` and
/// anything unparsable are rejected before any network attempt is made.
///
/// # Examples
///
/// ```
/// use feedmix::util::validate_url;
///
/// let url = validate_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_url("ftp://example.com/feed").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Returns the URL with its scheme downgraded to plain `http`.
///
/// Unchanged when the scheme cannot be switched.
pub fn downgrade_to_http(url: &Url) -> Url {
    let mut downgraded = url.clone();
    if downgraded.set_scheme("http").is_err() {
        return url.clone();
    }
    downgraded
}

/// Extracts the host of a URL without a leading `www.`.
///
/// Returns an empty string when the input does not parse or has no host.
pub fn domain(url_str: &str) -> String {
    Url::parse(url_str)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|h| h.strip_prefix("www.").unwrap_or(h).to_string())
        })
        .unwrap_or_default()
}
