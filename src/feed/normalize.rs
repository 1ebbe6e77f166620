//! Turns a [`RawItem`] into the canonical [`NormalizedItem`].
//!
//! Normalization is pure and infallible: a malformed date, image or summary
//! degrades to absence, it never fails the item.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;

use super::parser::{RawFeedDocument, RawItem};
use crate::taxonomy::Taxonomy;
use crate::util::{collapse_whitespace, strip_tags, truncate_chars};

/// Title used when an item has none.
pub const UNTITLED: &str = "(untitled)";
/// Summaries are cut to this many characters before attribution stripping.
pub const SUMMARY_MAX_CHARS: usize = 280;
/// Upper bound on the text scored by the classifier.
pub const CLASSIFICATION_MAX_CHARS: usize = 4000;

static IMG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\s+[^>]*src=["']([^"']+)["'][^>]*>"#).expect("valid img regex")
});

static ATTRIBUTION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:^|\s)(?:The\s+post|This\s+article)[^.\n]*\bappeared\s+first\s+on\b[^.\n]*[.\n]?",
        r"(?i)(?:^|\s)Originally\s+published\s+(?:on|in)[^.\n]*[.\n]?",
        r"(?i)(?:^|\s)(?:El|La|Esta|Este)\s+(?:art[íi]culo|entrada|publicaci[óo]n|post)[^.\n]*\b(?:se\s+public[óo]|publicado|publicada)\s+(?:primero|originalmente)\s+en\b[^.\n]*[.\n]?",
        r"(?i)(?:^|\s)apareci[óo]\s+primero\s+en\b[^.\n]*[.\n]?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid attribution regex"))
    .collect()
});

/// Feed-level metadata attached to every item of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Source {
    pub title: Option<String>,
    pub url: Option<String>,
}

impl Source {
    pub fn from_document(doc: &RawFeedDocument) -> Self {
        let clean = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            title: clean(&doc.title),
            url: clean(&doc.link),
        }
    }
}

/// A feed item in its canonical, display-ready form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedItem {
    /// De-duplication and display key. Never empty.
    pub id: String,
    pub title: String,
    pub link: String,
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "dateISO")]
    pub date_iso: Option<String>,
    /// Never empty.
    pub categories: Vec<String>,
    pub image: Option<String>,
    pub summary: String,
    /// Shared by every item of the same feed.
    pub source: Arc<Source>,
}

impl NormalizedItem {
    /// Milliseconds since the epoch, 0 for undated items.
    pub fn timestamp_millis(&self) -> i64 {
        self.date.map_or(0, |d| d.timestamp_millis())
    }
}

/// Parses the date formats found in the wild: RFC 3339, RFC 2822 and a few
/// naive ISO forms (read as UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(dt) = DateTime::parse_from_rfc3339(s)
        .ok()
        .or_else(|| parse_rfc2822_lenient(s))
    {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 2822 as feeds actually write it: a `UTC`/`UT`/`Z` zone name is read as
/// `+0000`, and a weekday that disagrees with the date is ignored.
fn parse_rfc2822_lenient(s: &str) -> Option<DateTime<FixedOffset>> {
    let zoned = ["UTC", "UT", "Z"].iter().find_map(|zone| {
        s.strip_suffix(zone)
            .filter(|rest| rest.ends_with(' '))
            .map(|rest| format!("{rest}+0000"))
    });
    let s = zoned.as_deref().unwrap_or(s);

    DateTime::parse_from_rfc2822(s).ok().or_else(|| {
        let (_, rest) = s.split_once(',')?;
        DateTime::parse_from_rfc2822(rest.trim_start()).ok()
    })
}

/// ISO form with millisecond precision and a `Z` suffix.
pub fn to_iso(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn first_img_src(html: Option<&str>) -> Option<String> {
    IMG_RE
        .captures(html?)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Picks artwork for an item, first match wins:
/// image-typed (or untyped) enclosure, media content, `<img>` in the full
/// content, `<img>` in the description, explicit image element.
pub fn pick_image(raw: &RawItem) -> Option<String> {
    let from_enclosure = raw.enclosure.as_ref().and_then(|enc| {
        let is_image = enc
            .mime_type
            .as_deref()
            .map_or(true, |t| t.is_empty() || t.starts_with("image/"));
        (is_image && !enc.url.trim().is_empty()).then(|| enc.url.trim().to_string())
    });

    from_enclosure
        .or_else(|| raw.media_content.first().cloned())
        .or_else(|| first_img_src(raw.content_encoded.as_deref()))
        .or_else(|| first_img_src(raw.content.as_deref()))
        .or_else(|| raw.image.clone())
        .filter(|url| !url.trim().is_empty())
}

/// Removes syndication footers such as "The post X appeared first on Y."
#[derive(Debug, Clone, Default)]
pub struct AttributionStripper {
    /// Footer anchored to the feed's own title.
    site: Option<Regex>,
}

impl AttributionStripper {
    pub fn new(site_title: Option<&str>) -> Self {
        let site = site_title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .and_then(|title| {
                Regex::new(&format!(
                    r"(?i)(?:^|\s)(?:apareci[óo]\s+primero\s+en|se\s+public[óo]\s+(?:primero|originalmente)\s+en|appeared\s+first\s+on)\s+{}[^.\n]*[.\n]?",
                    regex::escape(title)
                ))
                .ok()
            });
        Self { site }
    }

    pub fn strip(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let mut out = text.to_string();
        for re in ATTRIBUTION_RES.iter().chain(self.site.as_ref()) {
            out = re.replace_all(&out, " ").into_owned();
        }
        collapse_whitespace(&out)
    }
}

/// Builds the text the classifier scores: title, stripped full content,
/// stripped description and author categories.
pub fn classification_text(raw: &RawItem) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !raw.title.is_empty() {
        parts.push(raw.title.clone());
    }
    if let Some(encoded) = raw.content_encoded.as_deref().filter(|s| !s.is_empty()) {
        parts.push(strip_tags(encoded, " ").into_owned());
    }
    if let Some(content) = raw.content.as_deref().filter(|s| !s.is_empty()) {
        parts.push(strip_tags(content, " ").into_owned());
    }
    if !raw.categories.is_empty() {
        parts.push(raw.categories.join(" "));
    }
    let text = parts.join(" \n ");
    truncate_chars(&text, CLASSIFICATION_MAX_CHARS).to_string()
}

/// Normalizes the items of one feed.
///
/// Holds what every item of the feed shares: the taxonomy, the
/// [`Source`] and the attribution patterns compiled for the feed title.
pub struct ItemNormalizer<'a> {
    taxonomy: &'a Taxonomy,
    source: Arc<Source>,
    attribution: AttributionStripper,
}

impl<'a> ItemNormalizer<'a> {
    pub fn new(taxonomy: &'a Taxonomy, source: Arc<Source>) -> Self {
        let attribution = AttributionStripper::new(source.title.as_deref());
        Self {
            taxonomy,
            source,
            attribution,
        }
    }

    pub fn normalize(&self, raw: RawItem) -> NormalizedItem {
        let date = raw
            .iso_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(raw.pub_date.as_deref())
            .and_then(parse_date);
        let date_iso = date.as_ref().map(to_iso);

        let link = raw.link.trim().to_string();
        let title = match raw.title.trim() {
            "" => UNTITLED.to_string(),
            t => t.to_string(),
        };

        let guid = raw.guid.trim();
        let id = if !guid.is_empty() {
            guid.to_string()
        } else if !link.is_empty() {
            link.clone()
        } else {
            format!("{}{}", title, date_iso.as_deref().unwrap_or_default())
        };

        let summary = raw
            .content
            .as_deref()
            .map(|content| {
                let stripped = strip_tags(content, "");
                let decoded = html_escape::decode_html_entities(&stripped);
                let truncated = truncate_chars(&decoded, SUMMARY_MAX_CHARS);
                self.attribution.strip(truncated)
            })
            .unwrap_or_default();

        let image = pick_image(&raw);
        let categories = self.categories(&raw);

        NormalizedItem {
            id,
            title,
            link,
            date,
            date_iso,
            categories,
            image,
            summary,
            source: Arc::clone(&self.source),
        }
    }

    /// Derived categories first, then author categories known to the
    /// taxonomy; unknown author categories are dropped.
    fn categories(&self, raw: &RawItem) -> Vec<String> {
        let text = classification_text(raw);
        let derived = self.taxonomy.classify(&text);
        let declared = raw
            .categories
            .iter()
            .filter_map(|c| self.taxonomy.resolve_alias(c));

        let mut categories: Vec<String> = Vec::new();
        for name in derived.into_iter().chain(declared) {
            if !categories.iter().any(|c| c == name) {
                categories.push(name.to_string());
            }
        }

        if categories.is_empty() {
            categories.push(self.taxonomy.fallback_label().to_string());
        }
        categories
    }
}

/// Normalizes a single item. Prefer [`ItemNormalizer`] for whole feeds.
pub fn normalize(raw: RawItem, source: &Arc<Source>, taxonomy: &Taxonomy) -> NormalizedItem {
    ItemNormalizer::new(taxonomy, Arc::clone(source)).normalize(raw)
}
