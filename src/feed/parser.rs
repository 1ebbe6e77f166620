use serde::Serialize;

use super::dom::{parse_document, Element, ParseError};

/// Feed document as read from XML, before any business normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawFeedDocument {
    pub title: Option<String>,
    pub link: Option<String>,
    pub items: Vec<RawItem>,
}

/// A media attachment declared by the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: Option<String>,
}

/// One feed entry with dialect differences erased.
///
/// Every field is plain text: whatever shape an element came in (attribute,
/// text, CDATA, nested markup), it was flattened here, at the parser boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    /// RSS `pubDate` (or Dublin Core `date`).
    pub pub_date: Option<String>,
    /// Atom `updated`/`published`.
    pub iso_date: Option<String>,
    /// RSS `description`, Atom `summary` (or text-typed `content`).
    pub content: Option<String>,
    /// RSS `content:encoded`, Atom html-typed `content`.
    pub content_encoded: Option<String>,
    pub enclosure: Option<Enclosure>,
    /// `media:content` URLs, document order.
    pub media_content: Vec<String>,
    /// `media:thumbnail` or `itunes:image`.
    pub image: Option<String>,
    pub categories: Vec<String>,
}

/// Parses RSS or Atom text into a [`RawFeedDocument`].
///
/// The dialect is detected structurally: RSS when a `channel` element exists,
/// Atom when a `feed` element exists. A well-formed document of neither
/// dialect yields an empty document rather than an error.
///
/// # Errors
///
/// Returns [`ParseError`] when the text is not well-formed XML.
///
/// # Examples
///
/// ```
/// use feedmix::feed::parse_feed_xml;
///
/// let doc = parse_feed_xml(r#"<rss><channel><title>Blog</title>
///     <item><title>Hello</title><link>https://example.com/1</link></item>
/// </channel></rss>"#).unwrap();
///
/// assert_eq!(doc.title.as_deref(), Some("Blog"));
/// assert_eq!(doc.items[0].link, "https://example.com/1");
///
/// let other = parse_feed_xml("<html><body/></html>").unwrap();
/// assert!(other.items.is_empty());
/// ```
pub fn parse_feed_xml(xml: &str) -> Result<RawFeedDocument, ParseError> {
    let root = parse_document(xml)?;
    Ok(parse_rss(&root)
        .or_else(|| parse_atom(&root))
        .unwrap_or_default())
}

fn first_child_text(el: &Element, name: &str) -> Option<String> {
    el.children_named(name).next().and_then(Element::trimmed_text)
}

fn find_text(el: &Element, name: &str) -> Option<String> {
    el.find(name).and_then(Element::trimmed_text)
}

/// RSS `link` is usually element text, occasionally an `href` attribute.
/// Text wins, so an `atom:link rel="self"` sibling never shadows the site link.
fn rss_link(el: &Element) -> Option<String> {
    let links: Vec<&Element> = el.children_named("link").collect();
    links
        .iter()
        .find_map(|l| l.trimmed_text())
        .or_else(|| links.iter().find_map(|l| l.attr("href").map(str::to_string)))
}

/// Atom link selection: the first `rel="alternate"` (the default rel) wins,
/// else the first link carrying an `href`.
fn atom_link<'a>(links: impl Iterator<Item = &'a Element>) -> Option<String> {
    let mut first = None;
    for link in links {
        let Some(href) = link.attr("href") else {
            continue;
        };
        let rel = link.attr("rel").unwrap_or("alternate");
        if rel.eq_ignore_ascii_case("alternate") {
            return Some(href.to_string());
        }
        first.get_or_insert_with(|| href.to_string());
    }
    first
}

/// `media:content` entries that plausibly point at an image.
fn media_urls(el: &Element) -> Vec<String> {
    el.find_all("content")
        .into_iter()
        .filter(|m| {
            let medium_ok = m.attr("medium").map_or(true, |v| v == "image");
            let type_ok = m.attr("type").map_or(true, |t| t.starts_with("image/"));
            medium_ok && type_ok
        })
        .filter_map(|m| m.attr("url").map(str::to_string))
        .collect()
}

fn explicit_image(el: &Element) -> Option<String> {
    el.find("thumbnail")
        .and_then(|t| t.attr("url").map(str::to_string))
        .or_else(|| {
            el.find("image")
                .and_then(|i| i.attr("href").map(str::to_string).or_else(|| i.trimmed_text()))
        })
}

/// Extracts an RSS 0.9x/2.0 or RSS 1.0 (RDF) document.
///
/// Returns `None` when there is no `channel` element.
pub(crate) fn parse_rss(root: &Element) -> Option<RawFeedDocument> {
    let channel = root.find_or_self("channel")?;

    // RSS 1.0 keeps items beside the channel, not inside it
    let mut item_els = channel.find_all("item");
    if item_els.is_empty() {
        item_els = root.find_all("item");
    }

    let items = item_els.into_iter().map(parse_rss_item).collect();

    Some(RawFeedDocument {
        title: first_child_text(channel, "title"),
        link: rss_link(channel),
        items,
    })
}

fn parse_rss_item(item: &Element) -> RawItem {
    let enclosure = item.find("enclosure").and_then(|e| {
        e.attr("url").map(|url| Enclosure {
            url: url.to_string(),
            mime_type: e.attr("type").map(str::to_string),
        })
    });

    RawItem {
        title: find_text(item, "title").unwrap_or_default(),
        link: rss_link(item).unwrap_or_default(),
        guid: find_text(item, "guid").unwrap_or_default(),
        pub_date: find_text(item, "pubDate").or_else(|| find_text(item, "date")),
        iso_date: None,
        content: find_text(item, "description"),
        content_encoded: find_text(item, "encoded"),
        enclosure,
        media_content: media_urls(item),
        image: explicit_image(item),
        categories: item
            .find_all("category")
            .into_iter()
            .filter_map(Element::trimmed_text)
            .collect(),
    }
}

/// Extracts an Atom document.
///
/// Returns `None` when there is no `feed` element.
pub(crate) fn parse_atom(root: &Element) -> Option<RawFeedDocument> {
    let feed = root.find_or_self("feed")?;

    let items = feed.children_named("entry").map(parse_atom_entry).collect();

    Some(RawFeedDocument {
        title: first_child_text(feed, "title"),
        link: atom_link(feed.children_named("link")),
        items,
    })
}

fn parse_atom_entry(entry: &Element) -> RawItem {
    let content_el = entry.children_named("content").next();
    let content_type = content_el
        .and_then(|c| c.attr("type"))
        .unwrap_or("text")
        .to_ascii_lowercase();
    let content_text = content_el.and_then(Element::trimmed_text);
    let is_html = content_type.contains("html");

    let summary = first_child_text(entry, "summary");
    let (content, content_encoded) = if is_html {
        (summary, content_text)
    } else {
        (summary.or(content_text), None)
    };

    let enclosure = entry
        .children_named("link")
        .find(|l| l.attr("rel").is_some_and(|r| r.eq_ignore_ascii_case("enclosure")))
        .and_then(|l| {
            l.attr("href").map(|url| Enclosure {
                url: url.to_string(),
                mime_type: l.attr("type").map(str::to_string),
            })
        });

    RawItem {
        title: first_child_text(entry, "title").unwrap_or_default(),
        link: atom_link(entry.children_named("link")).unwrap_or_default(),
        guid: first_child_text(entry, "id").unwrap_or_default(),
        pub_date: None,
        iso_date: first_child_text(entry, "updated")
            .or_else(|| first_child_text(entry, "published")),
        content,
        content_encoded,
        enclosure,
        media_content: media_urls(entry),
        image: explicit_image(entry),
        categories: entry
            .children_named("category")
            .filter_map(|c| c.attr("term").map(str::to_string).or_else(|| c.trimmed_text()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:atom="http://www.w3.org/2005/Atom"
     xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example Blog</title>
    <atom:link href="https://example.com/feed/" rel="self" type="application/rss+xml"/>
    <link>https://example.com</link>
    <image><title>Logo</title><url>https://example.com/logo.png</url></image>
    <item>
      <title>First &amp; Foremost</title>
      <link>https://example.com/first</link>
      <guid isPermaLink="false">post-1</guid>
      <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
      <description><![CDATA[<p>Short <b>summary</b></p>]]></description>
      <content:encoded><![CDATA[<p><img src="https://example.com/a.jpg"/>Body</p>]]></content:encoded>
      <enclosure url="https://example.com/a.mp3" type="audio/mpeg" length="1"/>
      <media:content url="https://example.com/m.jpg" medium="image"/>
      <category>Tech</category>
      <category> Rust </category>
      <category></category>
    </item>
    <item>
      <title>Second</title>
      <dc:date>2024-01-03T08:00:00Z</dc:date>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_rss_channel_metadata() {
        let doc = parse_feed_xml(RSS).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Example Blog"));
        assert_eq!(doc.link.as_deref(), Some("https://example.com"));
        assert_eq!(doc.items.len(), 2);
    }

    #[test]
    fn test_rss_item_fields() {
        let doc = parse_feed_xml(RSS).unwrap();
        let item = &doc.items[0];
        assert_eq!(item.title, "First & Foremost");
        assert_eq!(item.link, "https://example.com/first");
        assert_eq!(item.guid, "post-1");
        assert_eq!(item.pub_date.as_deref(), Some("Tue, 02 Jan 2024 10:00:00 GMT"));
        assert_eq!(item.content.as_deref(), Some("<p>Short <b>summary</b></p>"));
        assert_eq!(
            item.content_encoded.as_deref(),
            Some(r#"<p><img src="https://example.com/a.jpg"/>Body</p>"#)
        );
        assert_eq!(
            item.enclosure,
            Some(Enclosure {
                url: "https://example.com/a.mp3".into(),
                mime_type: Some("audio/mpeg".into()),
            })
        );
        assert_eq!(item.media_content, vec!["https://example.com/m.jpg"]);
        assert_eq!(item.categories, vec!["Tech", "Rust"]);
    }

    #[test]
    fn test_rss_dublin_core_date_fallback() {
        let doc = parse_feed_xml(RSS).unwrap();
        let item = &doc.items[1];
        assert_eq!(item.pub_date.as_deref(), Some("2024-01-03T08:00:00Z"));
        assert_eq!(item.link, "");
        assert_eq!(item.enclosure, None);
    }

    #[test]
    fn test_rss_link_from_href_attribute() {
        let doc = parse_feed_xml(
            r#"<rss><channel><link href="https://site"/><item><link href="https://post"/></item></channel></rss>"#,
        )
        .unwrap();
        assert_eq!(doc.link.as_deref(), Some("https://site"));
        assert_eq!(doc.items[0].link, "https://post");
    }

    #[test]
    fn test_rdf_items_beside_channel() {
        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/">
  <channel><title>RDF</title><link>https://rdf.example</link></channel>
  <item><title>One</title><link>https://rdf.example/1</link></item>
  <item><title>Two</title><link>https://rdf.example/2</link></item>
</rdf:RDF>"#;
        let doc = parse_feed_xml(xml).unwrap();
        assert_eq!(doc.title.as_deref(), Some("RDF"));
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[1].title, "Two");
    }

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <link rel="self" href="https://atom.example/feed.xml"/>
  <link href="https://atom.example/"/>
  <entry>
    <title>Entry One</title>
    <link rel="alternate" href="https://a"/>
    <link rel="self" href="https://b"/>
    <link rel="enclosure" href="https://atom.example/pic.png" type="image/png"/>
    <id>urn:uuid:1</id>
    <published>2024-01-01T00:00:00Z</published>
    <updated>2024-01-05T00:00:00Z</updated>
    <summary>Plain summary</summary>
    <content type="html">&lt;p&gt;Rich &lt;img src="https://atom.example/c.jpg"&gt;&lt;/p&gt;</content>
    <category term="science" label="Science"/>
    <category>Space</category>
  </entry>
  <entry>
    <title>Entry Two</title>
    <link rel="self" href="https://self-only"/>
    <published>2024-01-02T00:00:00Z</published>
    <content type="text">Text content only</content>
  </entry>
</feed>"#;

    #[test]
    fn test_atom_feed_metadata_prefers_alternate() {
        let doc = parse_feed_xml(ATOM).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Atom Example"));
        // rel defaults to alternate when absent
        assert_eq!(doc.link.as_deref(), Some("https://atom.example/"));
    }

    #[test]
    fn test_atom_entry_fields() {
        let doc = parse_feed_xml(ATOM).unwrap();
        let entry = &doc.items[0];
        assert_eq!(entry.link, "https://a");
        assert_eq!(entry.guid, "urn:uuid:1");
        assert_eq!(entry.iso_date.as_deref(), Some("2024-01-05T00:00:00Z"));
        assert_eq!(entry.content.as_deref(), Some("Plain summary"));
        assert_eq!(
            entry.content_encoded.as_deref(),
            Some(r#"<p>Rich <img src="https://atom.example/c.jpg"></p>"#)
        );
        assert_eq!(
            entry.enclosure.as_ref().map(|e| e.url.as_str()),
            Some("https://atom.example/pic.png")
        );
        assert_eq!(entry.categories, vec!["science", "Space"]);
    }

    #[test]
    fn test_atom_entry_text_content_and_self_link() {
        let doc = parse_feed_xml(ATOM).unwrap();
        let entry = &doc.items[1];
        assert_eq!(entry.link, "https://self-only");
        assert_eq!(entry.iso_date.as_deref(), Some("2024-01-02T00:00:00Z"));
        assert_eq!(entry.content.as_deref(), Some("Text content only"));
        assert_eq!(entry.content_encoded, None);
    }

    #[test]
    fn test_prefixed_atom_namespace() {
        let xml = r#"<a:feed xmlns:a="http://www.w3.org/2005/Atom">
  <a:title>Prefixed</a:title>
  <a:entry><a:title>X</a:title><a:link href="https://x"/></a:entry>
</a:feed>"#;
        let doc = parse_feed_xml(xml).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Prefixed"));
        assert_eq!(doc.items[0].link, "https://x");
    }

    #[test]
    fn test_dialect_extractors_return_none_without_marker() {
        let root = parse_document("<html><body/></html>").unwrap();
        assert!(parse_rss(&root).is_none());
        assert!(parse_atom(&root).is_none());
        assert_eq!(parse_feed_xml("<html><body/></html>").unwrap(), RawFeedDocument::default());
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_feed_xml(r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#)
            .unwrap();
        assert_eq!(doc.title, None);
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(parse_feed_xml("<not valid xml").is_err());
        assert!(parse_feed_xml("<rss><channel></rss>").is_err());
    }

    #[test]
    fn test_media_thumbnail_as_explicit_image() {
        let doc = parse_feed_xml(
            r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item>
                <media:thumbnail url="https://t.example/t.jpg"/>
                <media:content url="https://v.example/v.mp4" medium="video"/>
            </item></channel></rss>"#,
        )
        .unwrap();
        let item = &doc.items[0];
        assert_eq!(item.image.as_deref(), Some("https://t.example/t.jpg"));
        assert!(item.media_content.is_empty());
    }
}
