//! Minimal XML element tree built on `quick-xml`.
//!
//! Feed dialects are detected by probing for marker elements, which needs
//! random access to the document rather than a single streaming pass. This
//! tree is the smallest structure that allows it: elements, attributes and
//! text, nothing else.
//!
//! Every lookup is by *local* name, so `content:encoded`, `dc:date` and
//! `atom:link` match `encoded`, `date` and `link` whatever prefix the
//! document binds them to.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth.
/// Prevents stack exhaustion from maliciously nested documents.
const MAX_DEPTH: usize = 256;

/// Errors raised when feed text is not a well-formed XML document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Syntax error reported by the XML reader.
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The document ended with elements still open.
    #[error("Unclosed element <{0}>")]
    Unclosed(String),

    /// Content outside the single root element.
    #[error("Content outside the root element")]
    Stray,

    /// No root element at all.
    #[error("Document has no root element")]
    Empty,

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

fn local(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Decodes raw XML text: predefined, numeric and HTML named entities.
///
/// Unknown entities are left as written (they are never expanded from a DTD).
fn decode(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    html_escape::decode_html_entities(&text).into_owned()
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attrs = start
            .attributes()
            .filter_map(|attr| match attr {
                Ok(attr) => Some((
                    String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                    decode(&attr.value),
                )),
                Err(e) => {
                    tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                    None
                }
            })
            .collect();
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    /// Attribute value by local name. Empty values count as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| local(key) == name)
            .map(|(_, value)| value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Concatenated text of this element and all its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
            }
        }
    }

    /// Trimmed text, `None` when blank.
    pub fn trimmed_text(&self) -> Option<String> {
        let text = self.text();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children().filter(move |e| e.local_name() == name)
    }

    /// All descendants in document order (pre-order), excluding `self`.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children().collect();
        stack.reverse();
        while let Some(e) = stack.pop() {
            out.push(e);
            let before = stack.len();
            stack.extend(e.children());
            stack[before..].reverse();
        }
        out
    }

    /// First element with the given local name: a direct child if there is
    /// one, else the first matching descendant in document order.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children()
            .find(|e| e.local_name() == name)
            .or_else(|| self.descendants().into_iter().find(|e| e.local_name() == name))
    }

    /// Every descendant with the given local name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        self.descendants()
            .into_iter()
            .filter(|e| e.local_name() == name)
            .collect()
    }

    /// `self` if it carries the local name, else [`Element::find`].
    pub fn find_or_self(&self, name: &str) -> Option<&Element> {
        if self.local_name() == name {
            Some(self)
        } else {
            self.find(name)
        }
    }
}

/// Parses XML text into its root element.
///
/// # Security
///
/// SEC-002: `quick-xml` (0.37) never parses `<!ENTITY>` declarations, and
/// [`decode`] only knows fixed entity tables, so external or recursive
/// entities cannot be expanded.
pub(crate) fn parse_document(xml: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.config_mut().check_end_names = true;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(ParseError::Stray);
                }
                if stack.len() >= MAX_DEPTH {
                    return Err(ParseError::MaxDepthExceeded(MAX_DEPTH));
                }
                stack.push(Element::open(&start));
            }
            Event::Empty(start) => {
                let element = Element::open(&start);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None if root.is_none() => root = Some(element),
                    None => return Err(ParseError::Stray),
                }
            }
            Event::End(_) => {
                // End names are verified by the reader (check_end_names)
                let Some(element) = stack.pop() else {
                    return Err(ParseError::Stray);
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => match stack.last_mut() {
                Some(parent) => parent.children.push(Node::Text(decode(&text))),
                None if text.iter().all(u8::is_ascii_whitespace) => {}
                None => return Err(ParseError::Stray),
            },
            Event::CData(cdata) => match stack.last_mut() {
                Some(parent) => parent
                    .children
                    .push(Node::Text(String::from_utf8_lossy(&cdata).into_owned())),
                None => return Err(ParseError::Stray),
            },
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Unclosed(open.name.clone()));
    }
    root.ok_or(ParseError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_tree() {
        let root = parse_document(r#"<a x="1"><b>hi</b><c:b>there</c:b><d/></a>"#).unwrap();
        assert_eq!(root.local_name(), "a");
        assert_eq!(root.attr("x"), Some("1"));
        assert_eq!(root.children().count(), 3);
        assert_eq!(root.children_named("b").count(), 2);
        assert_eq!(root.text(), "hithere");
    }

    #[test]
    fn test_lookup_ignores_prefix() {
        let root =
            parse_document(r#"<rss xmlns:dc="x"><item><dc:date>2024</dc:date></item></rss>"#)
                .unwrap();
        let item = root.find("item").unwrap();
        assert_eq!(item.find("date").and_then(Element::trimmed_text).as_deref(), Some("2024"));
    }

    #[test]
    fn test_find_prefers_direct_child() {
        let root = parse_document("<c><image><title>logo</title></image><title>Feed</title></c>")
            .unwrap();
        assert_eq!(root.find("title").unwrap().text(), "Feed");
    }

    #[test]
    fn test_find_with_short_lived_name() {
        let root = parse_document("<c><a><b>deep</b></a></c>").unwrap();
        let found = {
            let name = String::from("b");
            root.find(&name)
        };
        assert_eq!(found.map(Element::text).as_deref(), Some("deep"));
    }

    #[test]
    fn test_descendants_in_document_order() {
        let root = parse_document("<r><a><b/><c/></a><d/></r>").unwrap();
        let names: Vec<_> = root.descendants().iter().map(|e| e.local_name()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_entities_and_cdata_decoded() {
        let root = parse_document(
            "<r><t>Fish &amp; Chips&nbsp;&#233;</t><h><![CDATA[<p>raw &amp;</p>]]></h></r>",
        )
        .unwrap();
        assert_eq!(root.find("t").unwrap().text(), "Fish & Chips\u{a0}é");
        assert_eq!(root.find("h").unwrap().text(), "<p>raw &amp;</p>");
    }

    #[test]
    fn test_attribute_lookup_by_local_name() {
        let root = parse_document(r#"<r><l xml:lang="en" href="" rel="self"/></r>"#).unwrap();
        let l = root.find("l").unwrap();
        assert_eq!(l.attr("lang"), Some("en"));
        assert_eq!(l.attr("href"), None);
        assert_eq!(l.attr("rel"), Some("self"));
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(parse_document("<not valid xml").is_err());
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("<a><b>").is_err());
        assert!(matches!(parse_document(""), Err(ParseError::Empty)));
        assert!(matches!(parse_document("<a/><b/>"), Err(ParseError::Stray)));
        assert!(matches!(parse_document("<a/>junk"), Err(ParseError::Stray)));
    }

    #[test]
    fn test_depth_limit() {
        let xml = "<x>".repeat(MAX_DEPTH + 1) + &"</x>".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            parse_document(&xml),
            Err(ParseError::MaxDepthExceeded(_))
        ));
    }

    #[test]
    fn test_find_or_self() {
        let root = parse_document("<feed><title>x</title></feed>").unwrap();
        assert_eq!(root.find_or_self("feed").unwrap().local_name(), "feed");
        assert_eq!(root.find_or_self("title").unwrap().text(), "x");
        assert!(root.find_or_self("channel").is_none());
    }

    #[test]
    fn test_byte_order_mark_tolerated() {
        assert!(parse_document("\u{feff}<?xml version=\"1.0\"?><r/>").is_ok());
    }
}
