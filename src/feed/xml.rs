//! Minimal navigable element tree for RSS documents.
//!
//! Built on `quick_xml::NsReader` so elements carry their resolved namespace
//! URI, which is what iTunes extension lookups key on (the prefix a feed
//! happens to use is irrelevant).
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use thiserror::Error;

/// Namespace URI of Apple's podcast extension elements (`itunes:*`).
pub const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// SEC-003: Maximum element nesting depth accepted from a feed.
const MAX_DEPTH: usize = 256;

/// Errors that make a byte buffer unusable as an XML document.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(String),

    #[error("document has no root element")]
    NoRootElement,

    /// SEC-003: nesting depth exceeds safety limit.
    #[error("nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("document ends inside <{0}>")]
    Unbalanced(String),
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Syntax(e.to_string())
    }
}

/// One element: resolved namespace, local name, attributes, leading text
/// and child elements in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Parses a complete document and returns its root element.
    ///
    /// Content must be well-formed: mismatched or unclosed tags, prefixes
    /// without a namespace declaration, undefined entities and text outside
    /// the root all fail the whole document.
    pub fn parse(bytes: &[u8]) -> Result<Element, XmlError> {
        // SEC-002: quick-xml never expands DOCTYPE entity declarations; only the
        // five predefined entities and character references are unescaped.
        // Text is kept untrimmed so that pieces split by comments or CDATA
        // join with their original spacing.
        let mut reader = NsReader::from_reader(bytes);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let (namespace, event) = match reader.read_resolved_event_into(&mut buf) {
                Ok((ns, event)) => (resolve_namespace(ns)?, event),
                Err(e) => return Err(e.into()),
            };

            match event {
                Event::Start(start) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    stack.push(Element::from_start(namespace, &start, reader.decoder())?);
                }
                Event::Empty(start) => {
                    let element = Element::from_start(namespace, &start, reader.decoder())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Syntax("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    push_text(&mut stack, &String::from_utf8_lossy(&raw))?;
                }
                Event::Eof => break,
                // declarations, comments, processing instructions, doctype
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Unbalanced(open.name.clone()));
        }
        root.ok_or(XmlError::NoRootElement)
    }

    fn from_start(
        namespace: Option<String>,
        start: &BytesStart<'_>,
        decoder: Decoder,
    ) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| XmlError::Syntax(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.decode_and_unescape_value(decoder)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            namespace,
            name,
            attributes,
            ..Self::default()
        })
    }

    /// Text content preceding the first child element, as written.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child named `name` with no namespace.
    pub fn child<'a>(&'a self, name: &'a str) -> Option<&'a Element> {
        self.children(name).next()
    }

    /// Direct children named `name` with no namespace, in document order.
    pub fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.namespace.is_none() && c.name == name)
    }

    /// First descendant (document order, any depth) in namespace `ns` named `name`.
    pub fn find_ns(&self, ns: &str, name: &str) -> Option<&Element> {
        self.descendants()
            .find(|e| e.name == name && e.namespace.as_deref() == Some(ns))
    }

    /// Pre-order walk over all elements below this one.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

/// Iterator returned by [`Element::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<&'a Element> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

fn resolve_namespace(ns: ResolveResult<'_>) -> Result<Option<String>, XmlError> {
    match ns {
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Bound(Namespace(uri)) => Ok(Some(String::from_utf8_lossy(uri).into_owned())),
        ResolveResult::Unknown(prefix) => Err(XmlError::Syntax(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

/// Hands a completed element to its parent, or makes it the document root.
fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::Syntax("multiple root elements".to_string())),
    }
}

/// Appends character data to the open element. Text after a child element
/// is tail text and is not kept. Only whitespace may appear outside the root.
fn push_text(stack: &mut [Element], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(open) if open.children.is_empty() => {
            open.text.push_str(text);
            Ok(())
        }
        Some(_) => Ok(()),
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::Syntax("text outside the root element".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_tree() {
        let doc = Element::parse(
            br#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Show</title><item><title>Ep 1</title></item><item/></channel></rss>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "rss");
        assert_eq!(doc.attr("version"), Some("2.0"));
        let channel = doc.child("channel").unwrap();
        assert_eq!(channel.child("title").unwrap().text(), "Show");
        assert_eq!(channel.children("item").count(), 2);
    }

    #[test]
    fn test_namespace_resolved_by_uri_not_prefix() {
        let doc = Element::parse(
            br#"<rss xmlns:pod="http://www.itunes.com/dtds/podcast-1.0.dtd">
                <channel><pod:author>Jane</pod:author></channel></rss>"#,
        )
        .unwrap();
        let channel = doc.child("channel").unwrap();
        assert_eq!(channel.find_ns(ITUNES_NS, "author").unwrap().text(), "Jane");
        // namespaced elements never match plain lookups
        assert!(channel.child("author").is_none());
    }

    #[test]
    fn test_find_ns_is_document_order_at_any_depth() {
        let doc = Element::parse(
            br#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><channel>
                <item><itunes:author>Deep</itunes:author></item>
                <itunes:author>Shallow</itunes:author>
            </channel></rss>"#,
        )
        .unwrap();
        let channel = doc.child("channel").unwrap();
        assert_eq!(channel.find_ns(ITUNES_NS, "author").unwrap().text(), "Deep");
    }

    #[test]
    fn test_entities_and_cdata() {
        let doc = Element::parse(
            b"<r><a>Tom &amp; Jerry</a><b><![CDATA[<p>bold</p>]]></b><c>&#65;</c></r>",
        )
        .unwrap();
        assert_eq!(doc.child("a").unwrap().text(), "Tom & Jerry");
        assert_eq!(doc.child("b").unwrap().text(), "<p>bold</p>");
        assert_eq!(doc.child("c").unwrap().text(), "A");
    }

    #[test]
    fn test_text_split_by_comment_or_cdata_keeps_spacing() {
        let doc = Element::parse(
            b"<r><a>Space <!-- c --> Show</a><b>Rockets <![CDATA[and orbits]]></b></r>",
        )
        .unwrap();
        assert_eq!(doc.child("a").unwrap().text(), "Space  Show");
        assert_eq!(doc.child("b").unwrap().text(), "Rockets and orbits");
    }

    #[test]
    fn test_whitespace_around_root_allowed() {
        let doc = Element::parse(b"<?xml version=\"1.0\"?>\n<r>\n  <a>x</a>\n</r>\n").unwrap();
        assert_eq!(doc.child("a").unwrap().text(), "x");
        assert!(Element::parse(b"<r/>trailing").is_err());
    }

    #[test]
    fn test_attribute_entities_decoded() {
        let doc = Element::parse(br#"<r><e url="https://a.example/x?a=1&amp;b=2"/></r>"#).unwrap();
        assert_eq!(
            doc.child("e").unwrap().attr("url"),
            Some("https://a.example/x?a=1&b=2")
        );
    }

    #[test]
    fn test_tail_text_not_kept() {
        let doc = Element::parse(b"<r>lead<x/>tail</r>").unwrap();
        assert_eq!(doc.text(), "lead");
    }

    #[test]
    fn test_malformed_documents_rejected() {
        assert!(matches!(Element::parse(b""), Err(XmlError::NoRootElement)));
        assert!(Element::parse(b"not xml at all").is_err());
        assert!(Element::parse(b"<rss><channel></rss>").is_err());
        assert!(matches!(
            Element::parse(b"<rss><channel>"),
            Err(XmlError::Unbalanced(_))
        ));
        assert!(Element::parse(b"<a/><b/>").is_err());
        assert!(Element::parse(b"<rss><itunes:author>x</itunes:author></rss>").is_err());
    }

    // SEC-003: nesting depth limit
    #[test]
    fn test_excessive_nesting_rejected() {
        let depth = MAX_DEPTH + 1;
        let doc = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
        assert!(matches!(
            Element::parse(doc.as_bytes()),
            Err(XmlError::MaxDepthExceeded(_))
        ));
    }

    #[test]
    fn test_descendants_preorder() {
        let doc = Element::parse(b"<r><a><b/></a><c/></r>").unwrap();
        let names: Vec<&str> = doc.descendants().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
