//! Feed link extraction from directory search-result pages.
//!
//! Uses simple tag scanning rather than a full HTML parser: directory pages
//! are only mined for `<link>` and `<a>` attributes, and the scanner never
//! fails on malformed markup. It just stops finding tags.
use std::borrow::Cow;
use std::collections::BTreeSet;
use url::Url;

/// `<link type="...">` value marking an RSS alternate.
const RSS_LINK_TYPE: &str = "application/rss+xml";

/// Substrings of an anchor's `href` that make it a feed candidate.
const ANCHOR_HREF_HINTS: [&str; 5] = [
    ".rss",
    "feed",
    "itunes.apple.com",
    "podcasts.apple.com",
    "spotify.com/show",
];

/// Elements whose content is text, never markup, and must not be scanned for tags.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// Returns the absolute feed URLs found in `html`.
///
/// Candidates are `<link type="application/rss+xml">` hrefs and anchors whose
/// href mentions `.rss`, `feed` or a known podcast host. Each candidate is
/// resolved against `base_url` and kept only if it looks like a feed (see
/// [`is_feed_like`]). Unresolvable hrefs are dropped. Garbage input yields an
/// empty set.
pub fn extract_feed_urls(html: &str, base_url: &str) -> BTreeSet<String> {
    let base = Url::parse(base_url).ok();

    TagScanner::new(html)
        .filter_map(|tag| candidate_href(&tag).map(Cow::into_owned))
        .filter_map(|href| resolve_url(&href, base.as_ref()))
        .filter(|url| is_feed_like(url))
        .collect()
}

/// The href a tag contributes as a feed candidate, if any.
fn candidate_href<'a>(tag: &Tag<'a>) -> Option<Cow<'a, str>> {
    match tag.name.as_str() {
        "link" => {
            let is_rss = tag
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case(RSS_LINK_TYPE));
            if is_rss {
                tag.attr_owned("href")
            } else {
                None
            }
        }
        "a" => tag
            .attr_owned("href")
            .filter(|href| ANCHOR_HREF_HINTS.iter().any(|hint| href.contains(hint))),
        _ => None,
    }
}

/// Resolves a possibly relative href against the page URL.
fn resolve_url(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    Some(resolved.to_string())
}

/// Heuristic feed test applied to every resolved candidate.
pub fn is_feed_like(url: &str) -> bool {
    if url.ends_with(".rss") || url.ends_with(".xml") {
        return true;
    }
    let lower = url.to_lowercase();
    lower.contains("feed") || lower.contains("rss") || lower.contains("podcast")
}

// ============================================================================
// Tag scanning
// ============================================================================

/// A start tag with lowercased name and attribute names.
#[derive(Debug)]
struct Tag<'a> {
    name: String,
    attrs: Vec<(String, &'a str)>,
}

impl<'a> Tag<'a> {
    fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }

    /// Attribute value with character references decoded.
    fn attr_owned(&self, name: &str) -> Option<Cow<'a, str>> {
        self.attr(name).map(decode_entities)
    }
}

/// Iterates start tags in document order, skipping comments, end tags,
/// doctype/processing instructions and the bodies of `<script>`/`<style>`.
struct TagScanner<'a> {
    html: &'a str,
    pos: usize,
}

impl<'a> TagScanner<'a> {
    fn new(html: &'a str) -> Self {
        Self { html, pos: 0 }
    }

    /// Moves `pos` past the next occurrence of `needle` (case-insensitive),
    /// or to the end of input.
    fn skip_past(&mut self, needle: &str) {
        let haystack = &self.html.as_bytes()[self.pos..];
        let found = haystack
            .windows(needle.len())
            .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()));
        self.pos = match found {
            Some(idx) => self.pos + idx + needle.len(),
            None => self.html.len(),
        };
    }
}

impl<'a> Iterator for TagScanner<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Tag<'a>> {
        let html = self.html;
        let bytes = html.as_bytes();
        loop {
            let lt = self.html[self.pos..].find('<')? + self.pos;
            self.pos = lt + 1;

            let rest = &self.html[self.pos..];
            if rest.starts_with("!--") {
                self.skip_past("-->");
                continue;
            }

            let name_len = rest
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric())
                .count();
            if name_len == 0 || !rest.as_bytes()[0].is_ascii_alphabetic() {
                // end tag, doctype, processing instruction or a stray '<'
                continue;
            }
            let name = rest[..name_len].to_ascii_lowercase();
            self.pos += name_len;

            // "<ab" must not be read as "<a" followed by junk
            match bytes.get(self.pos) {
                Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => {}
                None => {}
                Some(_) => continue,
            }

            let (attrs, end) = parse_attributes(html, self.pos)?;
            self.pos = end;

            if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                self.skip_past(&format!("</{name}"));
            }

            return Some(Tag { name, attrs });
        }
    }
}

/// Parses attributes starting at `pos` up to the closing `>`.
///
/// Returns the attributes and the index just past `>`, or `None` when the
/// input ends inside the tag.
fn parse_attributes(html: &str, mut pos: usize) -> Option<(Vec<(String, &str)>, usize)> {
    let bytes = html.as_bytes();
    let mut attrs = Vec::new();

    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b'/') {
            pos += 1;
        }
        if *bytes.get(pos)? == b'>' {
            return Some((attrs, pos + 1));
        }

        let name_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/')
        {
            pos += 1;
        }
        let name = html[name_start..pos].to_ascii_lowercase();

        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if bytes.get(pos) != Some(&b'=') {
            attrs.push((name, ""));
            continue;
        }
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let value = match *bytes.get(pos)? {
            quote @ (b'"' | b'\'') => {
                let start = pos + 1;
                let len = bytes[start..].iter().position(|&b| b == quote)?;
                pos = start + len + 1;
                &html[start..start + len]
            }
            _ => {
                let start = pos;
                while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>'
                {
                    pos += 1;
                }
                &html[start..pos]
            }
        };
        attrs.push((name, value));
    }
}

/// Decodes the character references that commonly appear in hrefs.
fn decode_entities(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "lt" => Some('<'),
                "gt" => Some('>'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
