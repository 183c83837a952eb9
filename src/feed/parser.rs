use crate::feed::date::parse_pub_date;
use crate::feed::fetcher::{FetchError, HttpFetcher};
use crate::feed::xml::{Element, XmlError, ITUNES_NS};
use crate::util::strip_control_chars;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Title given to a feed that could not be fetched or parsed.
pub const FALLBACK_TITLE: &str = "Unknown";

/// Why a feed degraded to the empty fallback record.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("malformed feed: {0}")]
    Xml(#[from] XmlError),
    #[error("document has no <channel> element")]
    MissingChannel,
}

/// Result of parsing one feed URL. Parsing is total: failures still carry a
/// usable (empty) [`PodcastFeed`].
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(PodcastFeed),
    Fallback {
        feed: PodcastFeed,
        reason: ParseFailure,
    },
}

impl ParseOutcome {
    fn fallback(feed_url: &str, reason: ParseFailure) -> Self {
        ParseOutcome::Fallback {
            feed: PodcastFeed::fallback(feed_url),
            reason,
        }
    }

    pub fn feed(&self) -> &PodcastFeed {
        match self {
            ParseOutcome::Parsed(feed) | ParseOutcome::Fallback { feed, .. } => feed,
        }
    }

    pub fn into_feed(self) -> PodcastFeed {
        match self {
            ParseOutcome::Parsed(feed) | ParseOutcome::Fallback { feed, .. } => feed,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::Fallback { .. })
    }
}

/// A podcast channel and its episodes, in feed document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodcastFeed {
    pub feed_url: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub language: String,
    pub copyright: String,
    pub last_build_date: String,
    pub author: String,
    pub explicit: bool,
    pub image_url: String,
    pub episodes: Vec<Episode>,
}

impl PodcastFeed {
    /// The empty record returned when a feed cannot be used.
    pub fn fallback(feed_url: &str) -> Self {
        Self {
            feed_url: feed_url.to_owned(),
            title: FALLBACK_TITLE.to_owned(),
            description: String::new(),
            link: String::new(),
            language: String::new(),
            copyright: String::new(),
            last_build_date: String::new(),
            author: String::new(),
            explicit: false,
            image_url: String::new(),
            episodes: Vec::new(),
        }
    }
}

/// `itunes:episodeType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeType {
    #[default]
    Full,
    Trailer,
    Bonus,
}

impl EpisodeType {
    /// Unrecognized values are treated as full episodes.
    fn from_itunes(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "trailer" => EpisodeType::Trailer,
            "bonus" => EpisodeType::Bonus,
            _ => EpisodeType::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub title: String,
    pub description: String,
    pub link: String,
    pub guid: String,
    /// `pubDate` exactly as the feed wrote it (trimmed).
    pub pub_date: String,
    pub published_date: Option<NaiveDate>,
    pub audio_url: String,
    pub mime_type: String,
    /// Enclosure `length` attribute as written; see [`Episode::length_bytes`].
    pub length: String,
    pub duration: String,
    pub explicit: bool,
    pub episode_type: EpisodeType,
}

impl Episode {
    pub fn length_bytes(&self) -> Option<u64> {
        self.length.trim().parse().ok()
    }

    /// `YYYY-MM-DD`, or empty when the publish date was missing or unparsable.
    pub fn published_date_string(&self) -> String {
        self.published_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Fetches and parses podcast RSS feeds.
#[derive(Debug, Clone)]
pub struct FeedParser {
    fetcher: HttpFetcher,
}

impl FeedParser {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches `feed_url` and parses it. Never fails: transport and format
    /// problems are logged and produce [`ParseOutcome::Fallback`].
    pub async fn parse(&self, feed_url: &str) -> ParseOutcome {
        match self.fetcher.get(feed_url).await {
            Ok(page) => parse_feed_bytes(&page.body, feed_url),
            Err(e) => {
                tracing::warn!(feed = %feed_url, error = %e, "Failed to fetch feed");
                ParseOutcome::fallback(feed_url, e.into())
            }
        }
    }
}

/// Parses an RSS document already in memory.
pub fn parse_feed_bytes(bytes: &[u8], feed_url: &str) -> ParseOutcome {
    let root = match Element::parse(bytes) {
        Ok(root) => root,
        Err(e) => {
            tracing::error!(feed = %feed_url, error = %e, "Error parsing feed");
            return ParseOutcome::fallback(feed_url, e.into());
        }
    };

    let Some(channel) = root.child("channel") else {
        tracing::warn!(feed = %feed_url, root = %root.name, "Invalid RSS feed format");
        return ParseOutcome::fallback(feed_url, ParseFailure::MissingChannel);
    };

    let episodes: Vec<Episode> = channel.children("item").map(parse_item).collect();
    tracing::debug!(feed = %feed_url, episodes = episodes.len(), "Parsed feed");

    ParseOutcome::Parsed(PodcastFeed {
        feed_url: feed_url.to_owned(),
        title: text_or(channel.child("title"), "Unknown Podcast"),
        description: text_or(channel.child("description"), ""),
        link: text_or(channel.child("link"), ""),
        language: text_or(channel.child("language"), "en"),
        copyright: text_or(channel.child("copyright"), ""),
        last_build_date: text_or(channel.child("lastBuildDate"), ""),
        author: text_or(channel.find_ns(ITUNES_NS, "author"), ""),
        explicit: is_explicit(channel.find_ns(ITUNES_NS, "explicit")),
        image_url: attr_or(channel.find_ns(ITUNES_NS, "image"), "href", ""),
        episodes,
    })
}

fn parse_item(item: &Element) -> Episode {
    let pub_date = text_or(item.child("pubDate"), "");
    let published_date = parse_pub_date(&pub_date);
    let enclosure = item.child("enclosure");

    Episode {
        title: text_or(item.child("title"), "Unknown Episode"),
        description: text_or(item.child("description"), ""),
        link: text_or(item.child("link"), ""),
        guid: text_or(item.child("guid"), ""),
        pub_date,
        published_date,
        audio_url: attr_or(enclosure, "url", ""),
        mime_type: attr_or(enclosure, "type", ""),
        length: attr_or(enclosure, "length", ""),
        duration: text_or(item.find_ns(ITUNES_NS, "duration"), ""),
        explicit: is_explicit(item.find_ns(ITUNES_NS, "explicit")),
        episode_type: item
            .find_ns(ITUNES_NS, "episodeType")
            .map(|e| EpisodeType::from_itunes(e.text()))
            .unwrap_or_default(),
    }
}

/// Trimmed, sanitized element text; `default` when the element is absent or blank.
fn text_or(element: Option<&Element>, default: &str) -> String {
    element
        .map(|e| e.text().trim())
        .filter(|text| !text.is_empty())
        .map(|text| strip_control_chars(text).into_owned())
        .unwrap_or_else(|| default.to_owned())
}

fn attr_or(element: Option<&Element>, key: &str, default: &str) -> String {
    element
        .and_then(|e| e.attr(key))
        .map(|value| strip_control_chars(value.trim()).into_owned())
        .unwrap_or_else(|| default.to_owned())
}

/// `itunes:explicit` is "yes"/"no" in older feeds and "true"/"false" in
/// newer ones. Absent means not explicit.
fn is_explicit(element: Option<&Element>) -> bool {
    element.is_some_and(|e| {
        matches!(
            e.text().trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "explicit"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED_URL: &str = "https://feeds.example.com/space.xml";

    const PODCAST_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Orbital Hour</title>
    <description>Weekly space news</description>
    <link>https://orbital.example.com</link>
    <atom:link href="https://feeds.example.com/space.xml" rel="self"/>
    <language>en-gb</language>
    <copyright>2023 Orbital</copyright>
    <lastBuildDate>Mon, 02 Jan 2023 15:04:05 +0000</lastBuildDate>
    <itunes:author>Jane Doe</itunes:author>
    <itunes:explicit>yes</itunes:explicit>
    <itunes:image href="https://orbital.example.com/art.jpg"/>
    <item>
      <title>Space Exploration Update</title>
      <description><![CDATA[Rockets &amp; orbits]]></description>
      <link>https://orbital.example.com/1</link>
      <guid isPermaLink="false">ep-1</guid>
      <pubDate>Mon, 02 Jan 2023 15:04:05 +0000</pubDate>
      <enclosure url="https://cdn.example.com/1.mp3" type="audio/mpeg" length="12345"/>
      <itunes:duration>42:10</itunes:duration>
      <itunes:episodeType>trailer</itunes:episodeType>
    </item>
    <item>
      <title>Cooking Tips</title>
      <pubDate>whenever</pubDate>
    </item>
  </channel>
</rss>"#;

    fn parsed(xml: &str) -> PodcastFeed {
        match parse_feed_bytes(xml.as_bytes(), FEED_URL) {
            ParseOutcome::Parsed(feed) => feed,
            ParseOutcome::Fallback { reason, .. } => panic!("Expected Parsed, got {reason}"),
        }
    }

    #[test]
    fn test_channel_fields() {
        let feed = parsed(PODCAST_RSS);
        assert_eq!(feed.title, "Orbital Hour");
        assert_eq!(feed.description, "Weekly space news");
        assert_eq!(feed.link, "https://orbital.example.com");
        assert_eq!(feed.language, "en-gb");
        assert_eq!(feed.copyright, "2023 Orbital");
        assert_eq!(feed.last_build_date, "Mon, 02 Jan 2023 15:04:05 +0000");
        assert_eq!(feed.author, "Jane Doe");
        assert!(feed.explicit);
        assert_eq!(feed.image_url, "https://orbital.example.com/art.jpg");
        assert_eq!(feed.episodes.len(), 2);
    }

    #[test]
    fn test_episode_fields() {
        let feed = parsed(PODCAST_RSS);
        let ep = &feed.episodes[0];
        assert_eq!(ep.title, "Space Exploration Update");
        assert_eq!(ep.description, "Rockets &amp; orbits");
        assert_eq!(ep.link, "https://orbital.example.com/1");
        assert_eq!(ep.guid, "ep-1");
        assert_eq!(ep.pub_date, "Mon, 02 Jan 2023 15:04:05 +0000");
        assert_eq!(ep.published_date_string(), "2023-01-02");
        assert_eq!(ep.audio_url, "https://cdn.example.com/1.mp3");
        assert_eq!(ep.mime_type, "audio/mpeg");
        assert_eq!(ep.length_bytes(), Some(12345));
        assert_eq!(ep.duration, "42:10");
        assert!(!ep.explicit);
        assert_eq!(ep.episode_type, EpisodeType::Trailer);
    }

    #[test]
    fn test_episode_defaults() {
        let feed = parsed(PODCAST_RSS);
        let ep = &feed.episodes[1];
        assert_eq!(ep.title, "Cooking Tips");
        assert_eq!(ep.description, "");
        assert_eq!(ep.guid, "");
        assert_eq!(ep.pub_date, "whenever");
        assert_eq!(ep.published_date, None);
        assert_eq!(ep.published_date_string(), "");
        assert_eq!(ep.audio_url, "");
        assert_eq!(ep.mime_type, "");
        assert_eq!(ep.length, "");
        assert_eq!(ep.duration, "");
        assert_eq!(ep.episode_type, EpisodeType::Full);
    }

    #[test]
    fn test_episode_order_follows_document() {
        let feed = parsed(PODCAST_RSS);
        let titles: Vec<&str> = feed.episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Space Exploration Update", "Cooking Tips"]);
    }

    #[test]
    fn test_channel_defaults() {
        let feed = parsed("<rss><channel><title>   </title><item/></channel></rss>");
        assert_eq!(feed.title, "Unknown Podcast");
        assert_eq!(feed.description, "");
        assert_eq!(feed.language, "en");
        assert_eq!(feed.author, "");
        assert!(!feed.explicit);
        assert_eq!(feed.image_url, "");
        assert_eq!(feed.episodes[0].title, "Unknown Episode");
    }

    #[test]
    fn test_atom_link_does_not_shadow_channel_link() {
        let feed = parsed(
            r#"<rss xmlns:atom="http://www.w3.org/2005/Atom"><channel>
                <atom:link href="https://self.example.com"/>
                <link>https://site.example.com</link>
            </channel></rss>"#,
        );
        assert_eq!(feed.link, "https://site.example.com");
    }

    #[test]
    fn test_control_chars_stripped() {
        let feed = parsed("<rss><channel><title>Evil\x1b[31m Show</title></channel></rss>");
        assert_eq!(feed.title, "Evil Show");
    }

    #[test]
    fn test_text_around_comments_and_cdata_keeps_word_breaks() {
        let feed = parsed(
            "<rss><channel><item>\
             <title>Space <!-- c --> Show</title>\
             <description>Rockets <![CDATA[and orbits]]></description>\
             </item></channel></rss>",
        );
        let episode = &feed.episodes[0];
        assert_eq!(episode.title, "Space  Show");
        assert_eq!(episode.description, "Rockets and orbits");
    }

    #[test]
    fn test_missing_channel_falls_back() {
        let outcome = parse_feed_bytes(
            br#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Atom</title></feed>"#,
            FEED_URL,
        );
        assert!(matches!(
            outcome,
            ParseOutcome::Fallback {
                reason: ParseFailure::MissingChannel,
                ..
            }
        ));
        assert_eq!(outcome.feed().title, FALLBACK_TITLE);
    }

    #[test]
    fn test_garbage_falls_back() {
        for body in [&b""[..], b"not xml", b"<rss><channel>", b"\xff\xfe\x00garbage"] {
            let outcome = parse_feed_bytes(body, FEED_URL);
            assert!(outcome.is_fallback(), "input: {body:?}");
            let feed = outcome.into_feed();
            assert_eq!(feed.title, "Unknown");
            assert_eq!(feed.description, "");
            assert!(feed.episodes.is_empty());
        }
    }

    #[tokio::test]
    async fn test_parse_404_returns_unknown() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let config = Config {
            allow_private_hosts: true,
            ..Config::default()
        };
        let parser = FeedParser::new(HttpFetcher::new(&config).unwrap());
        let outcome = parser.parse(&format!("{}/feed.xml", mock_server.uri())).await;

        assert!(matches!(
            outcome,
            ParseOutcome::Fallback {
                reason: ParseFailure::Fetch(FetchError::HttpStatus(404)),
                ..
            }
        ));
        let feed = outcome.into_feed();
        assert_eq!(feed.title, "Unknown");
        assert_eq!(feed.description, "");
        assert!(feed.episodes.is_empty());
    }

    #[tokio::test]
    async fn test_parse_fetches_and_parses() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PODCAST_RSS)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        let config = Config {
            allow_private_hosts: true,
            ..Config::default()
        };
        let parser = FeedParser::new(HttpFetcher::new(&config).unwrap());
        let url = format!("{}/feed.xml", mock_server.uri());
        let feed = parser.parse(&url).await.into_feed();

        assert_eq!(feed.title, "Orbital Hour");
        assert_eq!(feed.feed_url, url);
        assert_eq!(feed.episodes.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_parser_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let outcome = parse_feed_bytes(&bytes, FEED_URL);
            if outcome.is_fallback() {
                prop_assert_eq!(outcome.feed().title.as_str(), "Unknown");
                prop_assert!(outcome.feed().episodes.is_empty());
            }
        }

        #[test]
        fn prop_parser_is_total_on_xmlish_input(body in "<rss>(<channel>)?[<>/a-z &;!\\[\\]]{0,120}") {
            let _ = parse_feed_bytes(body.as_bytes(), FEED_URL);
        }
    }
}
