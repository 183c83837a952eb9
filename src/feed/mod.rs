//! Everything that touches the network or a feed document.
//!
//! - [`crawler`] - directory search pages → candidate feed URLs
//! - [`extractor`] - HTML scanning used by the crawler
//! - [`parser`] - feed URL → [`PodcastFeed`]
//! - [`fetcher`] - the shared HTTP GET capability
//!
//! `xml` and `date` are the parser's building blocks.

pub mod crawler;
mod date;
pub mod extractor;
pub mod fetcher;
pub mod parser;
mod xml;

pub use crawler::{search_url, DirectoryCrawler};
pub use date::{normalize_pub_date, parse_pub_date};
pub use extractor::{extract_feed_urls, is_feed_like};
pub use fetcher::{FetchError, FetchedPage, HttpFetcher};
pub use parser::{
    parse_feed_bytes, Episode, EpisodeType, FeedParser, ParseFailure, ParseOutcome, PodcastFeed,
};
pub use xml::{Element, XmlError, ITUNES_NS};
