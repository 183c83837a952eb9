//! Podcast discovery: crawl directory search pages for RSS feeds, parse them,
//! and rank episodes by how well they match a topic.

pub mod config;
pub mod discovery;
pub mod feed;
pub mod mcp;
pub mod util;
