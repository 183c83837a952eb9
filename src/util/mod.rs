//! Utility functions shared by the crawler, parser and report renderer.
//!
//! - **URL validation**: SSRF guard applied before any scraped link is fetched
//! - **Text processing**: control-character stripping and width-aware clipping
//!
//! # Examples
//!
//! ```
//! use podcrawler::util::{strip_control_chars, truncate_to_width, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml", false).unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(strip_control_chars("\x1b[1mBold\x1b[0m"), "Bold");
//! assert_eq!(truncate_to_width("Long episode title", 10), "Long ep...");
//! ```

mod text;
mod url_validator;

pub use text::{strip_control_chars, truncate_to_width};
pub use url_validator::{validate_url, UrlValidationError};
