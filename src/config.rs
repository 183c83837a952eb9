//! Configuration file parser for ~/.config/podcrawler/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Defaults
// ============================================================================

/// Podcast directories crawled when neither the config file nor the caller
/// supplies a list.
pub const DEFAULT_DIRECTORIES: [&str; 3] = [
    "https://podcastindex.org/",
    "https://www.listennotes.com/",
    "https://player.fm/",
];

/// Identifying user agent sent with every directory and feed request.
pub fn default_user_agent() -> String {
    format!(
        "PodCrawlerMCP/{} (+https://github.com/infinitimeless/podcrawler-mcp)",
        env!("CARGO_PKG_VERSION")
    )
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Process-wide configuration, resolved once at startup and handed to each
/// component by the caller.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory base URLs to crawl instead of the built-in list.
    pub directories: Vec<String>,

    /// Per-request timeout covering connect, headers and body.
    pub request_timeout_secs: u64,

    /// Lower bound of the randomized politeness delay before each directory request.
    pub crawl_delay_min_ms: u64,

    /// Upper bound of the randomized politeness delay.
    pub crawl_delay_max_ms: u64,

    /// How many directory pages or feeds may be in flight at once.
    pub max_concurrent_fetches: usize,

    /// Responses larger than this are abandoned.
    pub max_response_bytes: usize,

    /// Allow fetching localhost and private network addresses.
    pub allow_private_hosts: bool,

    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directories: DEFAULT_DIRECTORIES.iter().map(|d| d.to_string()).collect(),
            request_timeout_secs: 10,
            crawl_delay_min_ms: 1_000,
            crawl_delay_max_ms: 3_000,
            max_concurrent_fetches: 4,
            max_response_bytes: 10 * 1024 * 1024,
            allow_private_hosts: false,
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "directories",
        "request_timeout_secs",
        "crawl_delay_min_ms",
        "crawl_delay_max_ms",
        "max_concurrent_fetches",
        "max_response_bytes",
        "allow_private_hosts",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Inconsistent values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            directories = config.directories.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses configuration from TOML text. Blank text yields defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the crawler cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl_delay_min_ms > self.crawl_delay_max_ms {
            return Err(ConfigError::Invalid(format!(
                "crawl_delay_min_ms ({}) exceeds crawl_delay_max_ms ({})",
                self.crawl_delay_min_ms, self.crawl_delay_max_ms
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
