use crate::config::Config;
use crate::feed::extractor::extract_feed_urls;
use crate::feed::fetcher::HttpFetcher;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// Crawls podcast directory search pages for feed links.
///
/// Directories are fetched concurrently, but every request first passes a
/// per-host [`PolitenessGate`]: it waits a randomized delay, and requests to
/// the same host never overlap. A failing directory is logged and skipped.
#[derive(Debug, Clone)]
pub struct DirectoryCrawler {
    fetcher: HttpFetcher,
    default_directories: Vec<String>,
    delay_ms: (u64, u64),
    concurrency: usize,
}

impl DirectoryCrawler {
    pub fn new(fetcher: HttpFetcher, config: &Config) -> Self {
        Self {
            fetcher,
            default_directories: config.directories.clone(),
            delay_ms: (config.crawl_delay_min_ms, config.crawl_delay_max_ms),
            concurrency: config.max_concurrent_fetches.max(1),
        }
    }

    /// Searches each directory for `topic` and returns the union of feed URLs found.
    ///
    /// `directories` overrides the configured list for this call. The result
    /// is a set, so a feed listed by several directories appears once; its
    /// iteration order is lexicographic and independent of which directory
    /// answered first.
    pub async fn crawl(&self, topic: &str, directories: Option<&[String]>) -> BTreeSet<String> {
        let directories = directories.unwrap_or(self.default_directories.as_slice());
        let gate = PolitenessGate::default();

        let found: Vec<BTreeSet<String>> = stream::iter(directories)
            .map(|directory| self.crawl_one(directory, topic, &gate))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let feeds: BTreeSet<String> = found.into_iter().flatten().collect();
        tracing::info!(
            topic = %topic,
            directories = directories.len(),
            feeds = feeds.len(),
            "Directory crawl finished"
        );
        feeds
    }

    async fn crawl_one(
        &self,
        directory: &str,
        topic: &str,
        gate: &PolitenessGate,
    ) -> BTreeSet<String> {
        let url = match search_url(directory, topic) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    directory = %directory,
                    error = %e,
                    "Skipping directory with invalid base URL"
                );
                return BTreeSet::new();
            }
        };

        let host = url.host_str().unwrap_or_default().to_owned();
        let _turn = gate.acquire(&host, self.politeness_delay()).await;

        match self.fetcher.get(url.as_str()).await {
            Ok(page) => {
                let html = String::from_utf8_lossy(&page.body);
                let feeds = extract_feed_urls(&html, &page.final_url);
                tracing::debug!(url = %url, feeds = feeds.len(), "Crawled directory");
                feeds
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to crawl directory");
                BTreeSet::new()
            }
        }
    }

    fn politeness_delay(&self) -> Duration {
        let (min, max) = self.delay_ms;
        let ms = if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Duration::from_millis(ms)
    }
}

/// Builds `<base without trailing slash>/search?q=<topic>`.
pub fn search_url(directory: &str, topic: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}/search", directory.trim_end_matches('/')))?;
    url.query_pairs_mut().append_pair("q", topic);
    Ok(url)
}

/// Serializes requests per host and inserts the politeness delay before each.
///
/// Lives for a single crawl. Hosts never seen before get a fresh slot.
#[derive(Debug, Default)]
struct PolitenessGate {
    hosts: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PolitenessGate {
    /// Waits for the host's turn, then for `delay`. The host stays reserved
    /// until the returned guard is dropped.
    async fn acquire(&self, host: &str, delay: Duration) -> tokio::sync::OwnedMutexGuard<()> {
        let slot = {
            let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(hosts.entry(host.to_owned()).or_default())
        };
        let turn = slot.lock_owned().await;
        tokio::time::sleep(delay).await;
        turn
    }
}
