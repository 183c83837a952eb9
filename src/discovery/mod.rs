//! Topic → ranked podcast report.
//!
//! [`DiscoveryPipeline`] crawls directories for feed URLs, parses each feed,
//! keeps the episodes [`RelevanceFilter`] ranks above threshold and stops
//! once enough episodes have been collected. Individual directory or feed
//! failures only shrink the result; the run itself always produces a
//! [`Report`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), podcrawler::feed::FetchError> {
//! use podcrawler::config::Config;
//! use podcrawler::discovery::DiscoveryPipeline;
//!
//! let pipeline = DiscoveryPipeline::new(&Config::default())?;
//! let report = pipeline.discover_podcasts("space", 10).await;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod relevance;
mod report;

pub use relevance::{expand_topic, stem, tokenize, RelevanceFilter, RELEVANCE_THRESHOLD};
pub use report::{
    DiscoveryResult, EpisodeSummary, PodcastSummary, Report, MAX_EPISODES_PER_PODCAST,
};

use crate::config::Config;
use crate::feed::{DirectoryCrawler, FeedParser, FetchError, HttpFetcher};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default for `max_results` when the caller gives none.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Ways a run can end without a report.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery was cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone)]
pub struct DiscoveryPipeline {
    crawler: DirectoryCrawler,
    parser: FeedParser,
    concurrency: usize,
}

impl DiscoveryPipeline {
    /// Builds every component from one shared HTTP client.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(config)?;
        Ok(Self::from_parts(
            DirectoryCrawler::new(fetcher.clone(), config),
            FeedParser::new(fetcher),
            config.max_concurrent_fetches,
        ))
    }

    pub fn from_parts(crawler: DirectoryCrawler, parser: FeedParser, concurrency: usize) -> Self {
        Self {
            crawler,
            parser,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs one discovery.
    ///
    /// At most `max_results` feeds are attempted, in the crawl's (sorted)
    /// order. Feeds are fetched concurrently but accepted in that order, and
    /// fetching stops as soon as the accepted podcasts hold `max_results`
    /// episodes; the podcast that crosses the limit is kept whole.
    ///
    /// `directories` replaces the configured directory list for this run.
    /// Cancelling `cancel` aborts in-flight requests and discards everything
    /// collected so far.
    pub async fn discover(
        &self,
        topic: &str,
        max_results: usize,
        directories: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<Report, DiscoveryError> {
        let run = AssertUnwindSafe(self.run(topic, max_results, directories)).catch_unwind();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(topic = %topic, "Discovery cancelled");
                Err(DiscoveryError::Cancelled)
            }
            outcome = run => outcome.map_err(|panic| {
                let message = panic_message(&*panic);
                tracing::error!(topic = %topic, error = %message, "Discovery aborted");
                DiscoveryError::Panicked(message)
            }),
        }
    }

    /// [`discover`](Self::discover) over the configured directories, with
    /// every failure folded into [`Report::Error`].
    pub async fn discover_podcasts(&self, topic: &str, max_results: usize) -> Report {
        self.discover(topic, max_results, None, &CancellationToken::new())
            .await
            .unwrap_or_else(Report::error)
    }

    async fn run(&self, topic: &str, max_results: usize, directories: Option<&[String]>) -> Report {
        let feeds = self.crawler.crawl(topic, directories).await;
        if feeds.is_empty() {
            tracing::info!(topic = %topic, "No podcast feeds found");
            return Report::NoFeeds {
                topic: topic.to_owned(),
            };
        }

        let filter = RelevanceFilter::new(topic);
        let mut result = DiscoveryResult::new();
        let mut summaries = stream::iter(feeds.iter().take(max_results))
            .map(|url| self.summarize_feed(url, &filter))
            .buffered(self.concurrency);

        while let Some(summary) = summaries.next().await {
            let Some(summary) = summary else { continue };
            result.push(summary);
            if result.is_full(max_results) {
                break;
            }
        }

        tracing::info!(
            topic = %topic,
            feeds = feeds.len(),
            podcasts = result.podcasts().len(),
            episodes = result.total_episodes(),
            "Discovery finished"
        );
        result.into_report()
    }

    /// Parses and filters one feed. `None` when it has no relevant episodes
    /// or processing it panicked.
    async fn summarize_feed(&self, url: &str, filter: &RelevanceFilter) -> Option<PodcastSummary> {
        let work = async {
            let feed = self.parser.parse(url).await.into_feed();
            let ranked = filter.filter(&feed);
            if ranked.is_empty() {
                tracing::debug!(feed = %url, "No relevant episodes");
                return None;
            }
            Some(PodcastSummary::new(&feed, &ranked))
        };

        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(summary) => summary,
            Err(panic) => {
                tracing::warn!(feed = %url, error = %panic_message(&*panic), "Skipping feed");
                None
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extracts_payload() {
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");

        let n = 7;
        let payload = std::panic::catch_unwind(|| panic!("formatted {n}")).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 7");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(panic_message(&*payload), "unknown panic");
    }

    #[test]
    fn test_error_report_text() {
        let report = Report::error(DiscoveryError::Cancelled);
        assert_eq!(
            report.to_string(),
            "Error discovering podcasts: discovery was cancelled"
        );
    }
}
