use crate::feed::{Episode, PodcastFeed};
use crate::util::truncate_to_width;
use serde::Serialize;
use std::fmt;

/// Relevant episodes kept per podcast.
pub const MAX_EPISODES_PER_PODCAST: usize = 3;

const PODCAST_DESCRIPTION_WIDTH: usize = 200;
const EPISODE_DESCRIPTION_WIDTH: usize = 150;
const SEPARATOR_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub title: String,
    pub description: String,
    pub audio_url: String,
    /// `YYYY-MM-DD`, or empty when unknown.
    pub published_date: String,
}

impl From<&Episode> for EpisodeSummary {
    fn from(episode: &Episode) -> Self {
        Self {
            title: episode.title.clone(),
            description: episode.description.clone(),
            audio_url: episode.audio_url.clone(),
            published_date: episode.published_date_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodcastSummary {
    pub title: String,
    pub description: String,
    pub episodes: Vec<EpisodeSummary>,
}

impl PodcastSummary {
    /// Summarizes `feed` with the first [`MAX_EPISODES_PER_PODCAST`] of `ranked`.
    pub fn new(feed: &PodcastFeed, ranked: &[&Episode]) -> Self {
        Self {
            title: feed.title.clone(),
            description: feed.description.clone(),
            episodes: ranked
                .iter()
                .take(MAX_EPISODES_PER_PODCAST)
                .map(|episode| EpisodeSummary::from(*episode))
                .collect(),
        }
    }
}

/// Accepted podcasts in processing order, with a running episode count.
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    podcasts: Vec<PodcastSummary>,
    total_episodes: usize,
}

impl DiscoveryResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Podcasts without episodes are ignored.
    pub fn push(&mut self, podcast: PodcastSummary) {
        if podcast.episodes.is_empty() {
            return;
        }
        self.total_episodes += podcast.episodes.len();
        self.podcasts.push(podcast);
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    pub fn podcasts(&self) -> &[PodcastSummary] {
        &self.podcasts
    }

    /// True once the episode count has reached `max_results`. Checked after
    /// each push, so the last podcast may overshoot.
    pub fn is_full(&self, max_results: usize) -> bool {
        self.total_episodes >= max_results
    }

    pub fn into_report(self) -> Report {
        if self.podcasts.is_empty() {
            Report::NoRelevant
        } else {
            Report::Podcasts {
                podcasts: self.podcasts,
            }
        }
    }
}

/// Final outcome of a discovery run. `Display` renders the text handed back
/// to the caller; every variant is a normal return value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report {
    NoFeeds { topic: String },
    NoRelevant,
    Error { message: String },
    Podcasts { podcasts: Vec<PodcastSummary> },
}

impl Report {
    pub fn error(message: impl fmt::Display) -> Self {
        Report::Error {
            message: message.to_string(),
        }
    }

    pub fn total_episodes(&self) -> usize {
        match self {
            Report::Podcasts { podcasts } => podcasts.iter().map(|p| p.episodes.len()).sum(),
            _ => 0,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::NoFeeds { topic } => write!(f, "No podcast feeds found for topic: {topic}"),
            Report::NoRelevant => f.write_str("No relevant podcasts found."),
            Report::Error { message } => write!(f, "Error discovering podcasts: {message}"),
            Report::Podcasts { podcasts } => {
                write!(f, "Found {} relevant podcasts:\n\n", podcasts.len())?;
                for (i, podcast) in podcasts.iter().enumerate() {
                    write_podcast(f, i + 1, podcast)?;
                }
                Ok(())
            }
        }
    }
}

fn write_podcast(
    f: &mut fmt::Formatter<'_>,
    number: usize,
    podcast: &PodcastSummary,
) -> fmt::Result {
    writeln!(f, "📌 {number}. {}", podcast.title)?;
    if !podcast.description.is_empty() {
        writeln!(
            f,
            "   {}",
            truncate_to_width(&podcast.description, PODCAST_DESCRIPTION_WIDTH)
        )?;
    }

    if podcast.episodes.is_empty() {
        writeln!(f, "   No relevant episodes found.")?;
    } else {
        write!(f, "\n   🎙️ Latest relevant episodes:\n")?;
        for (j, episode) in podcast.episodes.iter().enumerate() {
            writeln!(f, "   {}. {}", j + 1, episode.title)?;
            if !episode.published_date.is_empty() {
                writeln!(f, "      Published: {}", episode.published_date)?;
            }
            if !episode.description.is_empty() {
                writeln!(
                    f,
                    "      {}",
                    truncate_to_width(&episode.description, EPISODE_DESCRIPTION_WIDTH)
                )?;
            }
            if !episode.audio_url.is_empty() {
                writeln!(f, "      🔊 Listen: {}", episode.audio_url)?;
            }
            writeln!(f)?;
        }
    }

    write!(f, "\n{}\n\n", "-".repeat(SEPARATOR_WIDTH))
}
