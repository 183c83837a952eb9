use crate::feed::{Episode, PodcastFeed};
use std::collections::HashSet;

/// Episodes must score strictly above this to be kept.
pub const RELEVANCE_THRESHOLD: f64 = 0.2;

const TITLE_WEIGHT: f64 = 0.7;
const DESCRIPTION_WEIGHT: f64 = 0.3;

/// Scores episodes against one topic.
///
/// Built from the topic's stemmed words plus naive inflections of each, so
/// "space" also matches "spaces". Construct one per discovery run.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    terms: HashSet<String>,
}

impl RelevanceFilter {
    pub fn new(topic: &str) -> Self {
        Self {
            terms: expand_topic(topic),
        }
    }

    /// Episodes scoring above [`RELEVANCE_THRESHOLD`], best first. Equal
    /// scores keep feed order.
    pub fn filter<'a>(&self, feed: &'a PodcastFeed) -> Vec<&'a Episode> {
        let mut scored: Vec<(f64, &Episode)> = feed
            .episodes
            .iter()
            .map(|episode| (self.score(episode), episode))
            .filter(|(score, _)| *score > RELEVANCE_THRESHOLD)
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, episode)| episode).collect()
    }

    /// Weighted overlap of title and description words with the topic terms, in `[0, 1]`.
    pub fn score(&self, episode: &Episode) -> f64 {
        TITLE_WEIGHT * self.overlap(&episode.title)
            + DESCRIPTION_WEIGHT * self.overlap(&episode.description)
    }

    fn overlap(&self, text: &str) -> f64 {
        let words = tokenize(text);
        let hits = words.iter().filter(|w| self.terms.contains(*w)).count();
        hits as f64 / words.len().max(1) as f64
    }
}

/// Lowercased word tokens (letters, digits and `_`), deduplicated.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Strips one suffix: "ing", else "s", else "ed".
pub fn stem(word: &str) -> &str {
    word.strip_suffix("ing")
        .or_else(|| word.strip_suffix('s'))
        .or_else(|| word.strip_suffix("ed"))
        .unwrap_or(word)
}

/// Stemmed topic words, plus `s`/`ing`/`ed` forms of stems longer than three characters.
pub fn expand_topic(topic: &str) -> HashSet<String> {
    let stems: HashSet<String> = tokenize(topic)
        .iter()
        .map(|word| stem(word).to_owned())
        .collect();

    let mut expanded = stems.clone();
    for stem in stems.iter().filter(|s| s.chars().count() > 3) {
        for suffix in ["s", "ing", "ed"] {
            expanded.insert(format!("{stem}{suffix}"));
        }
    }
    expanded
}
