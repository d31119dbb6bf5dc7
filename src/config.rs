//! Crawl configuration: CSS selectors, limits, timeouts and politeness delays.
//!
//! Selectors default to the live Dzen markup and can be overridden field by
//! field from a YAML file, so a markup change does not require a rebuild.
//! Every list-valued selector is a fallback chain tried in order.

use std::error::Error;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// CSS selectors for every extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Section tabs on the front page.
    pub section_tabs: String,
    /// Story cards on a section page.
    pub story_cards: String,
    /// Title candidates inside a card.
    pub card_titles: Vec<String>,
    /// Refined title candidates on a story page.
    pub story_titles: Vec<String>,
    /// Digest container on a story page.
    pub story_digest: String,
    /// Generic heading waited for when the digest is slow.
    pub story_heading: String,
    /// One summarized fragment inside the digest.
    pub summary_items: String,
    /// Text span inside a summary item.
    pub summary_text: String,
    /// Source label inside a summary item.
    pub source_link: String,
    /// Links to long-form articles below the digest.
    pub detail_links: Vec<String>,
    /// Substring identifying long-form article URLs.
    pub article_link_marker: String,
    /// Body container on an article page.
    pub article_body: String,
    /// Paragraph candidates inside an article body.
    pub article_paragraphs: Vec<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            section_tabs: r#"[data-testid="rubric-tabs-scroll-container"] a"#.to_string(),
            story_cards: r#"[data-testid="other-cards"] [data-testid="card-link"]"#.to_string(),
            card_titles: vec![
                "p".to_string(),
                ".news-site--card-top-avatar__text-SL".to_string(),
            ],
            story_titles: vec![
                ".news-site--StoryHead-desktop__title-1t a".to_string(),
                "h1".to_string(),
            ],
            story_digest: r#"[data-testid="story-digest"]"#.to_string(),
            story_heading: "h1".to_string(),
            summary_items: r#"[data-testid="summarization-item"]"#.to_string(),
            summary_text: "span".to_string(),
            source_link: r#"[data-testid="source-link"]"#.to_string(),
            detail_links: vec![
                ".news-story-tail__list-items .news-site--card-text__cardLink-kh".to_string(),
                ".news-site--card-text__cardLink-kh".to_string(),
            ],
            article_link_marker: "dzen.ru/a/".to_string(),
            article_body: r#"[data-testid="article-body"]"#.to_string(),
            article_paragraphs: vec![
                r#"[data-testid="article-render__block"] p span"#.to_string(),
                r#"[data-testid="article-render__block"].content--common-block__block-3U span"#
                    .to_string(),
                r#"[data-testid="article-render__block"] p"#.to_string(),
            ],
        }
    }
}

impl Selectors {
    /// Load selector overrides from a YAML file; missing keys keep their defaults.
    #[instrument(level = "info")]
    pub async fn from_yaml_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let raw = fs::read_to_string(path).await?;
        let selectors: Selectors = serde_yaml::from_str(&raw)?;
        info!("Loaded selector overrides");
        Ok(selectors)
    }
}

/// A randomized pause bounded by `[min, max]`.
///
/// Used between requests to keep the crawl polite; it is never a retry
/// mechanism. A zero range disables the pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn from_millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const ZERO: DelayRange = DelayRange::from_millis(0, 0);

    /// Draw a duration from the range.
    pub fn sample(&self) -> Duration {
        let (lo, hi) = if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        };
        if lo == hi {
            return lo;
        }
        let ms = rand::rng().random_range(lo.as_millis() as u64..=hi.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// Sleep for a sampled duration.
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            debug!(?delay, "Politeness pause");
            sleep(delay).await;
        }
    }
}

/// Parses `MIN-MAX` or a single `MS` value, both in milliseconds.
impl FromStr for DelayRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|e| format!("invalid delay {v:?}: {e}"))
        };
        match s.split_once('-') {
            Some((min, max)) => Ok(Self::from_millis(parse(min)?, parse(max)?)),
            None => {
                let ms = parse(s)?;
                Ok(Self::from_millis(ms, ms))
            }
        }
    }
}

/// Limits, timeouts and delays for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Front page listing the section tabs.
    pub base_url: String,
    /// Sections actually crawled, in tab order.
    pub max_sections: usize,
    /// Cards inspected per section page.
    pub cards_per_section: usize,
    /// New stories extracted per section.
    pub stories_per_section: usize,
    /// Long-form articles fetched per story.
    pub max_detail_links: usize,
    /// Paragraph fragments this short or shorter are dropped.
    pub min_paragraph_chars: usize,

    pub front_page_timeout: Duration,
    pub page_timeout: Duration,
    pub tabs_wait: Duration,
    pub cards_wait: Duration,
    pub digest_wait: Duration,
    pub heading_wait: Duration,
    pub digest_container_wait: Duration,
    pub article_body_wait: Duration,

    pub section_delay: DelayRange,
    pub story_delay: DelayRange,
    pub article_delay: DelayRange,

    pub selectors: Selectors,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            base_url: "https://dzen.ru/news".to_string(),
            max_sections: 1,
            cards_per_section: 10,
            stories_per_section: 3,
            max_detail_links: 2,
            min_paragraph_chars: 10,
            front_page_timeout: Duration::from_secs(70),
            page_timeout: Duration::from_secs(30),
            tabs_wait: Duration::from_secs(10),
            cards_wait: Duration::from_secs(10),
            digest_wait: Duration::from_secs(5),
            heading_wait: Duration::from_secs(3),
            digest_container_wait: Duration::from_secs(10),
            article_body_wait: Duration::from_secs(10),
            section_delay: DelayRange::from_millis(2_000, 4_000),
            story_delay: DelayRange::from_millis(1_000, 3_000),
            article_delay: DelayRange::from_millis(1_000, 2_000),
            selectors: Selectors::default(),
        }
    }
}

impl CrawlSettings {
    /// Settings with every politeness delay disabled.
    pub fn without_delays(mut self) -> Self {
        self.section_delay = DelayRange::ZERO;
        self.story_delay = DelayRange::ZERO;
        self.article_delay = DelayRange::ZERO;
        self
    }
}
