//! Crawl pipeline for the Dzen news site.
//!
//! A crawl runs in three phases against a single [`PageDriver`] session:
//!
//! 1. **Sections**: read the section tabs from the front page ([`sections`])
//! 2. **Stories**: list story cards per section, dropping ones already in the
//!    dedup ledger ([`stories`])
//! 3. **Content**: walk each new story through the extraction state machine
//!    ([`story`]), optionally pulling full article texts ([`articles`])
//!
//! Everything is sequential. Failures are contained at the smallest scope:
//! a selector miss falls back to the next selector, a broken story becomes a
//! minimal record, a broken section yields no stories. Whatever happens to a
//! story, it ends up in the ledger so the next run skips it.

use tracing::{debug, error, info, instrument};

use crate::config::CrawlSettings;
use crate::driver::PageDriver;
use crate::models::PublishedStory;
use crate::store::DedupStore;
use crate::utils::truncate_for_log;

pub mod articles;
pub mod fallback;
pub mod sections;
pub mod stories;
pub mod story;

/// Progress of one story through extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryStage {
    Discovered,
    SummaryFetched,
    ArticlesFetched,
    Finalized,
    /// Terminal; the story was still recorded with best-effort content.
    Failed,
}

/// Result of extracting one story.
#[derive(Debug, Clone)]
pub struct StoryOutcome {
    pub story: PublishedStory,
    pub stage: StoryStage,
}

/// Drives one crawl over a page driver and the dedup ledger.
pub struct Crawler<'a, D: PageDriver> {
    pub(crate) driver: &'a mut D,
    pub(crate) store: &'a DedupStore,
    pub(crate) settings: &'a CrawlSettings,
}

impl<'a, D: PageDriver> Crawler<'a, D> {
    pub fn new(driver: &'a mut D, store: &'a DedupStore, settings: &'a CrawlSettings) -> Self {
        Self {
            driver,
            store,
            settings,
        }
    }

    /// Crawl the configured sections and return every story extracted.
    ///
    /// Never fails: an unreachable front page just yields an empty list.
    #[instrument(level = "info", skip_all, fields(base_url = %self.settings.base_url))]
    pub async fn crawl(&mut self) -> Vec<PublishedStory> {
        let sections = self.discover_sections().await;
        if sections.is_empty() {
            error!("No sections discovered; nothing to crawl");
            return Vec::new();
        }

        let mut collected = Vec::new();
        for section in sections.iter().take(self.settings.max_sections) {
            self.settings.section_delay.pause().await;
            let stories = self.discover_stories(section).await;

            for story in stories.iter().take(self.settings.stories_per_section) {
                self.settings.story_delay.pause().await;
                let outcome = self.process_story(story).await;
                info!(
                    title = %outcome.story.title,
                    stage = ?outcome.stage,
                    summary_chars = outcome.story.summary.chars().count(),
                    "Processed story"
                );
                debug!(summary = %truncate_for_log(&outcome.story.summary, 200), "Summary preview");
                collected.push(outcome.story);
            }
        }

        info!(count = collected.len(), "Crawl complete");
        collected
    }
}
