//! Per-story extraction state machine.
//!
//! ```text
//! Discovered ──▶ SummaryFetched ──▶ ArticlesFetched ──▶ Finalized
//!      │                                                   ▲
//!      └──────────── Failed (timeout / panic) ─────────────┘ (still recorded)
//! ```
//!
//! Each stage degrades instead of aborting: a missing digest means an empty
//! summary, missing article links mean no full texts. Only a navigation
//! timeout on the story page itself short-circuits to a placeholder record.

use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use super::fallback::{first_success_async, non_empty};
use super::{Crawler, StoryOutcome, StoryStage};
use crate::driver::{PageDriver, WaitPolicy};
use crate::error::ScrapeError;
use crate::models::{PublishedStory, StoryRef, TIMEOUT_PLACEHOLDER};
use crate::utils::{panic_message, strip_source_decoration};

/// Header placed before the appended full article texts.
pub const FULL_TEXTS_HEADER: &str = "--- FULL ARTICLE TEXTS ---\n\n";
/// Separator between consecutive full article texts.
pub const ARTICLE_SEPARATOR: &str = "\n\n---\n\n";

/// Summary fragments and the outlets they were attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    pub fragments: Vec<String>,
    pub sources: Vec<String>,
}

impl Digest {
    pub fn text(&self) -> String {
        self.fragments.join("\n")
    }
}

/// Append full article texts after the digest.
pub fn merge_content(digest: &str, full_texts: &[String]) -> String {
    if full_texts.is_empty() {
        return digest.to_string();
    }
    let block = format!("{FULL_TEXTS_HEADER}{}", full_texts.join(ARTICLE_SEPARATOR));
    if digest.is_empty() {
        block
    } else {
        format!("{digest}\n\n{block}")
    }
}

impl<D: PageDriver> Crawler<'_, D> {
    /// Extract one story. Always returns a record and always leaves the
    /// story in the dedup ledger, even when extraction blew up.
    #[instrument(level = "info", skip_all, fields(story_id = %story.id))]
    pub async fn process_story(&mut self, story: &StoryRef) -> StoryOutcome {
        match AssertUnwindSafe(self.extract_story(story)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let err = ScrapeError::Extraction(panic_message(payload.as_ref()));
                error!(
                    title = %story.title,
                    url = %story.url,
                    error = %err,
                    "Story extraction crashed; recording minimal story"
                );
                self.store
                    .mark_processed(&story.url, &story.id, &story.title, &story.section_name, "")
                    .await;
                StoryOutcome {
                    story: PublishedStory::minimal(story, ""),
                    stage: StoryStage::Failed,
                }
            }
        }
    }

    async fn extract_story(&mut self, story: &StoryRef) -> StoryOutcome {
        let settings = self.settings;
        info!(
            title = %story.title,
            url = %story.url,
            stage = ?StoryStage::Discovered,
            "Extracting story"
        );

        match self
            .driver
            .navigate(&story.url, WaitPolicy::ContentLoaded, settings.page_timeout)
            .await
        {
            Ok(()) => self.await_story_content(story).await,
            Err(e) if e.is_timeout() => {
                error!(title = %story.title, error = %e, "Story page timed out; skipping content");
                self.store
                    .mark_processed(&story.url, &story.id, &story.title, &story.section_name, "")
                    .await;
                return StoryOutcome {
                    story: PublishedStory::minimal(story, TIMEOUT_PLACEHOLDER),
                    stage: StoryStage::Failed,
                };
            }
            Err(e) => {
                warn!(title = %story.title, error = %e, "Story page load failed; continuing with what is available");
            }
        }

        let title = self.resolve_title(story).await;

        let digest = self.extract_digest(story).await;
        debug!(
            stage = ?StoryStage::SummaryFetched,
            fragments = digest.fragments.len(),
            sources = ?digest.sources,
            "Digest extracted"
        );

        let full_texts = self.fetch_full_texts(story).await;
        debug!(
            stage = ?StoryStage::ArticlesFetched,
            count = full_texts.len(),
            "Full article texts fetched"
        );

        let content = merge_content(&digest.text(), &full_texts);
        self.store
            .mark_processed(&story.url, &story.id, &title, &story.section_name, &content)
            .await;

        StoryOutcome {
            story: PublishedStory::new(story, &title, content),
            stage: StoryStage::Finalized,
        }
    }

    /// Wait for the digest, then for any heading; neither is required.
    async fn await_story_content(&mut self, story: &StoryRef) {
        let settings = self.settings;
        let selectors = &settings.selectors;
        if self
            .driver
            .wait_for_selector(&selectors.story_digest, settings.digest_wait)
            .await
            .is_ok()
        {
            return;
        }
        if let Err(e) = self
            .driver
            .wait_for_selector(&selectors.story_heading, settings.heading_wait)
            .await
        {
            warn!(title = %story.title, error = %e, "Story content did not fully load");
        }
    }

    /// In-page title, else the title seen on the card.
    async fn resolve_title(&mut self, story: &StoryRef) -> String {
        let driver = &*self.driver;
        first_success_async(&self.settings.selectors.story_titles, |sel| async move {
            driver
                .query_all(sel)
                .await
                .iter()
                .find_map(|el| non_empty(el.inner_text()))
        })
        .await
        .unwrap_or_else(|| story.title.clone())
    }

    /// Summary fragments and source labels from the digest block.
    async fn extract_digest(&mut self, story: &StoryRef) -> Digest {
        let settings = self.settings;
        let selectors = &settings.selectors;
        if let Err(e) = self
            .driver
            .wait_for_selector(&selectors.story_digest, settings.digest_container_wait)
            .await
        {
            warn!(title = %story.title, error = %e, "No digest found");
        }

        let mut digest = Digest::default();
        for item in self.driver.query_all(&selectors.summary_items).await {
            if let Some(text) = item
                .query(&selectors.summary_text)
                .and_then(|span| non_empty(span.inner_text()))
            {
                digest.fragments.push(text);
            }
            if let Some(source) = item.query(&selectors.source_link) {
                let label = strip_source_decoration(source.inner_text());
                if !label.is_empty() {
                    digest.sources.push(label);
                }
            }
        }
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::driver::fake::FakeDriver;
    use crate::store::DedupStore;

    const STORY: &str = "https://dzen.ru/news/story/abc?utm_source=feed";
    const ART1: &str = "https://dzen.ru/a/first";
    const ART2: &str = "https://dzen.ru/a/second";

    fn story_ref() -> StoryRef {
        StoryRef {
            id: "abc".to_string(),
            title: "Card title".to_string(),
            url: STORY.to_string(),
            section_name: "Политика".to_string(),
            section_slug: "политика".to_string(),
        }
    }

    #[test]
    fn test_merge_content() {
        assert_eq!(merge_content("digest", &[]), "digest");
        assert_eq!(merge_content("", &[]), "");
        assert_eq!(
            merge_content("digest", &["one".to_string(), "two".to_string()]),
            "digest\n\n--- FULL ARTICLE TEXTS ---\n\none\n\n---\n\ntwo"
        );
        assert_eq!(
            merge_content("", &["one".to_string()]),
            "--- FULL ARTICLE TEXTS ---\n\none"
        );
    }

    #[tokio::test]
    async fn full_extraction_merges_digest_and_articles() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let mut driver = FakeDriver::new()
            .page(
                STORY,
                &story_page(
                    "Заголовок сюжета",
                    &[("Первый факт.", "РИА Новости"), ("Второй факт.", "ТАСС")],
                    &[ART1, "https://example.com/elsewhere", ART2],
                ),
            )
            .page(ART1, &article_page(&["Первый абзац статьи достаточно длинный.", "коротко"]))
            .page(ART2, &article_page(&["Второй  текст\n статьи тоже длинный."]));

        let outcome = Crawler::new(&mut driver, &store, &settings)
            .process_story(&story_ref())
            .await;

        assert_eq!(outcome.stage, StoryStage::Finalized);
        assert_eq!(outcome.story.title, "Заголовок сюжета");
        assert_eq!(outcome.story.url, "https://dzen.ru/news/story/abc");
        assert_eq!(
            outcome.story.summary,
            "Первый факт.\nВторой факт.\n\n--- FULL ARTICLE TEXTS ---\n\nПервый абзац статьи достаточно длинный.\n\n---\n\nВторой текст статьи тоже длинный."
        );
        assert_eq!(driver.visits, vec![STORY, ART1, ART2, STORY]);

        let record = store.get(STORY).await.unwrap().unwrap();
        assert_eq!(record.title.as_deref(), Some("Заголовок сюжета"));
        assert_eq!(record.text.as_deref(), Some(outcome.story.summary.as_str()));
    }

    #[tokio::test]
    async fn navigation_timeout_yields_placeholder_and_record() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let mut driver = FakeDriver::new().timeout(STORY);

        let outcome = Crawler::new(&mut driver, &store, &settings)
            .process_story(&story_ref())
            .await;

        assert_eq!(outcome.stage, StoryStage::Failed);
        assert_eq!(outcome.story.summary, "content unavailable (timeout)");
        assert_eq!(outcome.story.title, "Card title");
        assert_eq!(outcome.story.url, "https://dzen.ru/news/story/abc");
        assert!(store.is_processed(STORY).await);
        assert_eq!(driver.visits, vec![STORY]);
    }

    #[tokio::test]
    async fn broken_page_degrades_to_card_title_and_empty_summary() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let mut driver = FakeDriver::new().failing(STORY);

        let outcome = Crawler::new(&mut driver, &store, &settings)
            .process_story(&story_ref())
            .await;

        assert_eq!(outcome.stage, StoryStage::Finalized);
        assert_eq!(outcome.story.title, "Card title");
        assert_eq!(outcome.story.summary, "");
        assert!(store.is_processed(STORY).await);
    }

    #[tokio::test]
    async fn failed_article_fetch_keeps_digest() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let mut driver = FakeDriver::new()
            .page(STORY, &story_page("T", &[("Факт.", "")], &[ART1]))
            .timeout(ART1);

        let outcome = Crawler::new(&mut driver, &store, &settings)
            .process_story(&story_ref())
            .await;

        assert_eq!(outcome.story.summary, "Факт.");
        assert_eq!(outcome.stage, StoryStage::Finalized);
    }

    #[tokio::test]
    async fn panic_during_extraction_still_records_story() {
        let store = DedupStore::in_memory().await.unwrap();
        let settings = settings();
        let mut driver = FakeDriver::new().panicking(STORY);

        let outcome = Crawler::new(&mut driver, &store, &settings)
            .process_story(&story_ref())
            .await;

        assert_eq!(outcome.stage, StoryStage::Failed);
        assert_eq!(outcome.story.summary, "");
        assert_eq!(outcome.story.url, "https://dzen.ru/news/story/abc");
        assert!(store.is_processed(STORY).await);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
