//! Story card discovery within a section.

use itertools::Itertools;
use tracing::{debug, error, info, instrument, warn};

use super::Crawler;
use super::fallback::{first_success, non_empty};
use crate::driver::{PageDriver, PageElement, WaitPolicy};
use crate::models::{Section, StoryRef};
use crate::urls::{canonicalize_or_raw, extract_story_id, resolve_href};

/// Title used when no card title selector yields text.
pub const UNTITLED: &str = "Untitled";

/// Card title by fallback selector chain.
fn card_title(card: &PageElement, selectors: &[String]) -> String {
    first_success(selectors, |sel| {
        card.query_all(sel)
            .iter()
            .find_map(|el| non_empty(el.inner_text()))
    })
    .unwrap_or_else(|| UNTITLED.to_string())
}

impl<D: PageDriver> Crawler<'_, D> {
    /// New (not yet processed) stories listed in `section`, in DOM order.
    ///
    /// At most `cards_per_section` cards are inspected. Cards pointing at the
    /// same canonical story collapse to the first one. A section page that
    /// fails to load or shows no cards yields an empty list.
    #[instrument(level = "info", skip_all, fields(section = %section.name))]
    pub async fn discover_stories(&mut self, section: &Section) -> Vec<StoryRef> {
        let settings = self.settings;
        let selectors = &settings.selectors;
        info!(url = %section.url, "Collecting stories");

        if let Err(e) = self
            .driver
            .navigate(&section.url, WaitPolicy::AllIdle, settings.page_timeout)
            .await
        {
            error!(error = %e, "Section page failed to load");
            return Vec::new();
        }
        if let Err(e) = self
            .driver
            .wait_for_selector(&selectors.story_cards, settings.cards_wait)
            .await
        {
            warn!(error = %e, "No story cards found in section");
            return Vec::new();
        }

        let page_url = self
            .driver
            .current_url()
            .unwrap_or(section.url.as_str())
            .to_string();
        let cards = self.driver.query_all(&selectors.story_cards).await;

        let candidates: Vec<(String, String)> = cards
            .iter()
            .take(settings.cards_per_section)
            .filter_map(|card| {
                let href = card.attr("href").and_then(|h| resolve_href(&page_url, h));
                if href.is_none() {
                    debug!("Card without usable href; skipping");
                }
                Some((href?, card_title(card, &selectors.card_titles)))
            })
            .unique_by(|(href, _)| canonicalize_or_raw(href))
            .collect();

        let mut stories = Vec::new();
        for (url, title) in candidates {
            if self.store.is_processed(&url).await {
                info!(%title, "Story already processed; skipping");
                continue;
            }
            stories.push(StoryRef {
                id: extract_story_id(&url),
                title,
                url,
                section_name: section.name.clone(),
                section_slug: section.slug.clone(),
            });
        }

        info!(count = stories.len(), "Collected new stories");
        stories
    }
}
