//! Section (rubric) discovery from the front page tabs.

use tracing::{debug, error, info, instrument};

use super::Crawler;
use super::fallback::non_empty;
use crate::driver::{PageDriver, WaitPolicy};
use crate::models::Section;
use crate::urls::resolve_href;
use crate::utils::slugify;

impl<D: PageDriver> Crawler<'_, D> {
    /// Every section tab on the front page, in DOM order.
    ///
    /// An unreachable front page or missing tab strip yields an empty list.
    #[instrument(level = "info", skip_all)]
    pub async fn discover_sections(&mut self) -> Vec<Section> {
        let settings = self.settings;
        info!(url = %settings.base_url, "Loading front page");

        if let Err(e) = self
            .driver
            .navigate(&settings.base_url, WaitPolicy::AllIdle, settings.front_page_timeout)
            .await
        {
            error!(error = %e, "Front page failed to load");
            return Vec::new();
        }
        if let Err(e) = self
            .driver
            .wait_for_selector(&settings.selectors.section_tabs, settings.tabs_wait)
            .await
        {
            error!(error = %e, "Section tabs not found");
            return Vec::new();
        }

        let page_url = self
            .driver
            .current_url()
            .unwrap_or(settings.base_url.as_str())
            .to_string();
        let tabs = self.driver.query_all(&settings.selectors.section_tabs).await;

        let sections: Vec<Section> = tabs
            .iter()
            .filter_map(|tab| {
                let name = non_empty(tab.inner_text())?;
                let url = resolve_href(&page_url, tab.attr("href")?)?;
                Some(Section {
                    slug: slugify(&name),
                    name,
                    url,
                })
            })
            .collect();

        info!(count = sections.len(), "Discovered sections");
        for section in &sections {
            debug!(name = %section.name, url = %section.url, slug = %section.slug, "Section");
        }
        sections
    }
}
