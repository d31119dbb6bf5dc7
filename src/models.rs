//! Data models for sections, discovered stories, and published feed items.
//!
//! - [`Section`]: a topical tab on the news front page
//! - [`StoryRef`]: a story card found in a section, not yet extracted
//! - [`PublishedStory`]: the output record written to JSON and RSS
//! - [`ProcessedRecord`]: a row of the dedup ledger

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::urls::canonicalize_or_raw;

/// A topical section (rubric) of the news site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Display name as shown on the tab.
    pub name: String,
    /// Absolute URL of the section listing.
    pub url: String,
    /// URL-safe form of `name`.
    pub slug: String,
}

/// A story card discovered on a section page.
///
/// `url` is the raw discovery URL and may still carry tracking parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRef {
    pub id: String,
    pub title: String,
    pub url: String,
    pub section_name: String,
    pub section_slug: String,
}

/// Summary text used when the story page never finished loading.
pub const TIMEOUT_PLACEHOLDER: &str = "content unavailable (timeout)";

/// The final output record for one story.
///
/// Field order matches the JSON artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedStory {
    pub id: String,
    pub title: String,
    /// Canonical story URL, never the raw discovery URL.
    pub url: String,
    pub rubric: String,
    pub rubric_slug: String,
    /// Digest, digest plus full article texts, a placeholder, or empty.
    pub summary: String,
    /// ISO-8601 UTC.
    pub pub_date: String,
    /// ISO-8601 local time.
    pub scraped_at: String,
}

impl PublishedStory {
    /// Build a story stamped with the current time.
    pub fn new(story: &StoryRef, title: &str, summary: String) -> Self {
        Self {
            id: story.id.clone(),
            title: title.to_string(),
            url: canonicalize_or_raw(&story.url),
            rubric: story.section_name.clone(),
            rubric_slug: story.section_slug.clone(),
            summary,
            pub_date: Utc::now().to_rfc3339(),
            scraped_at: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }

    /// Minimal record carrying only what discovery knew.
    pub fn minimal(story: &StoryRef, summary: &str) -> Self {
        Self::new(story, &story.title, summary.to_string())
    }
}

/// A row of the dedup ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessedRecord {
    pub story_url: String,
    pub story_id: String,
    pub title: Option<String>,
    pub rubric: Option<String>,
    pub text: Option<String>,
    pub processed_at: chrono::NaiveDateTime,
}
