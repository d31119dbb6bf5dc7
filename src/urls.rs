//! Story URL normalization and identity.
//!
//! A story can be linked from several places with different tracking
//! parameters attached. [`canonicalize`] reduces every variant to
//! `{scheme}://{host}/news/story/{id}` so the dedup ledger sees a single key.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::warn;
use url::Url;

use crate::error::{Result, ScrapeError};

static STORY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/story/([^/?#]+)").expect("story id regex is valid"));

/// Length of the hash-derived fallback id.
const HASHED_ID_LEN: usize = 16;

/// Normalize a story URL to its canonical form.
///
/// When the path carries a `story` segment followed by an id the result is
/// `{scheme}://{host}/news/story/{id}`; otherwise query and fragment are
/// dropped and the rest of the URL is kept.
pub fn canonicalize(raw: &str) -> Result<String> {
    let mut parsed = Url::parse(raw.trim()).map_err(|e| ScrapeError::Normalization {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ScrapeError::Normalization {
            url: raw.to_string(),
            reason: "url has no host".to_string(),
        })?
        .to_string();

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let story_id = segments
        .iter()
        .position(|seg| *seg == "story")
        .and_then(|pos| segments.get(pos + 1));
    if let Some(id) = story_id {
        return Ok(format!("{}://{}/news/story/{}", parsed.scheme(), host, id));
    }

    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

/// Canonicalize, falling back to the raw string when normalization fails.
///
/// Used wherever a key is needed and losing the story is worse than a
/// possible duplicate.
pub fn canonicalize_or_raw(raw: &str) -> String {
    match canonicalize(raw) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, url = %raw, "Falling back to raw url");
            raw.to_string()
        }
    }
}

/// Extract the story id from a URL, or derive a stable one from its hash.
pub fn extract_story_id(url: &str) -> String {
    if let Some(caps) = STORY_ID_RE.captures(url) {
        return caps[1].to_string();
    }
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..HASHED_ID_LEN].to_string()
}

/// Resolve a possibly relative href against the page it was found on.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(abs) => Some(abs.to_string()),
        Err(_) => Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string()),
    }
}
