//! Utility functions for string cleanup, slug generation, and file system checks.
//!
//! This module provides helpers used throughout the application:
//! - Log-friendly truncation and character-safe truncation for feed output
//! - Slug generation for section names
//! - Whitespace and decoration cleanup for scraped text
//! - Output directory validation
//! - Panic payload formatting

use std::any::Any;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte
/// count indicator appended. Cuts always land on a character boundary, so
/// Cyrillic text is safe to pass in.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep the first `max` characters of `s`, appending `marker` only when
/// something was cut off.
pub fn truncate_chars(s: &str, max: usize, marker: &str) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}{}", &s[..cut], marker),
    }
}

/// Convert a section name to a URL-friendly slug.
///
/// Lowercases the text, drops everything that is not a word character,
/// whitespace or hyphen, and turns spaces into hyphens.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Hello World"), "hello-world");
/// assert_eq!(slugify("Наука и техника"), "наука-и-техника");
/// ```
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace(
            |c: char| !(c.is_alphanumeric() || c == '_' || c.is_whitespace() || c == '-'),
            "",
        )
        .replace(' ', "-")
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip icon glyphs and punctuation from a source label, keeping word
/// characters, whitespace, hyphens and dots.
pub fn strip_source_decoration(label: &str) -> String {
    label
        .replace(
            |c: char| {
                !(c.is_alphanumeric() || c == '_' || c.is_whitespace() || c == '-' || c == '.')
            },
            "",
        )
        .trim()
        .to_string()
}

/// Message carried by a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
