//! RSS 2.0 feed of the latest run.
//!
//! Items carry a truncated plain-text `description` and the full summary in
//! `content:encoded`. The feed file is replaced atomically so readers never
//! see a half-written document.

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::models::PublishedStory;
use crate::utils::truncate_chars;

/// File name of the feed inside the output directory.
pub const FEED_FILE: &str = "dzen_news_current.rss";
/// Characters of summary kept in `description`.
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const RFC822: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub generator: String,
}

impl ChannelInfo {
    pub fn for_site(link: &str) -> Self {
        Self {
            link: link.to_string(),
            ..Self::default()
        }
    }
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self {
            title: "Dzen.ru - Новости".to_string(),
            link: "https://dzen.ru/news".to_string(),
            description: "Новости с портала Dzen.ru по всем рубрикам".to_string(),
            language: "ru-RU".to_string(),
            generator: "Dzen RSS Scraper".to_string(),
        }
    }
}

/// `description` text: the first [`DESCRIPTION_MAX_CHARS`] characters, with
/// `...` appended only when the summary was longer.
pub fn feed_description(summary: &str) -> String {
    truncate_chars(summary, DESCRIPTION_MAX_CHARS, "...")
}

/// RFC-822 form of an ISO-8601 `pub_date`, or of `now` when it does not parse.
pub fn feed_pub_date(raw: &str, now: DateTime<Utc>) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt.format(RFC822).to_string(),
        Err(e) => {
            debug!(pub_date = %raw, error = %e, "Unparseable pub_date; using now");
            now.format(RFC822).to_string()
        }
    }
}

/// Split `text` into CDATA section bodies so no section contains `]]>`.
fn cdata_sections(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split("]]>").collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let head = if i > 0 { ">" } else { "" };
            let tail = if i < last { "]]" } else { "" };
            format!("{head}{part}{tail}")
        })
        .collect()
}

fn write_text_element<W: Write>(
    w: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_cdata_element<W: Write>(
    w: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    for section in cdata_sections(text) {
        w.write_event(Event::CData(BytesCData::new(section)))?;
    }
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: Write>(
    w: &mut Writer<W>,
    story: &PublishedStory,
    now: DateTime<Utc>,
) -> Result<(), Box<dyn Error>> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    write_text_element(w, "title", &story.title)?;
    write_text_element(w, "link", &story.url)?;
    write_text_element(w, "guid", &story.id)?;
    write_text_element(w, "category", &story.rubric)?;
    write_text_element(w, "description", &feed_description(&story.summary))?;
    write_cdata_element(w, "content:encoded", &story.summary)?;
    write_text_element(w, "pubDate", &feed_pub_date(&story.pub_date, now))?;
    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// Render the whole feed document.
pub fn render_rss(
    stories: &[PublishedStory],
    channel: &ChannelInfo,
    now: DateTime<Utc>,
) -> Result<String, Box<dyn Error>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss_start = BytesStart::new("rss");
    rss_start.push_attribute(("version", "2.0"));
    rss_start.push_attribute(("xmlns:content", CONTENT_NS));
    rss_start.push_attribute(("xmlns:atom", ATOM_NS));
    writer.write_event(Event::Start(rss_start))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "language", &channel.language)?;
    write_text_element(&mut writer, "lastBuildDate", &now.format(RFC822).to_string())?;
    write_text_element(&mut writer, "generator", &channel.generator)?;

    for story in stories {
        write_item(&mut writer, story, now)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(writer.into_inner())?)
}

/// Render and replace `{output_dir}/dzen_news_current.rss`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir, items = stories.len()))]
pub async fn write_current_feed(
    stories: &[PublishedStory],
    channel: &ChannelInfo,
    output_dir: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf, Box<dyn Error>> {
    let xml = render_rss(stories, channel, now)?;
    fs::create_dir_all(output_dir).await?;

    let path = Path::new(output_dir).join(FEED_FILE);
    let tmp = Path::new(output_dir).join(format!("{FEED_FILE}.tmp"));
    fs::write(&tmp, xml).await?;
    fs::rename(&tmp, &path).await?;
    info!(path = %path.display(), "Wrote RSS feed");
    Ok(path)
}
