//! Selector evaluation over static HTML snapshots.
//!
//! `scraper::Html` is not `Send`, so documents are parsed, queried and
//! dropped inside these synchronous helpers; only owned [`PageElement`]
//! snapshots leave them.

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::PageElement;

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(%selector, error = %e, "Invalid CSS selector; treating as no match");
            None
        }
    }
}

fn snapshot(element: ElementRef<'_>) -> PageElement {
    PageElement {
        attrs: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        text: element.text().collect::<String>(),
        outer_html: element.html(),
    }
}

fn select(document: &Html, selector: &str) -> Vec<PageElement> {
    match parse_selector(selector) {
        Some(sel) => document.select(&sel).map(snapshot).collect(),
        None => Vec::new(),
    }
}

/// Elements of a full document matching `selector`.
pub fn select_document(html: &str, selector: &str) -> Vec<PageElement> {
    select(&Html::parse_document(html), selector)
}

/// Elements of an HTML fragment matching `selector`.
pub fn select_fragment(html: &str, selector: &str) -> Vec<PageElement> {
    select(&Html::parse_fragment(html), selector)
}

/// `true` when `selector` matches at least one element of the document.
pub fn has_match(html: &str, selector: &str) -> bool {
    let Some(sel) = parse_selector(selector) else {
        return false;
    };
    Html::parse_document(html).select(&sel).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div data-testid="card"><a href="/one" class="x">One <b>bold</b></a></div>
          <div data-testid="card"><a href="/two">Two</a></div>
        </body></html>"#;

    #[test]
    fn test_select_document_preserves_order_and_attrs() {
        let links = select_document(PAGE, "[data-testid=\"card\"] a");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].attr("href"), Some("/one"));
        assert_eq!(links[0].attr("class"), Some("x"));
        assert_eq!(links[0].inner_text(), "One bold");
        assert_eq!(links[1].attr("href"), Some("/two"));
        assert_eq!(links[1].attr("missing"), None);
    }

    #[test]
    fn test_nested_query_on_snapshot() {
        let cards = select_document(PAGE, "[data-testid=\"card\"]");
        let bold = cards[0].query("b").unwrap();
        assert_eq!(bold.inner_text(), "bold");
        assert!(cards[1].query("b").is_none());
    }

    #[test]
    fn test_invalid_selector_is_no_match() {
        assert!(select_document(PAGE, "[[[").is_empty());
        assert!(!has_match(PAGE, "[[["));
    }

    #[test]
    fn test_has_match() {
        assert!(has_match(PAGE, "a[href='/two']"));
        assert!(!has_match(PAGE, "h1"));
    }
}
