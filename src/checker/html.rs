// src/checker/html.rs
// =============================================================================
// This module extracts the URLs a page points at.
//
// Two sets are collected from the parsed document:
// - outbound links: every <a href>
// - embedded resources: <img src>, <script src>, <link rel=stylesheet href>
//
// Every URL is resolved against the page URL, its #fragment is dropped, and
// only http/https URLs are kept. Both sets are de-duplicated while keeping
// document order, so the same absolute URL is only ever probed once.
// =============================================================================

use indexmap::{IndexMap, IndexSet};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// What kind of embedded resource a URL was found as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    Script,
    Stylesheet,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Image => "image",
            ResourceKind::Script => "script",
            ResourceKind::Stylesheet => "stylesheet",
        })
    }
}

/// Extracts all outbound links from a parsed document, in document order,
/// without duplicates.
pub fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    // The selector is a constant and known to be valid
    let selector = Selector::parse("a[href]").unwrap();

    let mut links: IndexSet<String> = IndexSet::new();
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute_url) = resolve_url(base, href) {
                links.insert(absolute_url);
            }
        }
    }
    links.into_iter().collect()
}

/// Extracts embedded images, scripts and stylesheets. If the same URL shows
/// up as two kinds, the first one seen wins.
pub fn extract_resources(document: &Html, base: &Url) -> Vec<(String, ResourceKind)> {
    let image = Selector::parse("img[src]").unwrap();
    let script = Selector::parse("script[src]").unwrap();
    let stylesheet = Selector::parse("link[href]").unwrap();

    let mut found: IndexMap<String, ResourceKind> = IndexMap::new();

    // One pass over the whole tree keeps document order across kinds
    let any = Selector::parse("img[src], script[src], link[href]").unwrap();
    for element in document.select(&any) {
        let (attr, kind) = if image.matches(&element) {
            ("src", ResourceKind::Image)
        } else if script.matches(&element) {
            ("src", ResourceKind::Script)
        } else if stylesheet.matches(&element) && is_stylesheet_link(element.value().attr("rel")) {
            ("href", ResourceKind::Stylesheet)
        } else {
            continue;
        };

        if let Some(value) = element.value().attr(attr) {
            if let Some(url) = resolve_url(base, value) {
                found.entry(url).or_insert(kind);
            }
        }
    }

    found.into_iter().collect()
}

// rel may hold several space-separated tokens ("preload stylesheet")
fn is_stylesheet_link(rel: Option<&str>) -> bool {
    rel.map(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
    .unwrap_or(false)
}

/// Resolves a possibly-relative URL to an absolute http(s) URL without its
/// fragment. Returns None for anything we can't or shouldn't probe.
///
/// Examples:
///   base = "https://example.com/page"
///   href = "/docs"             -> Some("https://example.com/docs")
///   href = "../other#top"      -> Some("https://example.com/other")
///   href = "javascript:void(0)"-> None
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    // Url::join handles both absolute and relative hrefs
    let mut url = base.join(href).ok()?;
    if !is_checkable_link(&url) {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

// We only probe http and https. mailto:, tel:, javascript:, data: and file:
// links are skipped.
fn is_checkable_link(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// True when `url` is on the same host as `base`.
pub fn is_internal(base: &Url, url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str() == base.host_str(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_extract_absolute_link() {
        let doc = parse(r#"<a href="https://www.rust-lang.org">Rust</a>"#);
        let links = extract_links(&doc, &base("https://example.com"));
        assert_eq!(links, vec!["https://www.rust-lang.org/"]);
    }

    #[test]
    fn test_resolve_relative_link() {
        let doc = parse(r#"<a href="/docs">Docs</a>"#);
        let links = extract_links(&doc, &base("https://example.com/page"));
        assert_eq!(links, vec!["https://example.com/docs"]);
    }

    #[test]
    fn test_skip_mailto_and_anchor() {
        let doc = parse(r##"<a href="mailto:test@example.com">Email</a><a href="#top">Top</a>"##);
        let links = extract_links(&doc, &base("https://example.com"));
        assert!(links.is_empty());
    }

    #[test]
    fn test_fragments_collapse_to_one_url() {
        let doc = parse(r#"
            <a href="/guide#intro">Intro</a>
            <a href="/guide#setup">Setup</a>
            <a href="https://example.com/guide">Guide</a>
        "#);
        let links = extract_links(&doc, &base("https://example.com/"));
        assert_eq!(links, vec!["https://example.com/guide"]);
    }

    #[test]
    fn test_extract_resources_in_document_order() {
        let doc = parse(r#"
            <html><head>
              <link rel="stylesheet" href="/main.css">
              <link rel="icon" href="/favicon.ico">
              <script src="/app.js"></script>
            </head><body>
              <img src="/logo.png">
              <img src="/logo.png">
              <script>inline()</script>
            </body></html>
        "#);
        let resources = extract_resources(&doc, &base("https://example.com/"));
        assert_eq!(
            resources,
            vec![
                ("https://example.com/main.css".to_string(), ResourceKind::Stylesheet),
                ("https://example.com/app.js".to_string(), ResourceKind::Script),
                ("https://example.com/logo.png".to_string(), ResourceKind::Image),
            ]
        );
    }

    #[test]
    fn test_is_internal() {
        let page = base("https://example.com/a");
        assert!(is_internal(&page, "https://example.com/b"));
        assert!(!is_internal(&page, "https://other.com/b"));
    }
}
