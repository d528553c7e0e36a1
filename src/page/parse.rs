// src/page/parse.rs
// =============================================================================
// Turns the primary HTML into PageFacts plus the two URL sets the
// ConcurrentChecker will resolve (outbound links, embedded resources).
//
// Uses the `scraper` crate (html5ever underneath), which never fails to
// parse: broken markup still yields a tree, so this step is infallible.
// =============================================================================

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::checker::{extract_links, extract_resources, resolve_url, ResourceKind};
use crate::snapshot::{Headings, ImageSummary, PageFacts, StructuredData};

/// Elements whose text is not visible content.
const INVISIBLE: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Result of parsing the primary HTML.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub facts: PageFacts,
    pub has_viewport: bool,
    /// Outbound links, absolute, unique, document order
    pub links: Vec<String>,
    /// Embedded resources, absolute, unique, document order
    pub resources: Vec<(String, ResourceKind)>,
}

pub fn parse_page(html: &str, base: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let body_text = visible_text(&document);
    let word_count = body_text.split_whitespace().count();

    let facts = PageFacts {
        title: first_text(&document, "title"),
        meta_description: meta_content(&document, "description"),
        canonical: canonical(&document, base),
        robots_directives: robots_directives(&document),
        structured_data: structured_data(&document),
        headings: headings(&document),
        body_text,
        word_count,
        dom_nodes: count_elements(&document),
        html_bytes: html.len(),
        charset: meta_charset(&document),
        lang: attr_of(&document, "html[lang]", "lang"),
        favicon: favicon(&document, base),
        open_graph: open_graph(&document),
        twitter_card: meta_content(&document, "twitter:card"),
        images: images(&document, base),
    };

    ParsedPage {
        facts,
        has_viewport: meta_content(&document, "viewport").is_some(),
        links: extract_links(&document, base),
        resources: extract_resources(&document, base),
    }
}

fn selector(css: &str) -> Selector {
    // Only ever called with the constant selectors in this file
    Selector::parse(css).unwrap()
}

// Trimmed text of the first matching element; empty text counts as absent
fn first_text(document: &Html, css: &str) -> Option<String> {
    document
        .select(&selector(css))
        .next()
        .map(|el| normalize_space(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn attr_of(document: &Html, css: &str, attr: &str) -> Option<String> {
    document
        .select(&selector(css))
        .find_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// <meta name="..."> lookup, case-insensitive on the name
fn meta_content(document: &Html, name: &str) -> Option<String> {
    document
        .select(&selector("meta[name]"))
        .find(|el| {
            el.value()
                .attr("name")
                .map(|n| n.trim().eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn canonical(document: &Html, base: &Url) -> Option<String> {
    document
        .select(&selector("link[rel][href]"))
        .find(|el| has_rel(el, "canonical"))
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_url(base, href))
}

fn favicon(document: &Html, base: &Url) -> Option<String> {
    document
        .select(&selector("link[rel][href]"))
        .find(|el| has_rel(el, "icon") || has_rel(el, "apple-touch-icon"))
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_url(base, href))
}

fn has_rel(el: &ElementRef<'_>, wanted: &str) -> bool {
    el.value()
        .attr("rel")
        .map(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case(wanted))
        })
        .unwrap_or(false)
}

fn robots_directives(document: &Html) -> Vec<String> {
    meta_content(document, "robots")
        .map(|content| {
            content
                .split(',')
                .map(|token| token.trim().to_ascii_lowercase())
                .filter(|token| !token.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn structured_data(document: &Html) -> StructuredData {
    let script = document
        .select(&selector("script[type]"))
        .find(|el| {
            el.value()
                .attr("type")
                .map(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
                .unwrap_or(false)
        });

    let Some(script) = script else {
        return StructuredData::Absent;
    };
    let raw = script.text().collect::<String>();
    if raw.trim().is_empty() {
        return StructuredData::Absent;
    }

    match serde_json::from_str(raw.trim()) {
        Ok(payload) => StructuredData::Valid { payload },
        Err(e) => StructuredData::Invalid {
            error: e.to_string(),
        },
    }
}

fn headings(document: &Html) -> Headings {
    let mut headings = Headings::default();
    for element in document.select(&selector("h1, h2, h3, h4, h5, h6")) {
        let level = element.value().name()[1..].parse::<u8>().unwrap_or(0);
        if let Some(bucket) = headings.level_mut(level) {
            bucket.push(normalize_space(&element.text().collect::<String>()));
        }
    }
    headings
}

fn count_elements(document: &Html) -> usize {
    document
        .root_element()
        .descendants()
        .filter(|node| node.value().is_element())
        .count()
}

// <meta charset> or the charset parameter of <meta http-equiv=Content-Type>
fn meta_charset(document: &Html) -> Option<String> {
    if let Some(charset) = attr_of(document, "meta[charset]", "charset") {
        return Some(charset.to_ascii_lowercase());
    }
    document
        .select(&selector("meta[http-equiv][content]"))
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .map(|v| v.eq_ignore_ascii_case("content-type"))
                .unwrap_or(false)
        })
        .find_map(|el| {
            let content = el.value().attr("content")?.to_ascii_lowercase();
            let (_, charset) = content.split_once("charset=")?;
            Some(charset.trim().trim_matches('"').to_string())
        })
}

fn open_graph(document: &Html) -> std::collections::BTreeMap<String, String> {
    document
        .select(&selector("meta[property][content]"))
        .filter_map(|el| {
            let property = el.value().attr("property")?.trim().to_ascii_lowercase();
            let content = el.value().attr("content")?.trim();
            (property.starts_with("og:") && !content.is_empty())
                .then(|| (property, content.to_string()))
        })
        .collect()
}

fn images(document: &Html, base: &Url) -> ImageSummary {
    let mut summary = ImageSummary::default();
    for img in document.select(&selector("img")) {
        summary.count += 1;
        if img.value().attr("alt").is_none() {
            let src = img
                .value()
                .attr("src")
                .and_then(|src| resolve_url(base, src))
                .unwrap_or_else(|| "(inline image)".to_string());
            summary.missing_alt.push(src);
        }
    }
    summary
}

// Text of <body> without script/style contents, whitespace collapsed
fn visible_text(document: &Html) -> String {
    let Some(body) = document.select(&selector("body")).next() else {
        return String::new();
    };

    let mut pieces: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else { continue };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| INVISIBLE.contains(&el.name()))
                .unwrap_or(false)
        });
        if !hidden {
            pieces.push(&**text);
        }
    }
    normalize_space(&pieces.join(" "))
}

fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
