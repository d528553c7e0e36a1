// src/findings/rules.rs
// =============================================================================
// The rule table.
//
// One static, ordered list of rules. Each rule has:
// - key: the finding it produces
// - feature: the logical feature it belongs to; within a feature only the
//   first rule that fires (in table order) is reported
// - category and impact: what scoring deducts, and where
// - message (with {value}/{count} placeholders) and remediation text
// - requires: what the predicate needs (page facts, a keyword, a check
//   result, browser metrics); used to tell "pass" from "not checked"
// - predicate: reads the Snapshot, returns evidence when the rule fires
//
// Thresholds are the constants right below. The table is validated once,
// on first use (RuleTable::load).
// =============================================================================

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use super::{Evidence, FindingKey};
use crate::checker::{is_cdn_response, ResourceKind};
use crate::checks::CheckName;
use crate::error::RuleTableError;
use crate::scoring::{Category, Impact};
use crate::snapshot::{Snapshot, StructuredData};

pub const TITLE_MIN_CHARS: usize = 30;
pub const TITLE_MAX_CHARS: usize = 60;
pub const DESCRIPTION_MAX_CHARS: usize = 160;
pub const MIN_WORDS: usize = 300;
pub const MIN_TEXT_HTML_RATIO: f64 = 10.0;
pub const MAX_MISSPELLINGS: usize = 5;
pub const MIN_RELATED_TERMS: usize = 3;
pub const TTFB_SLOW_MS: u64 = 600;
pub const TTFB_VERY_SLOW_MS: u64 = 1800;
pub const MAX_HTML_BYTES: usize = 100 * 1024;
pub const MAX_DOM_NODES: usize = 1500;
pub const MAX_IMAGE_BYTES: u64 = 200 * 1024;
pub const MAX_REQUESTS: usize = 50;
pub const LCP_SLOW_MS: f64 = 2500.0;
pub const CLS_HIGH: f64 = 0.1;
pub const FCP_SLOW_MS: f64 = 1800.0;
pub const PAGESPEED_MIN_SCORE: u8 = 50;

/// What a rule's predicate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "check", rename_all = "snake_case")]
pub enum Requires {
    /// Page facts, always available
    Page,
    /// A target keyword
    Keyword,
    /// A completed check result
    Check(CheckName),
    /// Browser metrics (deep mode)
    Browser,
    /// Lab metrics from the browser or, failing that, PageSpeed
    Lab,
}

/// A condition -> finding mapping.
#[derive(Clone, Copy, Serialize)]
pub struct Rule {
    pub key: FindingKey,
    pub feature: &'static str,
    pub category: Category,
    pub impact: Impact,
    pub message: &'static str,
    pub remediation: &'static str,
    pub requires: Requires,
    #[serde(skip)]
    pub predicate: fn(&Snapshot) -> Option<Evidence>,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("key", &self.key)
            .field("feature", &self.feature)
            .field("category", &self.category)
            .field("impact", &self.impact)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

impl Rule {
    /// The message with {value} and {count} filled in from the evidence.
    pub fn render(&self, evidence: &Evidence) -> String {
        let mut message = self.message.to_string();
        if let Some(value) = evidence.value {
            let shown = if value.fract() == 0.0 {
                format!("{}", value as i64)
            } else {
                format!("{:.2}", value)
            };
            message = message.replace("{value}", &shown);
        }
        if let Some(count) = evidence.count {
            message = message.replace("{count}", &count.to_string());
        }
        message
    }
}

/// The validated rule table with key lookups.
#[derive(Debug)]
pub struct RuleTable {
    rules: &'static [Rule],
    positions: HashMap<FindingKey, usize>,
}

impl RuleTable {
    /// The built-in table, validated on first call.
    pub fn load() -> Result<&'static RuleTable, RuleTableError> {
        static TABLE: OnceLock<Result<RuleTable, RuleTableError>> = OnceLock::new();
        TABLE.get_or_init(|| RuleTable::from_rules(RULES)).as_ref().map_err(Clone::clone)
    }

    pub fn from_rules(rules: &'static [Rule]) -> Result<RuleTable, RuleTableError> {
        validate(rules)?;
        let positions = rules.iter().enumerate().map(|(i, rule)| (rule.key, i)).collect();
        Ok(RuleTable { rules, positions })
    }

    pub fn get(&self, key: FindingKey) -> Option<&Rule> {
        self.positions.get(&key).map(|&i| &self.rules[i])
    }

    /// Index of the key's rule in table order
    pub fn position(&self, key: FindingKey) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Feature names, unique, in table order
    pub fn features(&self) -> Vec<&'static str> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .map(|rule| rule.feature)
            .filter(|feature| seen.insert(*feature))
            .collect()
    }

    /// Rules of one feature, in table order
    pub fn rules_for(&self, feature: &str) -> impl Iterator<Item = &Rule> + '_ {
        let feature = feature.to_string();
        self.rules.iter().filter(move |rule| rule.feature == feature)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Checks a rule list: keys unique, every key covered, no empty texts.
pub fn validate(rules: &[Rule]) -> Result<(), RuleTableError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.key) {
            return Err(RuleTableError::DuplicateKey(rule.key.to_string()));
        }
        let blank = |text: &str| text.trim().is_empty();
        if blank(rule.message) || blank(rule.remediation) || blank(rule.feature) {
            return Err(RuleTableError::EmptyText(rule.key.to_string()));
        }
    }
    if let Some(missing) = FindingKey::ALL.iter().find(|key| !seen.contains(*key)) {
        return Err(RuleTableError::MissingRule(missing.to_string()));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// The table
// -----------------------------------------------------------------------------

macro_rules! rule {
    ($key:ident, $feature:literal, $category:ident, $impact:ident, $requires:expr, $predicate:expr,
     $message:literal, $remediation:literal $(,)?) => {
        Rule {
            key: FindingKey::$key,
            feature: $feature,
            category: Category::$category,
            impact: Impact::$impact,
            message: $message,
            remediation: $remediation,
            requires: $requires,
            predicate: $predicate,
        }
    };
}

use Requires::{Browser, Keyword, Lab, Page};
const fn check(name: CheckName) -> Requires {
    Requires::Check(name)
}

pub static RULES: &[Rule] = &[
    // ---- Content ----
    rule!(TitleMissing, "title", Content, Critical, Page, title_missing,
        "The page has no <title> tag",
        "Add a unique, descriptive <title> of 30-60 characters."),
    rule!(TitleTooLong, "title", Content, Low, Page, title_too_long,
        "The title is {value} characters long and will be truncated in results",
        "Shorten the title to at most 60 characters."),
    rule!(TitleTooShort, "title", Content, Low, Page, title_too_short,
        "The title is only {value} characters long",
        "Expand the title to at least 30 characters describing the page."),
    rule!(MetaDescriptionMissing, "meta_description", Content, High, Page, meta_description_missing,
        "The page has no meta description",
        "Add a <meta name=\"description\"> summarising the page in up to 160 characters."),
    rule!(MetaDescriptionTooLong, "meta_description", Content, Low, Page, meta_description_too_long,
        "The meta description is {value} characters long and will be truncated",
        "Shorten the meta description to at most 160 characters."),
    rule!(H1Missing, "h1", Content, High, Page, h1_missing,
        "The page has no H1 heading",
        "Add exactly one H1 that states the page topic."),
    rule!(H1Multiple, "h1", Content, Medium, Page, h1_multiple,
        "The page has {count} H1 headings",
        "Keep a single H1 and demote the others to H2."),
    rule!(HeadingHierarchySkipped, "heading_hierarchy", Content, Low, Page, heading_hierarchy_skipped,
        "Heading levels are skipped (H{value} is used without the level above it)",
        "Nest headings in order: H1, then H2, then H3."),
    rule!(ContentThin, "content_length", Content, Medium, Page, content_thin,
        "Only {value} words of visible text",
        "Expand the content to at least 300 words of useful text."),
    rule!(TextHtmlRatioLow, "text_html_ratio", Content, Low, Page, text_html_ratio_low,
        "Visible text is only {value}% of the HTML",
        "Reduce markup bloat (inline scripts, styles, wrappers) or add more text."),
    rule!(ImagesMissingAlt, "image_alt", Content, Medium, Page, images_missing_alt,
        "{count} image(s) have no alt attribute",
        "Give every meaningful image descriptive alt text; use alt=\"\" for decorative ones."),
    rule!(KeywordMissingTitle, "keyword_title", Content, Medium, Keyword, keyword_missing_title,
        "The target keyword does not appear in the title",
        "Work the target keyword into the title, preferably near the start."),
    rule!(KeywordMissingDescription, "keyword_description", Content, Low, Keyword, keyword_missing_description,
        "The target keyword does not appear in the meta description",
        "Mention the target keyword in the meta description."),
    rule!(KeywordMissingHeadings, "keyword_headings", Content, Low, Keyword, keyword_missing_headings,
        "The target keyword does not appear in any heading",
        "Use the target keyword in the H1 or at least one H2."),
    rule!(SpellingErrors, "spelling", Content, Low, check(CheckName::SpellCheck), spelling_errors,
        "{count} possibly misspelled words",
        "Proofread the page and fix the listed words."),
    rule!(RelatedTermsSparse, "related_terms", Content, Low, check(CheckName::RelatedKeywords), related_terms_sparse,
        "Only {count} related terms appear around the target keyword",
        "Cover the topic more broadly with related terms and synonyms."),

    // ---- Technical ----
    rule!(HttpsMissing, "https", Technical, Critical, Page, https_missing,
        "The page is served over plain HTTP",
        "Serve the site over HTTPS with a valid certificate."),
    rule!(RobotsNoindex, "indexability", Technical, Critical, Page, robots_noindex,
        "The page tells search engines not to index it",
        "Remove noindex from the robots meta tag and X-Robots-Tag header if the page should rank."),
    rule!(CanonicalMissing, "canonical", Technical, Medium, Page, canonical_missing,
        "The page has no canonical URL",
        "Add <link rel=\"canonical\"> pointing at the preferred URL of this page."),
    rule!(StructuredDataInvalid, "structured_data", Technical, Medium, Page, structured_data_invalid,
        "The JSON-LD structured data does not parse",
        "Fix the JSON-LD block; validate it with a structured data testing tool."),
    rule!(StructuredDataMissing, "structured_data", Technical, Low, Page, structured_data_missing,
        "The page has no JSON-LD structured data",
        "Describe the page with schema.org JSON-LD (Article, Product, Organization...)."),
    rule!(BrokenLinksFound, "broken_links", Technical, High, Page, broken_links_found,
        "{count} of the checked links are broken",
        "Fix or remove links that return errors or don't resolve."),
    rule!(RobotsDisallowAll, "robots_txt", Technical, High, check(CheckName::RobotsDisallow), robots_disallow_all,
        "robots.txt blocks all crawlers from the whole site",
        "Remove \"Disallow: /\" from the \"User-agent: *\" group."),
    rule!(RobotsTxtMissing, "robots_txt", Technical, Low, check(CheckName::RobotsDisallow), robots_txt_missing,
        "No robots.txt was found (HTTP {value})",
        "Publish a robots.txt at the site root, including a Sitemap line."),
    rule!(SitemapMissing, "sitemap", Technical, Low, check(CheckName::RobotsDisallow), sitemap_missing,
        "No XML sitemap was found",
        "Publish a sitemap.xml and reference it from robots.txt."),
    rule!(MetaRefreshPresent, "meta_refresh", Technical, Medium, check(CheckName::MetaRefresh), meta_refresh_present,
        "The page uses a meta refresh",
        "Replace meta refresh with a server-side 301 redirect."),
    rule!(Soft404, "error_page", Technical, Medium, check(CheckName::Custom404), soft_404,
        "A missing page answers with HTTP {value} instead of 404 (soft 404)",
        "Return a real 404 status for pages that don't exist."),
    rule!(Custom404Missing, "error_page", Technical, Low, check(CheckName::Custom404), custom_404_missing,
        "The site has no helpful custom 404 page",
        "Serve a friendly 404 page with navigation back into the site."),
    rule!(UrlNotFriendly, "url", Technical, Low, check(CheckName::UrlFriendliness), url_not_friendly,
        "The page URL has {count} readability issue(s)",
        "Use short, lower-case, hyphenated URLs without session parameters."),
    rule!(MixedContent, "mixed_content", Technical, High, check(CheckName::MixedContent), mixed_content,
        "{count} resource(s) are loaded over HTTP on an HTTPS page",
        "Load every resource over HTTPS."),
    rule!(HstsMissing, "hsts", Technical, Low, check(CheckName::Ssl), hsts_missing,
        "The Strict-Transport-Security header is missing",
        "Send Strict-Transport-Security with a max-age of at least six months."),
    rule!(HttpNotRedirected, "http_redirect", Technical, Medium, check(CheckName::Ssl), http_not_redirected,
        "The HTTP version of the page does not redirect to HTTPS",
        "Redirect all plain-HTTP requests to HTTPS with a 301."),
    rule!(ViewportMissing, "viewport", Technical, High, Page, viewport_missing,
        "The page has no viewport meta tag",
        "Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">."),
    rule!(MediaQueriesMissing, "media_queries", Technical, Medium, check(CheckName::MediaQueries), media_queries_missing,
        "No CSS media queries were found",
        "Make the layout responsive with CSS media queries."),
    rule!(CharsetMissing, "charset", Technical, Low, Page, charset_missing,
        "No character encoding is declared",
        "Declare <meta charset=\"utf-8\"> or send a charset in Content-Type."),
    rule!(LangMissing, "lang", Technical, Low, Page, lang_missing,
        "The <html> element has no lang attribute",
        "Set the page language, e.g. <html lang=\"en\">."),

    // ---- Performance ----
    rule!(TtfbVerySlow, "ttfb", Performance, High, Page, ttfb_very_slow,
        "Time to first byte is {value} ms",
        "Speed up the server: caching, a faster backend, or a CDN in front."),
    rule!(TtfbSlow, "ttfb", Performance, Medium, Page, ttfb_slow,
        "Time to first byte is {value} ms",
        "Aim for a time to first byte under 600 ms."),
    rule!(HtmlTooLarge, "page_size", Performance, Medium, Page, html_too_large,
        "The HTML document is {value} bytes",
        "Trim the HTML: move inline scripts/styles out and paginate long lists."),
    rule!(DomTooLarge, "dom_size", Performance, Low, Page, dom_too_large,
        "The DOM has {value} elements",
        "Simplify the markup to fewer than 1500 elements."),
    rule!(CompressionMissing, "compression", Performance, Medium, Page, compression_missing,
        "The HTML is served without compression",
        "Enable gzip or Brotli compression on the server."),
    rule!(Http2Missing, "http_version", Performance, Low, Page, http2_missing,
        "The page is not served over HTTP/2",
        "Enable HTTP/2 (or HTTP/3) on the server or CDN."),
    rule!(ResourcesUnresolved, "resource_health", Performance, Medium, Page, resources_unresolved,
        "{count} embedded resource(s) are missing or unreachable",
        "Fix or remove references to missing images, scripts and stylesheets."),
    rule!(ResourcesUncached, "caching", Performance, Low, Page, resources_uncached,
        "{count} resource(s) are served without Cache-Control",
        "Send Cache-Control headers with long max-age for static assets."),
    rule!(ImagesOversized, "image_weight", Performance, Medium, Page, images_oversized,
        "{count} image(s) are larger than 200 KB",
        "Compress images and serve modern formats (WebP, AVIF)."),
    rule!(TooManyRequests, "request_count", Performance, Low, Page, too_many_requests,
        "The page references {value} resources",
        "Bundle scripts and styles and lazy-load below-the-fold images."),
    rule!(CdnMissing, "cdn", Performance, Low, Page, cdn_missing,
        "No resource appears to be served through a CDN",
        "Serve static assets through a CDN."),
    rule!(AssetsUnminified, "minification", Performance, Low, check(CheckName::Minification), assets_unminified,
        "{count} script(s)/stylesheet(s) are not minified",
        "Minify JavaScript and CSS in the build."),
    rule!(ImagesNotResponsive, "responsive_images", Performance, Low, check(CheckName::ResponsiveImages), images_not_responsive,
        "{count} image(s) have no srcset or sizes",
        "Provide srcset/sizes so small screens download small images."),
    rule!(ImagesMissingDimensions, "image_dimensions", Performance, Low, check(CheckName::ImageAspectRatio), images_missing_dimensions,
        "{count} image(s) have no declared width and height",
        "Set width and height on images to avoid layout shifts."),
    rule!(LcpSlow, "lcp", Performance, High, Lab, lcp_slow,
        "Largest Contentful Paint is {value} ms",
        "Optimise the largest above-the-fold element: preload it, compress it, cut render-blocking resources."),
    rule!(ClsHigh, "cls", Performance, Medium, Browser, cls_high,
        "Cumulative Layout Shift is {value}",
        "Reserve space for images, ads and embeds so content doesn't move."),
    rule!(FcpSlow, "fcp", Performance, Medium, Browser, fcp_slow,
        "First Contentful Paint is {value} ms",
        "Inline critical CSS and defer non-critical scripts."),
    rule!(ConsoleErrors, "console_errors", Performance, Low, Browser, console_errors,
        "{count} JavaScript console error(s)",
        "Fix the errors reported in the browser console."),
    rule!(PagespeedScoreLow, "pagespeed", Performance, Medium, check(CheckName::PageSpeed), pagespeed_score_low,
        "PageSpeed performance score is {value}/100",
        "Work through the PageSpeed Insights opportunities for this page."),

    // ---- Branding ----
    rule!(OpenGraphMissing, "open_graph", Branding, Medium, Page, open_graph_missing,
        "{count} Open Graph tag(s) are missing",
        "Add og:title, og:description and og:image for rich social previews."),
    rule!(TwitterCardMissing, "twitter_card", Branding, Low, Page, twitter_card_missing,
        "The page has no Twitter card",
        "Add <meta name=\"twitter:card\" content=\"summary_large_image\">."),
    rule!(FaviconMissing, "favicon", Branding, Low, Page, favicon_missing,
        "The page declares no favicon",
        "Add a <link rel=\"icon\"> to the page head."),
];

// -----------------------------------------------------------------------------
// Predicates
// -----------------------------------------------------------------------------

fn chars(text: &str) -> usize {
    text.chars().count()
}

fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.to_lowercase().contains(&keyword.to_lowercase())
}

fn title_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.title.is_none().then(Evidence::none)
}

fn title_too_long(s: &Snapshot) -> Option<Evidence> {
    let len = chars(s.page.title.as_deref()?);
    (len > TITLE_MAX_CHARS).then(|| Evidence::value(len as f64))
}

fn title_too_short(s: &Snapshot) -> Option<Evidence> {
    let len = chars(s.page.title.as_deref()?);
    (len < TITLE_MIN_CHARS).then(|| Evidence::value(len as f64))
}

fn meta_description_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.meta_description.is_none().then(Evidence::none)
}

fn meta_description_too_long(s: &Snapshot) -> Option<Evidence> {
    let len = chars(s.page.meta_description.as_deref()?);
    (len > DESCRIPTION_MAX_CHARS).then(|| Evidence::value(len as f64))
}

fn h1_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.headings.h1.is_empty().then(Evidence::none)
}

fn h1_multiple(s: &Snapshot) -> Option<Evidence> {
    let h1 = &s.page.headings.h1;
    (h1.len() > 1).then(|| Evidence::count(h1.len()).with_samples(h1.iter().cloned()))
}

fn heading_hierarchy_skipped(s: &Snapshot) -> Option<Evidence> {
    let headings = &s.page.headings;
    (2..=6u8)
        .find(|&level| !headings.level(level).is_empty() && headings.level(level - 1).is_empty())
        .map(|level| Evidence::value(level as f64))
}

fn content_thin(s: &Snapshot) -> Option<Evidence> {
    (s.page.word_count < MIN_WORDS).then(|| Evidence::value(s.page.word_count as f64))
}

fn text_html_ratio_low(s: &Snapshot) -> Option<Evidence> {
    let ratio = s.performance.text_html_ratio;
    (ratio < MIN_TEXT_HTML_RATIO).then(|| Evidence::value(ratio))
}

fn images_missing_alt(s: &Snapshot) -> Option<Evidence> {
    let missing = &s.page.images.missing_alt;
    (!missing.is_empty()).then(|| Evidence::count(missing.len()).with_samples(missing.iter().cloned()))
}

fn keyword_missing_title(s: &Snapshot) -> Option<Evidence> {
    let keyword = s.target_keyword.as_deref()?;
    let title = s.page.title.as_deref()?;
    (!contains_keyword(title, keyword)).then(Evidence::none)
}

fn keyword_missing_description(s: &Snapshot) -> Option<Evidence> {
    let keyword = s.target_keyword.as_deref()?;
    let description = s.page.meta_description.as_deref()?;
    (!contains_keyword(description, keyword)).then(Evidence::none)
}

fn keyword_missing_headings(s: &Snapshot) -> Option<Evidence> {
    let keyword = s.target_keyword.as_deref()?;
    let mut headings = s.page.headings.all().peekable();
    headings.peek()?;
    (!headings.any(|h| contains_keyword(h, keyword))).then(Evidence::none)
}

fn spelling_errors(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.spell_check()?;
    (result.misspelled_count >= MAX_MISSPELLINGS)
        .then(|| Evidence::count(result.misspelled_count).with_samples(result.misspelled.iter().cloned()))
}

fn related_terms_sparse(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.related_keywords()?;
    (result.related.len() < MIN_RELATED_TERMS).then(|| {
        Evidence::count(result.related.len()).with_samples(result.related.iter().map(|t| t.term.clone()))
    })
}

fn https_missing(s: &Snapshot) -> Option<Evidence> {
    (!s.is_https()).then(Evidence::none)
}

fn robots_noindex(s: &Snapshot) -> Option<Evidence> {
    let meta = s
        .page
        .robots_directives
        .iter()
        .any(|d| d == "noindex" || d == "none");
    let header = s
        .header("x-robots-tag")
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v.contains("noindex") || v.split(',').any(|d| d.trim() == "none")
        })
        .unwrap_or(false);
    (meta || header).then(Evidence::none)
}

fn canonical_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.canonical.is_none().then(Evidence::none)
}

fn structured_data_invalid(s: &Snapshot) -> Option<Evidence> {
    match &s.page.structured_data {
        StructuredData::Invalid { error } => Some(Evidence::none().with_samples([error.clone()])),
        _ => None,
    }
}

fn structured_data_missing(s: &Snapshot) -> Option<Evidence> {
    matches!(s.page.structured_data, StructuredData::Absent).then(Evidence::none)
}

fn broken_links_found(s: &Snapshot) -> Option<Evidence> {
    let broken: Vec<&str> = s
        .links
        .iter()
        .filter(|l| l.is_broken())
        .map(|l| l.result.url.as_str())
        .collect();
    (!broken.is_empty()).then(|| Evidence::count(broken.len()).with_samples(broken))
}

fn robots_disallow_all(s: &Snapshot) -> Option<Evidence> {
    s.checks.site_files()?.blocks_all.then(Evidence::none)
}

fn robots_txt_missing(s: &Snapshot) -> Option<Evidence> {
    let files = s.checks.site_files()?;
    (!files.robots_txt_found).then(|| Evidence::value(files.robots_status as f64))
}

fn sitemap_missing(s: &Snapshot) -> Option<Evidence> {
    (!s.checks.site_files()?.sitemap_found).then(Evidence::none)
}

fn meta_refresh_present(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.meta_refresh()?;
    result
        .found
        .then(|| Evidence::count(result.contents.len()).with_samples(result.contents.iter().cloned()))
}

fn soft_404(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.custom_404()?;
    result
        .soft_404
        .then(|| Evidence::value(result.status as f64).with_samples([result.test_url.clone()]))
}

fn custom_404_missing(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.custom_404()?;
    (result.status == 404 && !result.custom_page).then(Evidence::none)
}

fn url_not_friendly(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.url_friendliness()?;
    (!result.is_friendly)
        .then(|| Evidence::count(result.issues.len()).with_samples(result.issues.iter().cloned()))
}

fn mixed_content(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.mixed_content()?;
    (result.insecure_count > 0)
        .then(|| Evidence::count(result.insecure_count).with_samples(result.insecure.iter().cloned()))
}

fn hsts_missing(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.ssl()?;
    (result.https && result.hsts.is_none()).then(Evidence::none)
}

fn http_not_redirected(s: &Snapshot) -> Option<Evidence> {
    (s.checks.ssl()?.http_redirects_to_https == Some(false)).then(Evidence::none)
}

fn viewport_missing(s: &Snapshot) -> Option<Evidence> {
    (!s.performance.has_viewport).then(Evidence::none)
}

fn media_queries_missing(s: &Snapshot) -> Option<Evidence> {
    (!s.checks.media_queries()?.found).then(Evidence::none)
}

fn charset_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.charset.is_none().then(Evidence::none)
}

fn lang_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.lang.is_none().then(Evidence::none)
}

fn ttfb_very_slow(s: &Snapshot) -> Option<Evidence> {
    let ttfb = s.performance.ttfb_ms;
    (ttfb > TTFB_VERY_SLOW_MS).then(|| Evidence::value(ttfb as f64))
}

fn ttfb_slow(s: &Snapshot) -> Option<Evidence> {
    let ttfb = s.performance.ttfb_ms;
    (ttfb > TTFB_SLOW_MS).then(|| Evidence::value(ttfb as f64))
}

fn html_too_large(s: &Snapshot) -> Option<Evidence> {
    let bytes = s.page.html_bytes;
    (bytes > MAX_HTML_BYTES).then(|| Evidence::value(bytes as f64))
}

fn dom_too_large(s: &Snapshot) -> Option<Evidence> {
    let nodes = s.page.dom_nodes;
    (nodes > MAX_DOM_NODES).then(|| Evidence::value(nodes as f64))
}

fn compression_missing(s: &Snapshot) -> Option<Evidence> {
    let encoding = s.header("content-encoding").unwrap_or_default().to_ascii_lowercase();
    let compressed = ["gzip", "br", "deflate", "zstd"]
        .iter()
        .any(|e| encoding.split(',').any(|part| part.trim() == *e));
    (!compressed).then(Evidence::none)
}

fn http2_missing(s: &Snapshot) -> Option<Evidence> {
    let version = s.performance.http_version.as_str();
    matches!(version, "HTTP/1.1" | "HTTP/1.0" | "HTTP/0.9")
        .then(|| Evidence::none().with_samples([version.to_string()]))
}

fn resources_unresolved(s: &Snapshot) -> Option<Evidence> {
    let failed: Vec<&str> = s
        .resources
        .iter()
        .filter(|r| r.result.is_broken())
        .map(|r| r.result.url.as_str())
        .collect();
    (!failed.is_empty()).then(|| Evidence::count(failed.len()).with_samples(failed))
}

fn resources_uncached(s: &Snapshot) -> Option<Evidence> {
    let uncached: Vec<&str> = s
        .resources
        .iter()
        .filter(|r| !r.result.is_broken() && !r.result.has_cache_control())
        .map(|r| r.result.url.as_str())
        .collect();
    (!uncached.is_empty()).then(|| Evidence::count(uncached.len()).with_samples(uncached))
}

fn images_oversized(s: &Snapshot) -> Option<Evidence> {
    let heavy: Vec<&str> = s
        .resources_of(ResourceKind::Image)
        .filter(|r| r.result.content_length.map(|len| len > MAX_IMAGE_BYTES).unwrap_or(false))
        .map(|r| r.result.url.as_str())
        .collect();
    (!heavy.is_empty()).then(|| Evidence::count(heavy.len()).with_samples(heavy))
}

fn too_many_requests(s: &Snapshot) -> Option<Evidence> {
    let total = s.resource_summary.discovered;
    (total > MAX_REQUESTS).then(|| Evidence::value(total as f64))
}

fn cdn_missing(s: &Snapshot) -> Option<Evidence> {
    let resolved = s.resources.iter().filter(|r| !r.result.is_broken()).count();
    let none_via_cdn = s.resource_summary.via_cdn == 0 && !is_cdn_response(&s.headers);
    (resolved > 0 && none_via_cdn).then(Evidence::none)
}

fn assets_unminified(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.minification()?;
    let unminified: Vec<&String> = result.unminified().collect();
    (!unminified.is_empty())
        .then(|| Evidence::count(unminified.len()).with_samples(unminified.into_iter().cloned()))
}

fn images_not_responsive(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.responsive_images()?;
    let count = result.non_responsive_count();
    (count > 0).then(|| Evidence::count(count).with_samples(result.non_responsive.iter().cloned()))
}

fn images_missing_dimensions(s: &Snapshot) -> Option<Evidence> {
    let result = s.checks.image_aspect_ratio()?;
    let missing = &result.missing_dimensions;
    (!missing.is_empty()).then(|| Evidence::count(missing.len()).with_samples(missing.iter().cloned()))
}

// Browser metrics first; PageSpeed's lab LCP when there is no browser
fn lcp_slow(s: &Snapshot) -> Option<Evidence> {
    let lcp = s
        .browser
        .metrics()
        .and_then(|m| m.lcp_ms)
        .or_else(|| s.checks.page_speed().and_then(|p| p.lcp_ms))?;
    (lcp > LCP_SLOW_MS).then(|| Evidence::value(lcp.round()))
}

fn cls_high(s: &Snapshot) -> Option<Evidence> {
    let cls = s.browser.metrics()?.cls?;
    (cls > CLS_HIGH).then(|| Evidence::value(cls))
}

fn fcp_slow(s: &Snapshot) -> Option<Evidence> {
    let fcp = s.browser.metrics()?.fcp_ms?;
    (fcp > FCP_SLOW_MS).then(|| Evidence::value(fcp.round()))
}

fn console_errors(s: &Snapshot) -> Option<Evidence> {
    let errors = &s.browser.metrics()?.console_errors;
    (!errors.is_empty()).then(|| Evidence::count(errors.len()).with_samples(errors.iter().cloned()))
}

fn pagespeed_score_low(s: &Snapshot) -> Option<Evidence> {
    let score = s.checks.page_speed()?.performance_score;
    (score < PAGESPEED_MIN_SCORE).then(|| Evidence::value(score as f64))
}

fn open_graph_missing(s: &Snapshot) -> Option<Evidence> {
    let missing: Vec<&str> = ["og:title", "og:description", "og:image"]
        .into_iter()
        .filter(|tag| !s.page.open_graph.contains_key(*tag))
        .collect();
    (!missing.is_empty()).then(|| Evidence::count(missing.len()).with_samples(missing))
}

fn twitter_card_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.twitter_card.is_none().then(Evidence::none)
}

fn favicon_missing(s: &Snapshot) -> Option<Evidence> {
    s.page.favicon.is_none().then(Evidence::none)
}
