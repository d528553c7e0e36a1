// src/findings/mod.rs
// =============================================================================
// Findings: which rules fired for this page, and with what evidence.
//
// Submodules:
// - rules: the static, validated rule table (key, category, impact, texts,
//   predicate)
// - engine: evaluates the table against a Snapshot
//
// A finding key is a closed enum, and its evidence is one small typed
// payload (an optional number, an optional count, a short sample of URLs),
// so nothing downstream looks findings up by string.
// =============================================================================

mod engine;
mod rules;

pub use engine::evaluate;
pub use rules::{validate, Requires, Rule, RuleTable, RULES};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Evidence lists keep at most this many sample items
pub const MAX_SAMPLES: usize = 5;

macro_rules! finding_keys {
    ($($variant:ident => $name:literal,)+) => {
        /// Fixed vocabulary of finding keys.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum FindingKey {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl FindingKey {
            /// Every key, in declaration order
            pub const ALL: &'static [FindingKey] = &[$(FindingKey::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(FindingKey::$variant => $name,)+
                }
            }
        }
    };
}

finding_keys! {
    // Content
    TitleMissing => "title_missing",
    TitleTooLong => "title_too_long",
    TitleTooShort => "title_too_short",
    MetaDescriptionMissing => "meta_description_missing",
    MetaDescriptionTooLong => "meta_description_too_long",
    H1Missing => "h1_missing",
    H1Multiple => "h1_multiple",
    HeadingHierarchySkipped => "heading_hierarchy_skipped",
    ContentThin => "content_thin",
    TextHtmlRatioLow => "text_html_ratio_low",
    ImagesMissingAlt => "images_missing_alt",
    KeywordMissingTitle => "keyword_missing_title",
    KeywordMissingDescription => "keyword_missing_description",
    KeywordMissingHeadings => "keyword_missing_headings",
    SpellingErrors => "spelling_errors",
    RelatedTermsSparse => "related_terms_sparse",
    // Technical
    HttpsMissing => "https_missing",
    RobotsNoindex => "robots_noindex",
    CanonicalMissing => "canonical_missing",
    StructuredDataInvalid => "structured_data_invalid",
    StructuredDataMissing => "structured_data_missing",
    BrokenLinksFound => "broken_links_found",
    RobotsDisallowAll => "robots_disallow_all",
    RobotsTxtMissing => "robots_txt_missing",
    SitemapMissing => "sitemap_missing",
    MetaRefreshPresent => "meta_refresh_present",
    Soft404 => "soft_404",
    Custom404Missing => "custom_404_missing",
    UrlNotFriendly => "url_not_friendly",
    MixedContent => "mixed_content",
    HstsMissing => "hsts_missing",
    HttpNotRedirected => "http_not_redirected",
    ViewportMissing => "viewport_missing",
    MediaQueriesMissing => "media_queries_missing",
    CharsetMissing => "charset_missing",
    LangMissing => "lang_missing",
    // Performance
    TtfbVerySlow => "ttfb_very_slow",
    TtfbSlow => "ttfb_slow",
    HtmlTooLarge => "html_too_large",
    DomTooLarge => "dom_too_large",
    CompressionMissing => "compression_missing",
    Http2Missing => "http2_missing",
    ResourcesUnresolved => "resources_unresolved",
    ResourcesUncached => "resources_uncached",
    ImagesOversized => "images_oversized",
    TooManyRequests => "too_many_requests",
    CdnMissing => "cdn_missing",
    AssetsUnminified => "assets_unminified",
    ImagesNotResponsive => "images_not_responsive",
    ImagesMissingDimensions => "images_missing_dimensions",
    LcpSlow => "lcp_slow",
    ClsHigh => "cls_high",
    FcpSlow => "fcp_slow",
    ConsoleErrors => "console_errors",
    PagespeedScoreLow => "pagespeed_score_low",
    // Branding
    OpenGraphMissing => "open_graph_missing",
    TwitterCardMissing => "twitter_card_missing",
    FaviconMissing => "favicon_missing",
}

impl fmt::Display for FindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a rule saw when it fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// A measured value (length, milliseconds, ratio...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// How many items are affected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// A few of the affected items, usually URLs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

impl Evidence {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn count(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::default()
        }
    }

    /// Adds up to MAX_SAMPLES items
    pub fn with_samples<I, S>(mut self, samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.samples = samples.into_iter().take(MAX_SAMPLES).map(Into::into).collect();
        self
    }
}

/// Triggered findings in rule-table order; at most one per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Findings {
    entries: IndexMap<FindingKey, Evidence>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding. Returns false (and keeps the first evidence) if
    /// the key was already recorded.
    pub fn insert(&mut self, key: FindingKey, evidence: Evidence) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, evidence);
        true
    }

    pub fn contains(&self, key: FindingKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn get(&self, key: FindingKey) -> Option<&Evidence> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FindingKey, &Evidence)> {
        self.entries.iter().map(|(key, evidence)| (*key, evidence))
    }

    pub fn keys(&self) -> impl Iterator<Item = FindingKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(FindingKey, Evidence)> for Findings {
    fn from_iter<T: IntoIterator<Item = (FindingKey, Evidence)>>(iter: T) -> Self {
        let mut findings = Findings::new();
        for (key, evidence) in iter {
            findings.insert(key, evidence);
        }
        findings
    }
}
