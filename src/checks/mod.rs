// src/checks/mod.rs
// =============================================================================
// Check collaborators: independent analyses that read the snapshot and
// return one small typed result each.
//
// Submodules (in the order they run):
// - url_friendly: path/query hygiene of the page URL
// - robots: robots.txt Disallow rules and sitemap discovery
// - meta_refresh: <meta http-equiv="refresh">
// - error_page: custom 404 / soft-404 detection
// - spelling: dictionary-based spell check (needs a word list)
// - responsive_images: srcset/sizes and lazy-loading on <img>
// - image_ratio: declared width/height on <img>
// - media_query: @media rules inline or in stylesheets
// - mixed_content: http:// resources on an https page
// - minification: whitespace ratio of scripts and stylesheets
// - ssl: HTTPS, HSTS and http->https redirect
// - related_keywords: terms co-occurring with the target keyword
// - pagespeed: Google PageSpeed Insights (needs an API key)
// - mobile_snapshot: mobile screenshot (needs the browser worker)
//
// The aggregator runs them one after the other and stores each outcome in
// `CheckResults`. A check that errors, panics or runs out of time is stored
// as NotRun; the rules that depend on it then simply don't fire.
// =============================================================================

pub mod browser;
mod error_page;
mod image_ratio;
mod media_query;
mod meta_refresh;
mod minification;
mod mixed_content;
pub mod pagespeed;
mod related_keywords;
mod responsive_images;
mod robots;
pub mod spelling;
mod ssl;
mod url_friendly;

pub use browser::{BrowserWorker, MobileSnapshot, MobileSnapshotCheck};
pub use error_page::{Custom404, ErrorPageCheck};
pub use image_ratio::{DeclaredImage, ImageAspectRatio, ImageRatioCheck};
pub use media_query::{MediaQueries, MediaQueryCheck};
pub use meta_refresh::{MetaRefresh, MetaRefreshCheck};
pub use minification::{AssetTally, Minification, MinificationCheck};
pub use mixed_content::{MixedContent, MixedContentCheck};
pub use pagespeed::{PageSpeed, PageSpeedCheck, PageSpeedClient};
pub use related_keywords::{RelatedKeywords, RelatedKeywordsCheck, RelatedTerm};
pub use responsive_images::{ResponsiveImageCheck, ResponsiveImages};
pub use robots::{RobotsCheck, SiteFiles};
pub use spelling::{Dictionary, SpellCheck, SpellCheckResult};
pub use ssl::{SslCheck, SslInspection};
pub use url_friendly::{UrlFriendliness, UrlFriendlinessCheck};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::capability::Capabilities;
use crate::config::AuditOptions;
use crate::error::{CheckError, CheckResult};
use crate::snapshot::Snapshot;

/// Fixed names of the check collaborators, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    UrlFriendliness,
    RobotsDisallow,
    MetaRefresh,
    #[serde(rename = "custom_404")]
    Custom404,
    SpellCheck,
    ResponsiveImages,
    ImageAspectRatio,
    MediaQueries,
    MixedContent,
    Minification,
    Ssl,
    RelatedKeywords,
    PageSpeed,
    MobileSnapshot,
}

impl CheckName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::UrlFriendliness => "url_friendliness",
            CheckName::RobotsDisallow => "robots_disallow",
            CheckName::MetaRefresh => "meta_refresh",
            CheckName::Custom404 => "custom_404",
            CheckName::SpellCheck => "spell_check",
            CheckName::ResponsiveImages => "responsive_images",
            CheckName::ImageAspectRatio => "image_aspect_ratio",
            CheckName::MediaQueries => "media_queries",
            CheckName::MixedContent => "mixed_content",
            CheckName::Minification => "minification",
            CheckName::Ssl => "ssl",
            CheckName::RelatedKeywords => "related_keywords",
            CheckName::PageSpeed => "page_speed",
            CheckName::MobileSnapshot => "mobile_snapshot",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check's typed output.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CheckReport {
    UrlFriendliness(UrlFriendliness),
    SiteFiles(SiteFiles),
    MetaRefresh(MetaRefresh),
    Custom404(Custom404),
    SpellCheck(SpellCheckResult),
    ResponsiveImages(ResponsiveImages),
    ImageAspectRatio(ImageAspectRatio),
    MediaQueries(MediaQueries),
    MixedContent(MixedContent),
    Minification(Minification),
    Ssl(SslInspection),
    RelatedKeywords(RelatedKeywords),
    PageSpeed(PageSpeed),
    MobileSnapshot(MobileSnapshot),
}

/// Stored outcome of one check.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckEntry {
    Completed { result: CheckReport },
    NotRun { reason: String },
}

/// Outcomes of every check that was attempted, keyed by name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CheckResults {
    entries: BTreeMap<CheckName, CheckEntry>,
}

// Typed accessors: Some only when the check completed AND produced the
// expected variant. Anything else is "insufficient evidence".
macro_rules! typed_accessor {
    ($fn_name:ident, $name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name(&self) -> Option<&$ty> {
            match self.get(CheckName::$name) {
                Some(CheckReport::$variant(result)) => Some(result),
                _ => None,
            }
        }
    };
}

impl CheckResults {
    /// Stores an outcome. Entries are write-once: a second write for the
    /// same check is refused and logged.
    pub fn record(&mut self, name: CheckName, entry: CheckEntry) -> bool {
        if self.entries.contains_key(&name) {
            warn!(check = %name, "Refusing to overwrite an existing check result");
            return false;
        }
        self.entries.insert(name, entry);
        true
    }

    pub fn entry(&self, name: CheckName) -> Option<&CheckEntry> {
        self.entries.get(&name)
    }

    /// The completed result of a check, if it ran successfully.
    pub fn get(&self, name: CheckName) -> Option<&CheckReport> {
        match self.entries.get(&name) {
            Some(CheckEntry::Completed { result }) => Some(result),
            _ => None,
        }
    }

    pub fn not_run(&self) -> Vec<(CheckName, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| match entry {
                CheckEntry::NotRun { reason } => Some((*name, reason.as_str())),
                CheckEntry::Completed { .. } => None,
            })
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, CheckEntry::Completed { .. }))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    typed_accessor!(url_friendliness, UrlFriendliness, UrlFriendliness, UrlFriendliness);
    typed_accessor!(site_files, RobotsDisallow, SiteFiles, SiteFiles);
    typed_accessor!(meta_refresh, MetaRefresh, MetaRefresh, MetaRefresh);
    typed_accessor!(custom_404, Custom404, Custom404, Custom404);
    typed_accessor!(spell_check, SpellCheck, SpellCheck, SpellCheckResult);
    typed_accessor!(responsive_images, ResponsiveImages, ResponsiveImages, ResponsiveImages);
    typed_accessor!(image_aspect_ratio, ImageAspectRatio, ImageAspectRatio, ImageAspectRatio);
    typed_accessor!(media_queries, MediaQueries, MediaQueries, MediaQueries);
    typed_accessor!(mixed_content, MixedContent, MixedContent, MixedContent);
    typed_accessor!(minification, Minification, Minification, Minification);
    typed_accessor!(ssl, Ssl, Ssl, SslInspection);
    typed_accessor!(related_keywords, RelatedKeywords, RelatedKeywords, RelatedKeywords);
    typed_accessor!(page_speed, PageSpeed, PageSpeed, PageSpeed);
    typed_accessor!(mobile_snapshot, MobileSnapshot, MobileSnapshot, MobileSnapshot);
}

/// Read-only view handed to a check.
pub struct CheckContext<'a> {
    pub snapshot: &'a Snapshot,
    pub client: &'a Client,
    pub options: &'a AuditOptions,
    /// Per-request timeout, already capped by the remaining deadline
    pub request_timeout: Duration,
    /// Time left until the overall deadline
    pub remaining: Duration,
}

/// A check collaborator.
#[async_trait]
pub trait Check: Send + Sync {
    fn name(&self) -> CheckName;

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport>;
}

/// Every check, in the fixed order they run in.
pub fn default_checks(capabilities: &Capabilities) -> Vec<Box<dyn Check>> {
    vec![
        Box::new(UrlFriendlinessCheck),
        Box::new(RobotsCheck),
        Box::new(MetaRefreshCheck),
        Box::new(ErrorPageCheck),
        Box::new(SpellCheck::new(capabilities.dictionary.clone())),
        Box::new(ResponsiveImageCheck),
        Box::new(ImageRatioCheck),
        Box::new(MediaQueryCheck),
        Box::new(MixedContentCheck),
        Box::new(MinificationCheck),
        Box::new(SslCheck),
        Box::new(RelatedKeywordsCheck),
        Box::new(PageSpeedCheck::new(capabilities.pagespeed.clone())),
        Box::new(MobileSnapshotCheck::new(capabilities.browser.clone())),
    ]
}

/// GETs a URL and returns its status and (lossily decoded) body, truncated
/// to `max_bytes`.
pub(crate) async fn fetch_text(
    client: &Client,
    url: &str,
    timeout: Duration,
    max_bytes: usize,
) -> CheckResult<(u16, String)> {
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    let end = bytes.len().min(max_bytes);
    Ok((status, String::from_utf8_lossy(&bytes[..end]).into_owned()))
}

/// Origin ("scheme://host[:port]") of the audited page.
pub(crate) fn origin_of(snapshot: &Snapshot) -> CheckResult<url::Url> {
    let url = url::Url::parse(&snapshot.final_url).map_err(|e| CheckError::Parse(e.to_string()))?;
    let origin = url.origin().ascii_serialization();
    url::Url::parse(&origin).map_err(|e| CheckError::Parse(e.to_string()))
}
