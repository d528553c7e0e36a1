// src/snapshot/mod.rs
// =============================================================================
// The Snapshot: everything one audit run learned about one page.
//
// A Snapshot is built once per run by the SnapshotAggregator
// (snapshot/aggregator.rs), then only read: the findings engine evaluates
// it and the report embeds it. Fields use explicit "absent" states (Option,
// StructuredData::Absent, BrowserState::Disabled, a missing check entry)
// so a rule can tell "not found on the page" from "not checked".
// =============================================================================

mod aggregator;

pub use aggregator::{seed, SnapshotAggregator};

#[cfg(test)]
pub(crate) use aggregator::fixtures;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::checker::{FailureKind, ProbeResult, ResourceKind};
use crate::checks::CheckResults;

/// The per-run aggregate of page facts, probe results and check outputs.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// URL the audit was asked to run against
    pub source_url: String,
    /// URL after redirects
    pub final_url: String,
    pub scheme: String,
    pub host: String,
    pub status: u16,
    /// Keyword the page is audited for
    pub target_keyword: Option<String>,

    pub page: PageFacts,
    pub performance: PerformanceFacts,

    /// Response headers of the primary page, lower-case keys
    pub headers: BTreeMap<String, String>,

    pub links: Vec<LinkRecord>,
    pub link_summary: LinkSummary,
    pub resources: Vec<ResourceRecord>,
    pub resource_summary: ResourceSummary,

    pub browser: BrowserState,

    /// Check collaborator outputs keyed by check name; a missing key means
    /// the check never ran
    pub checks: CheckResults,

    /// Raw HTML of the primary page, for check collaborators
    #[serde(skip)]
    pub html: String,
}

impl Snapshot {
    pub fn is_https(&self) -> bool {
        self.scheme == "https"
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Resources of one kind, in discovery order
    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceRecord> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }
}

/// On-page facts parsed out of the primary HTML.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageFacts {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    /// Lower-cased tokens of <meta name="robots">
    pub robots_directives: Vec<String>,
    pub structured_data: StructuredData,
    pub headings: Headings,
    #[serde(skip)]
    pub body_text: String,
    pub word_count: usize,
    /// Number of element nodes in the DOM
    pub dom_nodes: usize,
    /// Size of the raw HTML in bytes
    pub html_bytes: usize,
    pub charset: Option<String>,
    pub lang: Option<String>,
    pub favicon: Option<String>,
    pub open_graph: BTreeMap<String, String>,
    pub twitter_card: Option<String>,
    pub images: ImageSummary,
}

/// The first JSON-LD block of the page, if any.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StructuredData {
    #[default]
    Absent,
    Valid { payload: serde_json::Value },
    Invalid { error: String },
}

/// Heading texts per level.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub h4: Vec<String>,
    pub h5: Vec<String>,
    pub h6: Vec<String>,
}

impl Headings {
    /// Headings at `level` (1..=6); anything else is empty
    pub fn level(&self, level: u8) -> &[String] {
        match level {
            1 => &self.h1,
            2 => &self.h2,
            3 => &self.h3,
            4 => &self.h4,
            5 => &self.h5,
            6 => &self.h6,
            _ => &[],
        }
    }

    pub(crate) fn level_mut(&mut self, level: u8) -> Option<&mut Vec<String>> {
        match level {
            1 => Some(&mut self.h1),
            2 => Some(&mut self.h2),
            3 => Some(&mut self.h3),
            4 => Some(&mut self.h4),
            5 => Some(&mut self.h5),
            6 => Some(&mut self.h6),
            _ => None,
        }
    }

    /// All heading texts, H1 first
    pub fn all(&self) -> impl Iterator<Item = &String> {
        (1..=6).flat_map(move |level| self.level(level).iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ImageSummary {
    pub count: usize,
    /// src of every <img> without an alt attribute
    pub missing_alt: Vec<String>,
}

/// Timing and transport facts of the primary fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceFacts {
    pub ttfb_ms: u64,
    pub is_https: bool,
    pub has_viewport: bool,
    /// Visible text bytes / HTML bytes, as a percentage
    pub text_html_ratio: f64,
    /// "HTTP/1.1", "HTTP/2.0"...
    pub http_version: String,
    /// Decoded HTML size
    pub page_bytes: usize,
    /// HTML size on the wire, after Content-Encoding
    pub transfer_bytes: usize,
}

/// Whether an outbound link stays on the page's host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkScope {
    Internal,
    External,
}

/// One probed outbound link.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRecord {
    pub scope: LinkScope,
    #[serde(flatten)]
    pub result: ProbeResult,
}

impl LinkRecord {
    pub fn is_broken(&self) -> bool {
        self.result.is_broken()
    }
}

/// One probed embedded resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub result: ProbeResult,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LinkSummary {
    pub discovered: usize,
    pub internal: usize,
    pub external: usize,
    pub checked: usize,
    /// Discovered but beyond the link cap
    pub skipped_by_cap: usize,
    pub broken: usize,
    pub unresolved: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ResourceSummary {
    pub discovered: usize,
    pub checked: usize,
    pub skipped_by_cap: usize,
    pub requests_by_kind: BTreeMap<ResourceKind, usize>,
    /// Sum of advertised Content-Length per kind
    pub bytes_by_kind: BTreeMap<ResourceKind, u64>,
    pub missing: usize,
    pub unresolved: usize,
    pub uncached: usize,
    pub via_cdn: usize,
    /// Unresolved probes per failure classification
    pub failures: BTreeMap<FailureKind, usize>,
}

/// Core Web Vitals gathered by the browser worker (deep mode).
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BrowserMetrics {
    pub fcp_ms: Option<f64>,
    pub lcp_ms: Option<f64>,
    pub cls: Option<f64>,
    pub ttfb_ms: Option<f64>,
    pub console_errors: Vec<String>,
}

/// Outcome of the deep-mode browser phase.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BrowserState {
    /// Deep mode was not requested
    #[default]
    Disabled,
    /// Requested, but the browser could not be used
    Unavailable { reason: String },
    Collected { metrics: BrowserMetrics },
}

impl BrowserState {
    pub fn metrics(&self) -> Option<&BrowserMetrics> {
        match self {
            BrowserState::Collected { metrics } => Some(metrics),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headings_levels() {
        let mut headings = Headings::default();
        headings.level_mut(1).unwrap().push("Title".to_string());
        headings.level_mut(3).unwrap().push("Detail".to_string());
        assert!(headings.level_mut(7).is_none());

        assert_eq!(headings.level(1), ["Title".to_string()]);
        assert!(headings.level(2).is_empty());
        assert_eq!(headings.all().count(), 2);
    }

    #[test]
    fn test_structured_data_serializes_state() {
        let json = serde_json::to_value(StructuredData::Absent).unwrap();
        assert_eq!(json["state"], "absent");
    }
}
