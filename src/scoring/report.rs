// src/scoring/report.rs
// =============================================================================
// The final, serializable audit report.
//
// Report::assemble is a pure derivation of (Snapshot, Findings, Score):
// - categories and suggestions come straight from the Score
// - breakdown has one row per rule-table feature, in table order:
//     Fail     the feature's finding is Critical or High
//     Warning  the finding is Medium or Low
//     Pass     no rule of the feature fired
//     NotChecked  no rule fired, but none of them had its input
//              (no keyword, check not run, no browser metrics)
//   NotChecked does not change the score; a rule that cannot see its
//   input simply does not fire.
// - completeness tells the reader how much of the page was verified
//
// generated_at is the only time-variant field besides measured timings.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Category, CategoryScore, Impact, Score, Suggestion};
use crate::capability::CapabilityStatus;
use crate::checks::{CheckEntry, CheckName};
use crate::findings::{Evidence, FindingKey, Findings, Requires, Rule, RuleTable};
use crate::snapshot::{BrowserState, Snapshot};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub url: String,
    pub final_url: String,
    pub generated_at: DateTime<Utc>,
    pub overall_score: u8,
    pub categories: Vec<CategoryScore>,
    pub suggestions: Vec<Suggestion>,
    pub breakdown: Vec<FeatureResult>,
    pub findings: Findings,
    pub completeness: Completeness,
    pub capabilities: Vec<CapabilityStatus>,
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Pass,
    Warning,
    Fail,
    NotChecked,
}

impl FeatureStatus {
    fn for_impact(impact: Impact) -> Self {
        match impact {
            Impact::Critical | Impact::High => FeatureStatus::Fail,
            Impact::Medium | Impact::Low => FeatureStatus::Warning,
        }
    }
}

/// One row of the per-feature breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureResult {
    pub feature: &'static str,
    pub category: Category,
    pub status: FeatureStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding: Option<FindingKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

/// How much of the page the run actually verified.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Completeness {
    pub links_unresolved: usize,
    pub links_skipped_by_cap: usize,
    pub resources_unresolved: usize,
    pub resources_skipped_by_cap: usize,
    pub checks_not_run: Vec<NotRunCheck>,
    pub browser: BrowserState,
}

impl Completeness {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            links_unresolved: snapshot.link_summary.unresolved,
            links_skipped_by_cap: snapshot.link_summary.skipped_by_cap,
            resources_unresolved: snapshot.resource_summary.unresolved,
            resources_skipped_by_cap: snapshot.resource_summary.skipped_by_cap,
            checks_not_run: snapshot
                .checks
                .not_run()
                .into_iter()
                .map(|(check, reason)| NotRunCheck {
                    check,
                    reason: reason.to_string(),
                })
                .collect(),
            browser: snapshot.browser.clone(),
        }
    }

    /// True when nothing was left unverified
    pub fn is_complete(&self) -> bool {
        self.links_unresolved == 0
            && self.links_skipped_by_cap == 0
            && self.resources_unresolved == 0
            && self.resources_skipped_by_cap == 0
            && self.checks_not_run.is_empty()
            && !matches!(self.browser, BrowserState::Unavailable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotRunCheck {
    pub check: CheckName,
    pub reason: String,
}

impl Report {
    pub fn assemble(
        snapshot: Snapshot,
        findings: Findings,
        score: Score,
        table: &RuleTable,
        capabilities: Vec<CapabilityStatus>,
    ) -> Self {
        let breakdown = breakdown(&snapshot, &findings, table);
        let completeness = Completeness::from_snapshot(&snapshot);
        Self {
            url: snapshot.source_url.clone(),
            final_url: snapshot.final_url.clone(),
            generated_at: Utc::now(),
            overall_score: score.overall,
            categories: score.categories,
            suggestions: score.suggestions,
            breakdown,
            findings,
            completeness,
            capabilities,
            snapshot,
        }
    }

    pub fn category_score(&self, category: Category) -> Option<u8> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.score)
    }
}

fn breakdown(snapshot: &Snapshot, findings: &Findings, table: &RuleTable) -> Vec<FeatureResult> {
    table
        .features()
        .into_iter()
        .filter_map(|feature| {
            let rules: Vec<&Rule> = table.rules_for(feature).collect();
            let first = *rules.first()?;

            if let Some(rule) = rules.iter().find(|r| findings.contains(r.key)) {
                let evidence = findings.get(rule.key).cloned().unwrap_or_default();
                return Some(FeatureResult {
                    feature,
                    category: rule.category,
                    status: FeatureStatus::for_impact(rule.impact),
                    message: rule.render(&evidence),
                    finding: Some(rule.key),
                    evidence: Some(evidence),
                });
            }

            let missing: Vec<String> = rules
                .iter()
                .filter_map(|r| missing_input(snapshot, r.requires))
                .collect();
            let (status, message) = if missing.len() == rules.len() {
                (FeatureStatus::NotChecked, format!("Not checked: {}", missing[0]))
            } else {
                (FeatureStatus::Pass, "No issues found".to_string())
            };
            Some(FeatureResult {
                feature,
                category: first.category,
                status,
                message,
                finding: None,
                evidence: None,
            })
        })
        .collect()
}

// Why a rule could not see its input, or None if it could
fn missing_input(snapshot: &Snapshot, requires: Requires) -> Option<String> {
    match requires {
        Requires::Page => None,
        Requires::Keyword => snapshot
            .target_keyword
            .is_none()
            .then(|| "no target keyword given".to_string()),
        Requires::Check(name) => match snapshot.checks.entry(name) {
            Some(CheckEntry::Completed { .. }) => None,
            Some(CheckEntry::NotRun { reason }) => Some(format!("{} did not run ({})", name, reason)),
            None => Some(format!("{} did not run", name)),
        },
        Requires::Browser => match &snapshot.browser {
            BrowserState::Collected { .. } => None,
            BrowserState::Disabled => Some("deep browser mode is off".to_string()),
            BrowserState::Unavailable { reason } => Some(format!("browser unavailable ({})", reason)),
        },
        Requires::Lab => {
            let browser = missing_input(snapshot, Requires::Browser)?;
            let page_speed = missing_input(snapshot, Requires::Check(CheckName::PageSpeed))?;
            Some(format!("{}; {}", browser, page_speed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{CheckReport, PageSpeed};
    use crate::findings::evaluate;
    use crate::scoring::score;
    use crate::snapshot::fixtures::snapshot_from_html;

    fn report_for(snapshot: Snapshot) -> Report {
        let table = RuleTable::load().unwrap();
        let findings = evaluate(&snapshot, table);
        let score = score(&findings, table);
        Report::assemble(snapshot, findings, score, table, Vec::new())
    }

    fn row<'a>(report: &'a Report, feature: &str) -> &'a FeatureResult {
        report.breakdown.iter().find(|r| r.feature == feature).unwrap()
    }

    const PAGE: &str = r#"<html lang="en"><head><title>Short</title></head>
        <body><h1>One</h1><h1>Two</h1></body></html>"#;

    #[test]
    fn test_breakdown_statuses() {
        let report = report_for(snapshot_from_html("https://e.test/", PAGE));

        assert_eq!(row(&report, "title").status, FeatureStatus::Warning);
        assert_eq!(row(&report, "title").finding, Some(FindingKey::TitleTooShort));
        assert_eq!(row(&report, "meta_description").status, FeatureStatus::Fail);
        assert_eq!(row(&report, "h1").status, FeatureStatus::Warning);
        assert_eq!(row(&report, "h1").message, "The page has 2 H1 headings");
        assert_eq!(row(&report, "lang").status, FeatureStatus::Pass);
    }

    #[test]
    fn test_unavailable_inputs_are_not_checked() {
        let report = report_for(snapshot_from_html("https://e.test/", PAGE));

        let keyword = row(&report, "keyword_title");
        assert_eq!(keyword.status, FeatureStatus::NotChecked);
        assert_eq!(keyword.message, "Not checked: no target keyword given");
        assert_eq!(row(&report, "lcp").status, FeatureStatus::NotChecked);
        assert_eq!(row(&report, "spelling").status, FeatureStatus::NotChecked);
    }

    fn page_speed_entry(lcp_ms: f64) -> CheckEntry {
        CheckEntry::Completed {
            result: CheckReport::PageSpeed(PageSpeed {
                performance_score: 90,
                lcp: Some(format!("{:.1} s", lcp_ms / 1000.0)),
                cls: None,
                fcp: None,
                speed_index: None,
                lcp_ms: Some(lcp_ms),
            }),
        }
    }

    #[test]
    fn test_lcp_is_checked_from_page_speed_without_browser() {
        let mut snapshot = snapshot_from_html("https://e.test/", PAGE);
        assert_eq!(snapshot.browser, BrowserState::Disabled);
        snapshot.checks.record(CheckName::PageSpeed, page_speed_entry(1800.0));
        assert_eq!(row(&report_for(snapshot), "lcp").status, FeatureStatus::Pass);

        let mut snapshot = snapshot_from_html("https://e.test/", PAGE);
        snapshot.checks.record(CheckName::PageSpeed, page_speed_entry(5200.0));
        let report = report_for(snapshot);
        let lcp = row(&report, "lcp");
        assert_eq!(lcp.status, FeatureStatus::Fail);
        assert_eq!(lcp.finding, Some(FindingKey::LcpSlow));
    }

    #[test]
    fn test_lcp_without_either_source_names_both() {
        let mut snapshot = snapshot_from_html("https://e.test/", PAGE);
        snapshot
            .checks
            .record(CheckName::PageSpeed, CheckEntry::NotRun { reason: "no API key".to_string() });
        let report = report_for(snapshot);
        let lcp = row(&report, "lcp");
        assert_eq!(lcp.status, FeatureStatus::NotChecked);
        assert_eq!(
            lcp.message,
            "Not checked: deep browser mode is off; page_speed did not run (no API key)"
        );
    }

    #[test]
    fn test_one_row_per_feature_in_table_order() {
        let report = report_for(snapshot_from_html("https://e.test/", PAGE));
        let table = RuleTable::load().unwrap();
        let features: Vec<&str> = report.breakdown.iter().map(|r| r.feature).collect();
        assert_eq!(features, table.features());
    }

    #[test]
    fn test_report_serializes() {
        let report = report_for(snapshot_from_html("https://e.test/", PAGE));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["url"], "https://e.test/");
        assert_eq!(json["categories"].as_array().unwrap().len(), 4);
        assert_eq!(json["breakdown"][0]["feature"], "title");
        assert_eq!(json["findings"]["title_too_short"]["value"], 5.0);
        assert_eq!(json["completeness"]["browser"]["state"], "disabled");
    }

    #[test]
    fn test_seeded_snapshot_is_complete() {
        let report = report_for(snapshot_from_html("https://e.test/", PAGE));
        assert!(report.completeness.is_complete());
    }
}
