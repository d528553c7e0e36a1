// src/scoring/mod.rs
// =============================================================================
// ScoringEngine: turns findings into scores and a prioritized to-do list.
//
// The model:
// - each category starts at 100
// - every finding deducts its impact's points from its rule's category
//   (Critical 20, High 12, Medium 6, Low 2)
// - the raw deduction is kept; only the displayed score is clamped at 0
// - overall = weighted sum of the clamped category scores, rounded,
//   clamped to 0..=100
// - suggestions: one per finding, most severe first; equal impact keeps
//   rule-table order (stable sort)
//
// Scoring can't fail. A finding without a rule is ignored (the rule table
// is validated at load, so that only happens with a hand-built table).
//
// Submodules:
// - report: the final serializable Report
// =============================================================================

mod report;

pub use report::{Completeness, FeatureResult, FeatureStatus, NotRunCheck, Report};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::findings::{FindingKey, Findings, RuleTable};

/// Score areas. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Content,
    Technical,
    Performance,
    Branding,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Content,
        Category::Technical,
        Category::Performance,
        Category::Branding,
    ];

    /// Share of the overall score; the four weights sum to 1
    pub fn weight(&self) -> f64 {
        match self {
            Category::Content => 0.35,
            Category::Technical => 0.30,
            Category::Performance => 0.25,
            Category::Branding => 0.10,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Content => "Content",
            Category::Technical => "Technical",
            Category::Performance => "Performance",
            Category::Branding => "Branding",
        };
        f.write_str(name)
    }
}

/// Severity of a finding. Declaration order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Critical,
    High,
    Medium,
    Low,
}

impl Impact {
    pub fn points(&self) -> u32 {
        match self {
            Impact::Critical => 20,
            Impact::High => 12,
            Impact::Medium => 6,
            Impact::Low => 2,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Impact::Critical => "Critical",
            Impact::High => "High",
            Impact::Medium => "Medium",
            Impact::Low => "Low",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: Category,
    /// Sum of all deductions, before clamping
    pub deducted: u32,
    /// 100 - deducted, floored at 0
    pub score: u8,
}

/// One remediation item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub key: FindingKey,
    pub feature: &'static str,
    pub category: Category,
    pub impact: Impact,
    pub message: String,
    pub remediation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub overall: u8,
    /// One entry per category, in Category::ALL order
    pub categories: Vec<CategoryScore>,
    pub suggestions: Vec<Suggestion>,
}

impl Score {
    pub fn category(&self, category: Category) -> Option<&CategoryScore> {
        self.categories.iter().find(|c| c.category == category)
    }
}

pub fn score(findings: &Findings, table: &RuleTable) -> Score {
    let mut deducted = [0u32; 4];
    // (rule position, suggestion); position restores table order
    let mut suggestions: Vec<(usize, Suggestion)> = Vec::new();

    for (key, evidence) in findings.iter() {
        let (Some(rule), Some(position)) = (table.get(key), table.position(key)) else {
            debug!(key = %key, "Finding without a rule ignored");
            continue;
        };
        deducted[category_index(rule.category)] += rule.impact.points();
        suggestions.push((
            position,
            Suggestion {
                key,
                feature: rule.feature,
                category: rule.category,
                impact: rule.impact,
                message: rule.render(evidence),
                remediation: rule.remediation,
            },
        ));
    }

    let categories: Vec<CategoryScore> = Category::ALL
        .iter()
        .map(|&category| {
            let raw = deducted[category_index(category)];
            CategoryScore {
                category,
                deducted: raw,
                score: 100u32.saturating_sub(raw) as u8,
            }
        })
        .collect();

    let weighted: f64 = categories
        .iter()
        .map(|c| c.score as f64 * c.category.weight())
        .sum();
    let overall = weighted.round().clamp(0.0, 100.0) as u8;

    // Table order first, then a stable sort by impact
    suggestions.sort_by_key(|(position, _)| *position);
    let mut suggestions: Vec<Suggestion> = suggestions.into_iter().map(|(_, s)| s).collect();
    suggestions.sort_by_key(|s| s.impact);

    Score {
        overall,
        categories,
        suggestions,
    }
}

fn category_index(category: Category) -> usize {
    match category {
        Category::Content => 0,
        Category::Technical => 1,
        Category::Performance => 2,
        Category::Branding => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Evidence;
    use proptest::prelude::*;

    fn table() -> &'static RuleTable {
        RuleTable::load().unwrap()
    }

    fn findings(keys: &[FindingKey]) -> Findings {
        keys.iter().map(|&k| (k, Evidence::none())).collect()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = Category::ALL.iter().map(Category::weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_findings_is_perfect() {
        let score = score(&Findings::new(), table());
        assert_eq!(score.overall, 100);
        assert!(score.categories.iter().all(|c| c.score == 100));
        assert!(score.suggestions.is_empty());
    }

    #[test]
    fn test_title_and_description_missing() {
        let score = score(
            &findings(&[FindingKey::TitleMissing, FindingKey::MetaDescriptionMissing]),
            table(),
        );
        assert_eq!(score.category(Category::Content).unwrap().score, 68);
        assert_eq!(score.category(Category::Technical).unwrap().score, 100);
        assert_eq!(score.category(Category::Performance).unwrap().score, 100);
        assert_eq!(score.category(Category::Branding).unwrap().score, 100);
        // 68 * 0.35 + 100 * 0.65 = 88.8
        assert_eq!(score.overall, 89);
    }

    #[test]
    fn test_deductions_accumulate_past_zero() {
        let keys = [
            FindingKey::HttpsMissing,
            FindingKey::RobotsNoindex,
            FindingKey::BrokenLinksFound,
            FindingKey::RobotsDisallowAll,
            FindingKey::MixedContent,
            FindingKey::ViewportMissing,
            FindingKey::CanonicalMissing,
            FindingKey::StructuredDataInvalid,
            FindingKey::MetaRefreshPresent,
            FindingKey::Soft404,
            FindingKey::HttpNotRedirected,
            FindingKey::MediaQueriesMissing,
        ];
        let score = score(&findings(&keys), table());
        let technical = score.category(Category::Technical).unwrap();
        assert_eq!(technical.deducted, 20 + 20 + 12 + 12 + 12 + 12 + 6 * 6);
        assert!(technical.deducted > 100);
        assert_eq!(technical.score, 0);
        // Only Technical lost points: 100 * (0.35 + 0.25 + 0.10)
        assert_eq!(score.overall, 70);
        assert_eq!(score.suggestions.len(), keys.len());
    }

    #[test]
    fn test_suggestions_sorted_by_impact_then_table_order() {
        // Inserted out of table order on purpose
        let score = score(
            &findings(&[
                FindingKey::FaviconMissing,
                FindingKey::ViewportMissing,
                FindingKey::TitleTooLong,
                FindingKey::HttpsMissing,
                FindingKey::MetaDescriptionMissing,
            ]),
            table(),
        );
        let keys: Vec<FindingKey> = score.suggestions.iter().map(|s| s.key).collect();
        assert_eq!(
            keys,
            vec![
                FindingKey::HttpsMissing,
                FindingKey::MetaDescriptionMissing,
                FindingKey::ViewportMissing,
                FindingKey::TitleTooLong,
                FindingKey::FaviconMissing,
            ]
        );
    }

    fn any_findings() -> impl Strategy<Value = Vec<FindingKey>> {
        proptest::sample::subsequence(FindingKey::ALL.to_vec(), 0..=FindingKey::ALL.len())
    }

    proptest! {
        #[test]
        fn prop_scores_are_bounded(keys in any_findings()) {
            let score = score(&findings(&keys), table());
            prop_assert!(score.overall <= 100);
            for category in &score.categories {
                prop_assert!(category.score <= 100);
            }
        }

        #[test]
        fn prop_scoring_is_idempotent(keys in any_findings()) {
            let f = findings(&keys);
            prop_assert_eq!(score(&f, table()), score(&f, table()));
        }

        #[test]
        fn prop_extra_finding_never_raises_a_score(keys in any_findings(), extra in proptest::sample::select(FindingKey::ALL.to_vec())) {
            let before = score(&findings(&keys), table());
            let mut with_extra = findings(&keys);
            with_extra.insert(extra, Evidence::none());
            let after = score(&with_extra, table());

            prop_assert!(after.overall <= before.overall);
            for (b, a) in before.categories.iter().zip(&after.categories) {
                prop_assert!(a.score <= b.score);
            }
        }
    }
}
