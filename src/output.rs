// src/output.rs
// =============================================================================
// Rendering a Report (or the rule table) for the terminal or as JSON.
//
// Everything here writes to stdout; logs go to stderr, so `--json` output
// can be piped straight into jq.
// =============================================================================

use anyhow::Result;

use crate::findings::RuleTable;
use crate::scoring::{FeatureStatus, Impact, Report};

pub fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report_table(report);
    }
    Ok(())
}

pub fn print_rules(table: &RuleTable, json: bool) -> Result<()> {
    if json {
        let rules: Vec<_> = table.iter().collect();
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    println!("{:<28} {:<20} {:<12} {:<9}", "KEY", "FEATURE", "CATEGORY", "IMPACT");
    println!("{}", "=".repeat(72));
    for rule in table.iter() {
        println!(
            "{:<28} {:<20} {:<12} {:<9}",
            rule.key.as_str(),
            rule.feature,
            rule.category.to_string(),
            rule.impact.to_string()
        );
    }
    println!();
    println!("{} rules, {} features", table.len(), table.features().len());
    Ok(())
}

fn print_report_table(report: &Report) {
    println!("🔍 SEO audit: {}", report.url);
    if report.final_url != report.url {
        println!("   ↪ redirected to {}", report.final_url);
    }
    println!();
    println!("📊 Overall score: {}/100", report.overall_score);
    for category in &report.categories {
        println!(
            "   {:<12} {:>3}/100  (-{})",
            category.category.to_string(),
            category.score,
            category.deducted
        );
    }
    println!();

    if report.suggestions.is_empty() {
        println!("✅ No issues found");
    } else {
        println!("{:<10} {:<12} {:<60}", "IMPACT", "CATEGORY", "ISSUE");
        println!("{}", "=".repeat(84));
        for suggestion in &report.suggestions {
            println!(
                "{:<10} {:<12} {:<60}",
                format_impact(suggestion.impact),
                suggestion.category.to_string(),
                truncate(&suggestion.message, 60)
            );
            println!("{:<23} → {}", "", suggestion.remediation);
        }
    }
    println!();

    let count = |status: FeatureStatus| report.breakdown.iter().filter(|r| r.status == status).count();
    println!("📋 Features:");
    println!("   ✅ Pass: {}", count(FeatureStatus::Pass));
    println!("   ⚠️  Warning: {}", count(FeatureStatus::Warning));
    println!("   ❌ Fail: {}", count(FeatureStatus::Fail));
    println!("   ➖ Not checked: {}", count(FeatureStatus::NotChecked));

    let completeness = &report.completeness;
    if !completeness.is_complete() {
        println!();
        println!("⏱️  Partial results:");
        if completeness.links_unresolved > 0 || completeness.links_skipped_by_cap > 0 {
            println!(
                "   links: {} unresolved, {} over the cap",
                completeness.links_unresolved, completeness.links_skipped_by_cap
            );
        }
        if completeness.resources_unresolved > 0 || completeness.resources_skipped_by_cap > 0 {
            println!(
                "   resources: {} unresolved, {} over the cap",
                completeness.resources_unresolved, completeness.resources_skipped_by_cap
            );
        }
        for not_run in &completeness.checks_not_run {
            println!("   {} not run: {}", not_run.check, not_run.reason);
        }
    }
}

fn format_impact(impact: Impact) -> String {
    match impact {
        Impact::Critical => "🔴 CRIT".to_string(),
        Impact::High => "🟠 HIGH".to_string(),
        Impact::Medium => "🟡 MED".to_string(),
        Impact::Low => "🔵 LOW".to_string(),
    }
}

// Cuts on a char boundary
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_rules_serialize_without_predicate() {
        let table = RuleTable::load().unwrap();
        let rules: Vec<_> = table.iter().collect();
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json[0]["key"], "title_missing");
        assert_eq!(json[0]["impact"], "critical");
        assert!(json[0].get("predicate").is_none());
    }
}
