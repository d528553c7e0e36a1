// src/findings/engine.rs
// =============================================================================
// FindingsEngine: runs the rule table over a Snapshot.
//
// Rules are visited in table order. Per feature only the first rule that
// fires counts, so "TTFB very slow" shadows "TTFB slow" and "title missing"
// shadows both length rules. Evaluation is pure: same Snapshot, same table,
// same Findings.
// =============================================================================

use std::collections::HashSet;
use tracing::debug;

use super::{Findings, RuleTable};
use crate::snapshot::Snapshot;

pub fn evaluate(snapshot: &Snapshot, table: &RuleTable) -> Findings {
    let mut findings = Findings::new();
    let mut matched: HashSet<&'static str> = HashSet::new();

    for rule in table.iter() {
        if matched.contains(rule.feature) {
            continue;
        }
        if let Some(evidence) = (rule.predicate)(snapshot) {
            matched.insert(rule.feature);
            findings.insert(rule.key, evidence);
        }
    }

    debug!(
        url = %snapshot.final_url,
        findings = findings.len(),
        "Rules evaluated"
    );
    findings
}
