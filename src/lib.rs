// src/lib.rs
// =============================================================================
// seo-audit: single-page SEO audit engine.
//
// Pipeline of one run (see audit.rs):
//
//   page fetch ─► SnapshotAggregator ─► FindingsEngine ─► ScoringEngine ─► Report
//                  │  links/resources through the ConcurrentChecker
//                  │  browser metrics (deep mode)
//                  └  check collaborators
//
// Modules:
// - audit: run_audit / Auditor
// - page: primary fetch and HTML parsing
// - checker: URL probes and the bounded concurrent checker
// - snapshot: the per-run aggregate and its builder
// - checks: the check collaborators (robots.txt, SSL, spelling...)
// - capability: optional machinery (dictionary, browser, PageSpeed)
// - findings: the rule table and its evaluation
// - scoring: category/overall scores, suggestions, the Report
// - output: table and JSON rendering
// =============================================================================

pub mod audit;
pub mod capability;
pub mod checker;
pub mod checks;
pub mod config;
pub mod error;
pub mod findings;
pub mod output;
pub mod page;
pub mod scoring;
pub mod snapshot;

pub use audit::{run_audit, Auditor};
pub use config::AuditOptions;
pub use error::{AuditError, CheckError, RuleTableError};
pub use scoring::Report;
