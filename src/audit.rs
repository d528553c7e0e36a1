// src/audit.rs
// =============================================================================
// RunAudit: the one operation the library exposes.
//
//   run_audit(url, options, capabilities) -> Result<Report, AuditError>
//
// Steps:
// 1. validate the URL and options, load the rule table
// 2. fetch the primary page (fatal on failure, bounded by the deadline)
// 3. SnapshotAggregator: page facts, links, resources, browser, checks
// 4. FindingsEngine, then ScoringEngine
// 5. assemble the Report
//
// Only step 1 and 2 can fail. Once the page is in hand, a Report is always
// produced; anything that ran out of time shows up in its completeness
// section instead.
//
// `Auditor` is the configurable form: tests (and embedders) swap in their own
// PageFetcher, Probe or check list.
// =============================================================================

use reqwest::Client;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::capability::Capabilities;
use crate::checker::{HttpProbe, Probe};
use crate::checks::Check;
use crate::config::AuditOptions;
use crate::error::{AuditError, Result};
use crate::findings::{evaluate, RuleTable};
use crate::page::{HttpPageFetcher, PageFetcher};
use crate::scoring::{score, Report};
use crate::snapshot::SnapshotAggregator;

/// Audits one page with the real HTTP stack.
pub async fn run_audit(
    url: &str,
    options: AuditOptions,
    capabilities: Capabilities,
) -> Result<Report> {
    Auditor::new(options, capabilities)?.run(url).await
}

/// One configured audit run.
pub struct Auditor {
    options: AuditOptions,
    capabilities: Capabilities,
    client: Client,
    fetcher: Arc<dyn PageFetcher>,
    probe: Arc<dyn Probe>,
    checks: Option<Vec<Box<dyn Check>>>,
    cancel: CancellationToken,
}

impl Auditor {
    pub fn new(options: AuditOptions, capabilities: Capabilities) -> Result<Self> {
        options.validate()?;
        let client = build_client(&options)?;
        Ok(Self {
            fetcher: Arc::new(HttpPageFetcher::new(client.clone())),
            probe: Arc::new(HttpProbe::new(client.clone())),
            client,
            options,
            capabilities,
            checks: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probe = probe;
        self
    }

    /// Replaces the default check collaborators
    pub fn with_checks(mut self, checks: Vec<Box<dyn Check>>) -> Self {
        self.checks = Some(checks);
        self
    }

    /// Token that cancels this run; cancelling after the page fetch still
    /// yields a (partial) Report.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(self, url: &str) -> Result<Report> {
        let started = Instant::now();
        let deadline = started + self.options.overall_deadline;
        let target = parse_target(url)?;
        let table = RuleTable::load()?;

        info!(url = %target, deep = self.options.deep_browser_mode, "Starting audit");

        let fetch_timeout = self.options.request_timeout.min(self.options.overall_deadline);
        let page = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(AuditError::Cancelled { url: target.to_string() });
            }
            fetched = timeout_at(deadline, self.fetcher.fetch(&target, fetch_timeout)) => match fetched {
                Ok(page) => page?,
                Err(_) => return Err(AuditError::DeadlineExceeded { url: target.to_string() }),
            },
        };

        let capability_status = self.capabilities.status();
        let mut aggregator =
            SnapshotAggregator::new(self.probe, self.client, self.options, self.capabilities);
        if let Some(checks) = self.checks {
            aggregator = aggregator.with_checks(checks);
        }
        let snapshot = aggregator.build(page, deadline, &self.cancel).await;

        let findings = evaluate(&snapshot, table);
        let score = score(&findings, table);

        info!(
            url = %snapshot.final_url,
            overall = score.overall,
            findings = findings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Audit finished"
        );
        Ok(Report::assemble(snapshot, findings, score, table, capability_status))
    }
}

/// Shared client for the page fetch, the probes and the checks. reqwest's
/// transparent decompression is not enabled; see page::decode_body.
pub fn build_client(options: &AuditOptions) -> Result<Client> {
    let client = Client::builder()
        .user_agent(options.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

// A bare host ("example.com/page") is audited over https
fn parse_target(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    let invalid = |reason: String| AuditError::InvalidUrl {
        url: input.to_string(),
        reason,
    };
    if trimmed.is_empty() {
        return Err(invalid("empty URL".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(invalid("URL has no host".to_string())),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_accepts_http_and_https() {
        assert_eq!(parse_target("https://e.test/a").unwrap().as_str(), "https://e.test/a");
        assert_eq!(parse_target(" http://e.test ").unwrap().as_str(), "http://e.test/");
    }

    #[test]
    fn test_parse_target_defaults_to_https() {
        assert_eq!(parse_target("e.test/page").unwrap().as_str(), "https://e.test/page");
    }

    #[test]
    fn test_parse_target_rejects_other_schemes() {
        assert!(matches!(parse_target("ftp://e.test/"), Err(AuditError::InvalidUrl { .. })));
        assert!(matches!(parse_target(""), Err(AuditError::InvalidUrl { .. })));
        assert!(matches!(parse_target("https://"), Err(AuditError::InvalidUrl { .. })));
    }

    #[test]
    fn test_invalid_options_rejected_before_any_request() {
        let options = AuditOptions::new().with_link_concurrency(0);
        assert!(matches!(
            Auditor::new(options, Capabilities::none()),
            Err(AuditError::InvalidOptions(_))
        ));
    }
}
