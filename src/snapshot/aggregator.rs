// src/snapshot/aggregator.rs
// =============================================================================
// SnapshotAggregator: builds the one Snapshot of an audit run.
//
// Phases, always in this order:
// 1. seed      page facts, headers and timings from the primary fetch
// 2. links     outbound anchors, capped, through the ConcurrentChecker
// 3. resources img/script/css URLs, capped, through the ConcurrentChecker
// 4. browser   Core Web Vitals from the browser worker (deep mode only)
// 5. checks    every check collaborator, one after the other
//
// The aggregator is the only writer. Checks get a shared borrow of the
// snapshot and return a value; the aggregator stores it under the check's
// name. Nothing written in an earlier phase is touched by a later one.
//
// Deadline and cancellation: the probe batches turn whatever is pending
// into "unresolved" results; a check that is still running is abandoned and
// recorded as not run; checks that haven't started yet are recorded as not
// run. The snapshot is always returned.
// =============================================================================

use futures::FutureExt;
use reqwest::Client;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    BrowserState, LinkRecord, LinkScope, LinkSummary, PerformanceFacts, ResourceRecord,
    ResourceSummary, Snapshot,
};
use crate::capability::Capabilities;
use crate::checker::{
    dedupe_urls, is_internal, ConcurrentChecker, Probe, ProbeResult, ProbeStatus, ResourceKind,
};
use crate::checks::{default_checks, Check, CheckContext, CheckEntry, CheckResults};
use crate::config::AuditOptions;
use crate::error::CheckError;
use crate::page::{parse_page, FetchedPage};

/// Drives every phase after the primary fetch.
pub struct SnapshotAggregator {
    probe: Arc<dyn Probe>,
    client: Client,
    options: AuditOptions,
    capabilities: Capabilities,
    checks: Vec<Box<dyn Check>>,
}

impl SnapshotAggregator {
    pub fn new(probe: Arc<dyn Probe>, client: Client, options: AuditOptions, capabilities: Capabilities) -> Self {
        let checks = default_checks(&capabilities);
        Self {
            probe,
            client,
            options,
            capabilities,
            checks,
        }
    }

    /// Replaces the check collaborators (tests, or callers with their own).
    pub fn with_checks(mut self, checks: Vec<Box<dyn Check>>) -> Self {
        self.checks = checks;
        self
    }

    pub async fn build(&self, page: FetchedPage, deadline: Instant, cancel: &CancellationToken) -> Snapshot {
        let (mut snapshot, links, resources) = seed(page);
        snapshot.target_keyword = self.options.target_keyword.clone();
        let base = Url::parse(&snapshot.final_url).ok();

        // Links
        let link_urls = dedupe_urls(links);
        let link_cap = self.options.link_check_cap.min(link_urls.len());
        let link_checker = ConcurrentChecker::new(
            self.probe.clone(),
            self.options.link_concurrency,
            self.options.request_timeout,
        );
        let link_results = link_checker.check_all(&link_urls[..link_cap], deadline, cancel).await;
        snapshot.links = link_results
            .into_iter()
            .map(|result| LinkRecord {
                scope: match &base {
                    Some(base) if is_internal(base, &result.url) => LinkScope::Internal,
                    _ => LinkScope::External,
                },
                result,
            })
            .collect();
        snapshot.link_summary = summarize_links(&link_urls, &snapshot.links, base.as_ref());

        // Resources
        let resource_cap = self.options.resource_check_cap.min(resources.len());
        let resource_urls: Vec<String> = resources[..resource_cap].iter().map(|(url, _)| url.clone()).collect();
        let resource_checker = ConcurrentChecker::new(
            self.probe.clone(),
            self.options.resource_concurrency,
            self.options.request_timeout,
        );
        let resource_results = resource_checker.check_all(&resource_urls, deadline, cancel).await;
        snapshot.resources = resources[..resource_cap]
            .iter()
            .zip(resource_results)
            .map(|((_, kind), result)| ResourceRecord { kind: *kind, result })
            .collect();
        snapshot.resource_summary = summarize_resources(&resources, &snapshot.resources);

        snapshot.browser = self.browser_phase(&snapshot.final_url, deadline, cancel).await;

        let checks = self.run_checks(&snapshot, deadline, cancel).await;
        snapshot.checks = checks;

        info!(
            url = %snapshot.final_url,
            links = snapshot.links.len(),
            resources = snapshot.resources.len(),
            checks_completed = snapshot.checks.completed_count(),
            checks_not_run = snapshot.checks.not_run().len(),
            "Snapshot complete"
        );
        snapshot
    }

    async fn browser_phase(&self, url: &str, deadline: Instant, cancel: &CancellationToken) -> BrowserState {
        if !self.options.deep_browser_mode {
            return BrowserState::Disabled;
        }
        let worker = match self.capabilities.browser.get() {
            Ok(worker) => worker,
            Err(reason) => {
                return BrowserState::Unavailable {
                    reason: reason.to_string(),
                }
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CheckError::Skipped("audit cancelled".to_string())),
            result = timeout_at(deadline, worker.collect_metrics(url, remaining)) => {
                result.unwrap_or(Err(CheckError::Deadline))
            }
        };

        match outcome {
            Ok(metrics) => BrowserState::Collected { metrics },
            Err(e) => {
                warn!(error = %e, "Browser metrics unavailable");
                BrowserState::Unavailable { reason: e.to_string() }
            }
        }
    }

    async fn run_checks(&self, snapshot: &Snapshot, deadline: Instant, cancel: &CancellationToken) -> CheckResults {
        let mut results = CheckResults::default();

        for check in &self.checks {
            let name = check.name();
            let remaining = deadline.saturating_duration_since(Instant::now());

            let outcome = if cancel.is_cancelled() {
                Err(CheckError::Skipped("audit cancelled".to_string()))
            } else if remaining.is_zero() {
                Err(CheckError::Deadline)
            } else {
                let ctx = CheckContext {
                    snapshot,
                    client: &self.client,
                    options: &self.options,
                    request_timeout: self.options.request_timeout.min(remaining),
                    remaining,
                };
                let guarded = AssertUnwindSafe(check.run(&ctx)).catch_unwind();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CheckError::Skipped("audit cancelled".to_string())),
                    result = timeout_at(deadline, guarded) => match result {
                        Err(_) => Err(CheckError::Deadline),
                        Ok(Err(panic)) => Err(CheckError::Panicked(panic_message(panic.as_ref()))),
                        Ok(Ok(outcome)) => outcome,
                    },
                }
            };

            let entry = match outcome {
                Ok(result) => {
                    debug!(check = %name, "Check completed");
                    CheckEntry::Completed { result }
                }
                Err(e) => {
                    match &e {
                        CheckError::Unavailable(_) | CheckError::Skipped(_) => {
                            debug!(check = %name, reason = %e, "Check not run")
                        }
                        _ => warn!(check = %name, error = %e, "Check failed"),
                    }
                    CheckEntry::NotRun { reason: e.to_string() }
                }
            };
            results.record(name, entry);
        }

        results
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builds the snapshot's page section from the primary fetch. Returns the
/// snapshot plus the outbound links and embedded resources to probe.
pub fn seed(page: FetchedPage) -> (Snapshot, Vec<String>, Vec<(String, ResourceKind)>) {
    let parsed = parse_page(&page.body, &page.final_url);
    let mut facts = parsed.facts;

    // The Content-Type charset wins over <meta charset>
    if let Some(charset) = page.header_charset() {
        facts.charset = Some(charset);
    }

    let is_https = page.final_url.scheme() == "https";
    let text_html_ratio = if facts.html_bytes == 0 {
        0.0
    } else {
        let ratio = facts.body_text.len() as f64 / facts.html_bytes as f64 * 100.0;
        (ratio * 100.0).round() / 100.0
    };

    let performance = PerformanceFacts {
        ttfb_ms: page.ttfb.as_millis() as u64,
        is_https,
        has_viewport: parsed.has_viewport,
        text_html_ratio,
        http_version: page.http_version.clone(),
        page_bytes: page.size_bytes,
        transfer_bytes: page.transfer_bytes,
    };

    let snapshot = Snapshot {
        source_url: page.requested_url,
        final_url: page.final_url.to_string(),
        scheme: page.final_url.scheme().to_string(),
        host: page.final_url.host_str().unwrap_or_default().to_string(),
        status: page.status,
        target_keyword: None,
        page: facts,
        performance,
        headers: page.headers,
        links: Vec::new(),
        link_summary: LinkSummary::default(),
        resources: Vec::new(),
        resource_summary: ResourceSummary::default(),
        browser: BrowserState::Disabled,
        checks: CheckResults::default(),
        html: page.body,
    };

    (snapshot, parsed.links, parsed.resources)
}

fn summarize_links(discovered: &[String], checked: &[LinkRecord], base: Option<&Url>) -> LinkSummary {
    let internal = discovered
        .iter()
        .filter(|url| base.map(|b| is_internal(b, url)).unwrap_or(false))
        .count();

    LinkSummary {
        discovered: discovered.len(),
        internal,
        external: discovered.len() - internal,
        checked: checked.len(),
        skipped_by_cap: discovered.len() - checked.len(),
        broken: checked.iter().filter(|l| l.is_broken()).count(),
        unresolved: checked.iter().filter(|l| l.result.is_unresolved()).count(),
    }
}

fn summarize_resources(discovered: &[(String, ResourceKind)], checked: &[ResourceRecord]) -> ResourceSummary {
    let mut summary = ResourceSummary {
        discovered: discovered.len(),
        checked: checked.len(),
        skipped_by_cap: discovered.len() - checked.len(),
        ..Default::default()
    };

    for (_, kind) in discovered {
        *summary.requests_by_kind.entry(*kind).or_default() += 1;
    }

    for record in checked {
        let result: &ProbeResult = &record.result;
        match result.status_code() {
            None => {
                summary.unresolved += 1;
                if let ProbeStatus::Unresolved { reason } = result.status {
                    *summary.failures.entry(reason).or_default() += 1;
                }
            }
            Some(code) if code >= 400 => summary.missing += 1,
            Some(_) => {
                if let Some(length) = result.content_length {
                    *summary.bytes_by_kind.entry(record.kind).or_default() += length;
                }
                if !result.has_cache_control() {
                    summary.uncached += 1;
                }
                if result.served_by_cdn() {
                    summary.via_cdn += 1;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    /// A fetched page as the HTTP fetcher would return it.
    pub(crate) fn fetched(url: &str, html: &str) -> FetchedPage {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html; charset=utf-8".to_string());
        FetchedPage {
            requested_url: url.to_string(),
            final_url: Url::parse(url).unwrap(),
            status: 200,
            headers,
            size_bytes: html.len(),
            transfer_bytes: html.len(),
            body: html.to_string(),
            ttfb: Duration::from_millis(150),
            http_version: "HTTP/2.0".to_string(),
        }
    }

    /// A seeded snapshot with no probes and no checks.
    pub(crate) fn snapshot_from_html(url: &str, html: &str) -> Snapshot {
        seed(fetched(url, html)).0
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::fetched;
    use super::*;
    use crate::checker::ScriptedProbe;
    use crate::checks::{CheckName, CheckReport, MetaRefresh};
    use crate::error::CheckResult;
    use async_trait::async_trait;
    use std::time::Duration;

    const PAGE: &str = r#"<html><head><title>T</title>
        <link rel="stylesheet" href="/a.css"><script src="/a.js"></script></head>
        <body><p>Hello world</p>
        <a href="/one">1</a><a href="/two">2</a><a href="/one">again</a>
        <a href="https://other.test/x">x</a>
        <img src="/a.png"><img src="/b.png">
        </body></html>"#;

    fn aggregator(probe: ScriptedProbe, options: AuditOptions) -> SnapshotAggregator {
        SnapshotAggregator::new(Arc::new(probe), Client::new(), options, Capabilities::none())
            .with_checks(Vec::new())
    }

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[tokio::test(start_paused = true)]
    async fn test_links_are_deduped_capped_and_classified() {
        let probe = ScriptedProbe::new().with("https://e.test/two", Duration::from_millis(5), 404);
        let options = AuditOptions::new().with_link_check_cap(2);
        let agg = aggregator(probe, options);

        let snapshot = agg.build(fetched("https://e.test/", PAGE), far(), &CancellationToken::new()).await;

        assert_eq!(snapshot.link_summary.discovered, 3);
        assert_eq!(snapshot.link_summary.checked, 2);
        assert_eq!(snapshot.link_summary.skipped_by_cap, 1);
        assert_eq!(snapshot.link_summary.internal, 2);
        assert_eq!(snapshot.link_summary.external, 1);
        assert_eq!(snapshot.link_summary.broken, 1);
        assert!(snapshot.links.iter().all(|l| l.scope == LinkScope::Internal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_url_probed_once() {
        let probe = Arc::new(ScriptedProbe::new());
        let agg = SnapshotAggregator::new(probe.clone(), Client::new(), AuditOptions::new(), Capabilities::none())
            .with_checks(Vec::new());
        agg.build(fetched("https://e.test/", PAGE), far(), &CancellationToken::new()).await;
        assert_eq!(probe.call_count("https://e.test/one"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_summary() {
        let probe = ScriptedProbe::new().with("https://e.test/b.png", Duration::from_millis(5), 404);
        let agg = aggregator(probe, AuditOptions::new());
        let snapshot = agg.build(fetched("https://e.test/", PAGE), far(), &CancellationToken::new()).await;

        let summary = &snapshot.resource_summary;
        assert_eq!(summary.discovered, 4);
        assert_eq!(summary.checked, 4);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.requests_by_kind.get(&ResourceKind::Image), Some(&2));
        // Scripted responses carry no Cache-Control
        assert_eq!(summary.uncached, 3);
    }

    /// Images time out, everything else fails DNS.
    struct UnreachableProbe;

    #[async_trait]
    impl Probe for UnreachableProbe {
        async fn probe(&self, url: &str, _timeout: Duration) -> ProbeResult {
            let reason = if url.ends_with(".png") {
                crate::checker::FailureKind::Timeout
            } else {
                crate::checker::FailureKind::Dns
            };
            ProbeResult::unresolved(url, reason, "unreachable")
        }
    }

    #[tokio::test]
    async fn test_resource_failures_are_counted_by_kind() {
        use crate::checker::FailureKind;

        let agg = SnapshotAggregator::new(
            Arc::new(UnreachableProbe),
            Client::new(),
            AuditOptions::new(),
            Capabilities::none(),
        )
        .with_checks(Vec::new());
        let snapshot = agg.build(fetched("https://e.test/", PAGE), far(), &CancellationToken::new()).await;

        let summary = &snapshot.resource_summary;
        assert_eq!(summary.unresolved, 4);
        assert_eq!(summary.failures.get(&FailureKind::Timeout), Some(&2));
        assert_eq!(summary.failures.get(&FailureKind::Dns), Some(&2));
        // BTreeMap keys come out in declaration order
        let order: Vec<_> = summary.failures.keys().copied().collect();
        assert_eq!(order, vec![FailureKind::Timeout, FailureKind::Dns]);
    }

    #[test]
    fn test_seed_prefers_header_charset() {
        let html = r#"<html><head><meta charset="iso-8859-1"></head><body>x</body></html>"#;
        let (snapshot, _, _) = seed(fetched("https://e.test/", html));
        assert_eq!(snapshot.page.charset.as_deref(), Some("utf-8"));
        assert!(snapshot.performance.is_https);
        assert_eq!(snapshot.performance.ttfb_ms, 150);
        assert!(snapshot.performance.text_html_ratio > 0.0);
    }

    struct Fixed;
    #[async_trait]
    impl Check for Fixed {
        fn name(&self) -> CheckName {
            CheckName::MetaRefresh
        }
        async fn run(&self, _ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
            Ok(CheckReport::MetaRefresh(MetaRefresh {
                found: false,
                contents: Vec::new(),
            }))
        }
    }

    struct Panics;
    #[async_trait]
    impl Check for Panics {
        fn name(&self) -> CheckName {
            CheckName::Ssl
        }
        async fn run(&self, _ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
            panic!("boom")
        }
    }

    struct Hangs;
    #[async_trait]
    impl Check for Hangs {
        fn name(&self) -> CheckName {
            CheckName::PageSpeed
        }
        async fn run(&self, _ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(CheckError::Http("unreachable".to_string()))
        }
    }

    struct Fails;
    #[async_trait]
    impl Check for Fails {
        fn name(&self) -> CheckName {
            CheckName::Custom404
        }
        async fn run(&self, _ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
            Err(CheckError::Http("connection refused".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_checks_are_contained() {
        let agg = aggregator(ScriptedProbe::new(), AuditOptions::new()).with_checks(vec![
            Box::new(Fixed),
            Box::new(Fails),
            Box::new(Panics),
            Box::new(Hangs),
        ]);
        let deadline = Instant::now() + Duration::from_secs(30);
        let snapshot = agg.build(fetched("https://e.test/", PAGE), deadline, &CancellationToken::new()).await;

        assert!(snapshot.checks.meta_refresh().is_some());
        let not_run: Vec<CheckName> = snapshot.checks.not_run().into_iter().map(|(n, _)| n).collect();
        assert_eq!(not_run, vec![CheckName::Custom404, CheckName::Ssl, CheckName::PageSpeed]);
        assert!(matches!(
            snapshot.checks.entry(CheckName::Ssl),
            Some(CheckEntry::NotRun { reason }) if reason.contains("boom")
        ));
        assert!(matches!(
            snapshot.checks.entry(CheckName::PageSpeed),
            Some(CheckEntry::NotRun { reason }) if reason.contains("deadline")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_still_returns_snapshot() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let agg = aggregator(ScriptedProbe::new(), AuditOptions::new()).with_checks(vec![Box::new(Fixed)]);
        let snapshot = agg.build(fetched("https://e.test/", PAGE), far(), &cancel).await;

        assert_eq!(snapshot.link_summary.unresolved, snapshot.link_summary.checked);
        assert!(snapshot.checks.meta_refresh().is_none());
        assert_eq!(snapshot.checks.len(), 1);
    }

    #[tokio::test]
    async fn test_deep_mode_without_worker() {
        let options = AuditOptions::new().with_deep_browser_mode(true);
        let agg = aggregator(ScriptedProbe::new(), options);
        let snapshot = agg.build(fetched("https://e.test/", "<html><body>x</body></html>"), far(), &CancellationToken::new()).await;
        assert!(matches!(snapshot.browser, BrowserState::Unavailable { .. }));
    }
}
