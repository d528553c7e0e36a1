// tests/audit_pipeline.rs
// =============================================================================
// End-to-end runs of the audit pipeline with a canned page and a scripted
// probe; nothing here touches the network.
// =============================================================================

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use seo_audit::capability::Capabilities;
use seo_audit::checker::{Probe, ProbeResult};
use seo_audit::checks::{Check, CheckContext, CheckName, CheckReport, MetaRefresh};
use seo_audit::error::CheckResult;
use seo_audit::findings::FindingKey;
use seo_audit::page::{FetchedPage, PageFetcher};
use seo_audit::scoring::{Category, FeatureStatus};
use seo_audit::{AuditError, AuditOptions, Auditor};

// -----------------------------------------------------------------------------
// Fakes
// -----------------------------------------------------------------------------

struct CannedPage {
    html: String,
    fail_with_status: Option<u16>,
    latency: Duration,
}

impl CannedPage {
    fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            fail_with_status: None,
            latency: Duration::ZERO,
        }
    }
}

#[async_trait]
impl PageFetcher for CannedPage {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedPage, AuditError> {
        tokio::time::sleep(self.latency).await;
        if let Some(status) = self.fail_with_status {
            return Err(AuditError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html; charset=utf-8".to_string());
        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url: url.clone(),
            status: 200,
            headers,
            size_bytes: self.html.len(),
            transfer_bytes: self.html.len(),
            body: self.html.clone(),
            ttfb: Duration::from_millis(120),
            http_version: "HTTP/2.0".to_string(),
        })
    }
}

/// Answers 200 after a fixed latency and counts calls per URL.
struct CountingProbe {
    latency: Duration,
    calls: Mutex<HashMap<String, usize>>,
}

impl CountingProbe {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Probe for CountingProbe {
    async fn probe(&self, url: &str, _timeout: Duration) -> ProbeResult {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        tokio::time::sleep(self.latency).await;
        ProbeResult::from_status(url, 200)
    }
}

struct NoRefresh;

#[async_trait]
impl Check for NoRefresh {
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

fn auditor(page: CannedPage, probe: Arc<CountingProbe>, options: AuditOptions) -> Auditor {
    Auditor::new(options, Capabilities::none())
        .unwrap()
        .with_fetcher(Arc::new(page))
        .with_probe(probe)
        .with_checks(Vec::new())
}

fn words(n: usize) -> String {
    (0..n).map(|i| format!("word{}", i % 37)).collect::<Vec<_>>().join(" ")
}

// Everything the Content rules look at is fine except title and description
fn content_page_without_title_and_description() -> String {
    format!(
        r#"<html lang="en"><head><meta charset="utf-8"></head>
        <body><h1>Guide</h1><h2>Part</h2><p>{}</p></body></html>"#,
        words(320)
    )
}

// -----------------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_title_and_description_scores_68_content() {
    let probe = Arc::new(CountingProbe::new(Duration::ZERO));
    let report = auditor(
        CannedPage::new(content_page_without_title_and_description()),
        probe,
        AuditOptions::new(),
    )
    .run("https://site.test/guide")
    .await
    .unwrap();

    assert_eq!(report.category_score(Category::Content), Some(68));
    assert!(report.findings.contains(FindingKey::TitleMissing));
    assert!(report.findings.contains(FindingKey::MetaDescriptionMissing));
    assert!(!report.findings.contains(FindingKey::ContentThin));
    assert_eq!(report.suggestions[0].key, FindingKey::TitleMissing);
    assert!(report.overall_score <= 100);
}

#[tokio::test]
async fn test_duplicate_links_are_probed_once() {
    let html = r#"<html><head><title>Links</title></head><body>
        <a href="/docs">a</a><a href="/docs">b</a><a href="/docs#intro">c</a>
        <a href="https://other.test/">d</a></body></html>"#;
    let probe = Arc::new(CountingProbe::new(Duration::from_millis(5)));
    let report = auditor(CannedPage::new(html), probe.clone(), AuditOptions::new())
        .run("https://site.test/")
        .await
        .unwrap();

    assert_eq!(probe.calls("https://site.test/docs"), 1);
    assert_eq!(probe.calls("https://other.test/"), 1);
    assert_eq!(report.snapshot.link_summary.checked, 2);
    assert_eq!(report.snapshot.link_summary.internal, 1);
    assert_eq!(report.snapshot.link_summary.external, 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_probes_still_produces_a_report() {
    let links: String = (0..50)
        .map(|i| format!(r#"<a href="/p{}">p</a>"#, i))
        .collect();
    let html = format!("<html><head><title>Many</title></head><body>{}</body></html>", links);
    let probe = Arc::new(CountingProbe::new(Duration::from_secs(1)));
    let options = AuditOptions::new()
        .with_link_check_cap(50)
        .with_link_concurrency(10)
        .with_request_timeout(Duration::from_secs(5))
        .with_overall_deadline(Duration::from_millis(2500));

    let report = auditor(CannedPage::new(html), probe, options)
        .run("https://site.test/")
        .await
        .unwrap();

    let summary = &report.snapshot.link_summary;
    assert_eq!(summary.checked, 50);
    assert!(summary.unresolved > 0);
    assert_eq!(report.completeness.links_unresolved, summary.unresolved);
    assert!(!report.completeness.is_complete());
    // Input order is kept even for the unresolved tail
    assert_eq!(report.snapshot.links[49].result.url, "https://site.test/p49");
}

#[tokio::test]
async fn test_fatal_fetch_produces_no_report() {
    let mut page = CannedPage::new("");
    page.fail_with_status = Some(503);
    let probe = Arc::new(CountingProbe::new(Duration::ZERO));

    let result = auditor(page, probe.clone(), AuditOptions::new())
        .run("https://site.test/")
        .await;

    assert!(matches!(result, Err(AuditError::HttpStatus { status: 503, .. })));
    assert_eq!(probe.calls("https://site.test/"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_page_slower_than_deadline_is_fatal() {
    let mut page = CannedPage::new("<html><body>late</body></html>");
    page.latency = Duration::from_secs(30);
    let options = AuditOptions::new().with_overall_deadline(Duration::from_secs(2));

    let result = auditor(page, Arc::new(CountingProbe::new(Duration::ZERO)), options)
        .run("https://site.test/")
        .await;

    assert!(matches!(result, Err(AuditError::DeadlineExceeded { .. })));
}

#[tokio::test]
async fn test_cancelled_before_fetch_is_fatal() {
    let auditor = auditor(
        CannedPage::new("<html><body>x</body></html>"),
        Arc::new(CountingProbe::new(Duration::ZERO)),
        AuditOptions::new(),
    );
    auditor.cancellation_token().cancel();

    let result = auditor.run("https://site.test/").await;
    assert!(matches!(result, Err(AuditError::Cancelled { .. })));
}

#[tokio::test]
async fn test_custom_checks_feed_the_breakdown() {
    let probe = Arc::new(CountingProbe::new(Duration::ZERO));
    let report = auditor(
        CannedPage::new(content_page_without_title_and_description()),
        probe,
        AuditOptions::new(),
    )
    .with_checks(vec![Box::new(NoRefresh)])
    .run("https://site.test/")
    .await
    .unwrap();

    let meta_refresh = report
        .breakdown
        .iter()
        .find(|row| row.feature == "meta_refresh")
        .unwrap();
    assert_eq!(meta_refresh.status, FeatureStatus::Pass);

    let robots = report.breakdown.iter().find(|row| row.feature == "robots_txt").unwrap();
    assert_eq!(robots.status, FeatureStatus::NotChecked);
}

#[tokio::test]
async fn test_report_json_shape() {
    let probe = Arc::new(CountingProbe::new(Duration::ZERO));
    let report = auditor(
        CannedPage::new(content_page_without_title_and_description()),
        probe,
        AuditOptions::new().with_keyword("guide"),
    )
    .run("https://site.test/")
    .await
    .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["overall_score"].is_u64());
    assert_eq!(json["categories"][0]["category"], "content");
    assert_eq!(json["snapshot"]["target_keyword"], "guide");
    assert!(json["suggestions"][0]["remediation"].is_string());
    assert!(json["breakdown"].as_array().unwrap().len() > 40);
}
