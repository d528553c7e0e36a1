// src/checks/mixed_content.rs
// Lists http:// resources embedded in an https page. Reads the HTML itself,
// so resources past the probe cap are still seen.

use async_trait::async_trait;
use scraper::Html;
use serde::Serialize;
use url::Url;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::checker::extract_resources;
use crate::error::{CheckError, CheckResult};

const MAX_LISTED: usize = 20;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MixedContent {
    /// false for http pages, where mixed content doesn't apply
    pub applicable: bool,
    pub insecure_count: usize,
    pub insecure: Vec<String>,
}

pub struct MixedContentCheck;

#[async_trait]
impl Check for MixedContentCheck {
    fn name(&self) -> CheckName {
        CheckName::MixedContent
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let base = Url::parse(&ctx.snapshot.final_url).map_err(|e| CheckError::Parse(e.to_string()))?;
        let urls = embedded_urls(&ctx.snapshot.html, &base);
        Ok(CheckReport::MixedContent(evaluate(ctx.snapshot.is_https(), &urls)))
    }
}

/// Every img/script/stylesheet URL in the document, uncapped.
pub fn embedded_urls(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    extract_resources(&document, base)
        .into_iter()
        .map(|(url, _)| url)
        .collect()
}

pub fn evaluate(page_is_https: bool, urls: &[String]) -> MixedContent {
    if !page_is_https {
        return MixedContent {
            applicable: false,
            insecure_count: 0,
            insecure: Vec::new(),
        };
    }

    let insecure: Vec<&String> = urls.iter().filter(|url| url.starts_with("http://")).collect();

    MixedContent {
        applicable: true,
        insecure_count: insecure.len(),
        insecure: insecure.into_iter().take(MAX_LISTED).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::checker::ScriptedProbe;
    use crate::config::AuditOptions;
    use crate::snapshot::fixtures::fetched;
    use crate::snapshot::SnapshotAggregator;
    use reqwest::Client;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_insecure_resources_on_https() {
        let result = evaluate(true, &urls(&["https://e.test/a.png", "http://cdn.test/b.png"]));
        assert_eq!(result.insecure, vec!["http://cdn.test/b.png"]);
        assert_eq!(result.insecure_count, 1);
    }

    #[test]
    fn test_http_page_not_applicable() {
        let result = evaluate(false, &urls(&["http://e.test/a.png"]));
        assert!(!result.applicable);
        assert_eq!(result.insecure_count, 0);
    }

    #[test]
    fn test_embedded_urls_are_resolved() {
        let html = r#"<img src="/a.png"><script src="http://cdn.test/x.js"></script>
            <link rel="stylesheet" href="//cdn.test/s.css">"#;
        let base = Url::parse("https://e.test/page").unwrap();
        assert_eq!(
            embedded_urls(html, &base),
            vec!["https://e.test/a.png", "http://cdn.test/x.js", "https://cdn.test/s.css"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resources_past_the_probe_cap_are_scanned() {
        let html = r#"<html><head><title>T</title>
            <script src="https://e.test/app.js"></script></head><body>
            <img src="http://cdn.test/1.png"><img src="http://cdn.test/2.png">
            <img src="http://cdn.test/3.png"></body></html>"#;
        let options = AuditOptions::new().with_resource_check_cap(1);
        let agg = SnapshotAggregator::new(
            Arc::new(ScriptedProbe::new()),
            Client::new(),
            options,
            Capabilities::none(),
        )
        .with_checks(vec![Box::new(MixedContentCheck)]);

        let snapshot = agg
            .build(
                fetched("https://e.test/", html),
                Instant::now() + Duration::from_secs(3600),
                &CancellationToken::new(),
            )
            .await;

        // Only the first resource was probed, and it's on https
        assert_eq!(snapshot.resources.len(), 1);
        let mixed = snapshot.checks.mixed_content().unwrap();
        assert_eq!(mixed.insecure_count, 3);
        assert_eq!(mixed.insecure[2], "http://cdn.test/3.png");
    }
}
