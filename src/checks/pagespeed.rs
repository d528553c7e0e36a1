// src/checks/pagespeed.rs
// =============================================================================
// Google PageSpeed Insights (Lighthouse performance run).
//
// Needs an API key (optional capability). The API is slow, so the call gets
// its own generous timeout, still bounded by the audit deadline.
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::info;
use url::Url;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::capability::Capability;
use crate::error::{CheckError, CheckResult};

const ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the PageSpeed Insights v5 API.
#[derive(Clone)]
pub struct PageSpeedClient {
    api_key: String,
    endpoint: String,
}

// Keeps the key out of logs
impl std::fmt::Debug for PageSpeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSpeedClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl PageSpeedClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            endpoint: ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    fn request_url(&self, page_url: &str) -> CheckResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| CheckError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("url", page_url)
            .append_pair("key", &self.api_key)
            .append_pair("category", "PERFORMANCE");
        Ok(url)
    }

    pub async fn run(&self, client: &reqwest::Client, page_url: &str, timeout: Duration) -> CheckResult<PageSpeed> {
        let response = client
            .get(self.request_url(page_url)?)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        parse_response(&body)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageSpeed {
    /// Lighthouse performance score, 0..=100
    pub performance_score: u8,
    pub lcp: Option<String>,
    pub cls: Option<String>,
    pub fcp: Option<String>,
    pub speed_index: Option<String>,
    pub lcp_ms: Option<f64>,
}

pub fn parse_response(body: &Value) -> CheckResult<PageSpeed> {
    let lighthouse = body
        .get("lighthouseResult")
        .ok_or_else(|| CheckError::Parse("response has no lighthouseResult".to_string()))?;
    let score = lighthouse
        .pointer("/categories/performance/score")
        .and_then(Value::as_f64)
        .ok_or_else(|| CheckError::Parse("response has no performance score".to_string()))?;

    let audits = lighthouse.get("audits");
    let display = |audit: &str| {
        audits
            .and_then(|a| a.get(audit))
            .and_then(|a| a.get("displayValue"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Ok(PageSpeed {
        performance_score: (score * 100.0).round().clamp(0.0, 100.0) as u8,
        lcp: display("largest-contentful-paint"),
        cls: display("cumulative-layout-shift"),
        fcp: display("first-contentful-paint"),
        speed_index: display("speed-index"),
        lcp_ms: audits
            .and_then(|a| a.pointer("/largest-contentful-paint/numericValue"))
            .and_then(Value::as_f64),
    })
}

pub struct PageSpeedCheck {
    client: Capability<PageSpeedClient>,
}

impl PageSpeedCheck {
    pub fn new(client: Capability<PageSpeedClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Check for PageSpeedCheck {
    fn name(&self) -> CheckName {
        CheckName::PageSpeed
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let api = self
            .client
            .get()
            .map_err(|reason| CheckError::Unavailable(reason.to_string()))?;
        let result = api
            .run(ctx.client, &ctx.snapshot.final_url, API_TIMEOUT.min(ctx.remaining))
            .await?;
        info!(score = result.performance_score, "PageSpeed Insights done");
        Ok(CheckReport::PageSpeed(result))
    }
}
