// src/checks/browser.rs
// =============================================================================
// Headless-browser work, delegated to an external worker process.
//
// The worker is any command (a Playwright or Puppeteer script, usually)
// that accepts:
//
//   <cmd> metrics <url> <timeout-secs>
//   <cmd> mobile-snapshot <url> <timeout-secs> <output-path>
//
// and prints one JSON object as its last stdout line:
//
//   metrics:          {"metrics": {"fcp": ms, "lcp": ms, "cls": n, "ttfb_ms": ms},
//                      "console_errors": [{"text": "..."}], "error": null}
//   mobile-snapshot:  {"screenshot_path": "...", "error": null}
//
// A non-null "error" or a non-zero exit status is a failure. The process is
// killed if the timeout elapses or the audit drops the future.
// =============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::capability::Capability;
use crate::error::{CheckError, CheckResult};
use crate::snapshot::BrowserMetrics;

const SNAPSHOT_DIR: &str = "snapshots";

/// Handle to the configured browser worker command.
#[derive(Debug, Clone)]
pub struct BrowserWorker {
    program: String,
    args: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MetricsOutput {
    #[serde(default)]
    metrics: RawMetrics,
    #[serde(default)]
    response: RawResponse,
    #[serde(default)]
    console_errors: Vec<ConsoleMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetrics {
    fcp: Option<f64>,
    lcp: Option<f64>,
    cls: Option<f64>,
    ttfb_ms: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResponse {
    ttfb_ms: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConsoleMessage {
    text: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotOutput {
    screenshot_path: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl BrowserWorker {
    /// `command` is split on whitespace: "node worker.js" runs node.
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Core Web Vitals and console errors for `url`.
    pub async fn collect_metrics(&self, url: &str, timeout: Duration) -> CheckResult<BrowserMetrics> {
        let stdout = self
            .invoke(&["metrics", url, &timeout.as_secs().max(1).to_string()], timeout)
            .await?;
        let metrics = parse_metrics(&stdout)?;
        info!(url, lcp_ms = ?metrics.lcp_ms, cls = ?metrics.cls, "Browser metrics collected");
        Ok(metrics)
    }

    /// Renders `url` in a phone-sized viewport and saves a screenshot.
    pub async fn mobile_snapshot(&self, url: &str, path: &str, timeout: Duration) -> CheckResult<String> {
        let stdout = self
            .invoke(
                &["mobile-snapshot", url, &timeout.as_secs().max(1).to_string(), path],
                timeout,
            )
            .await?;
        parse_snapshot(&stdout)
    }

    async fn invoke(&self, args: &[&str], timeout: Duration) -> CheckResult<String> {
        if self.program.is_empty() {
            return Err(CheckError::Unavailable("empty browser worker command".to_string()));
        }
        debug!(program = %self.program, ?args, "Starting browser worker");

        let child = Command::new(&self.program)
            .args(&self.args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| CheckError::Deadline)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // Workers report their own failures as JSON on stdout
            let detail = last_line(&stdout)
                .and_then(|line| serde_json::from_str::<serde_json::Value>(line).ok())
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| stderr.trim().to_string());
            return Err(CheckError::Http(format!(
                "browser worker exited with {}: {}",
                output.status, detail
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn last_line(stdout: &str) -> Option<&str> {
    stdout.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

pub(crate) fn parse_metrics(stdout: &str) -> CheckResult<BrowserMetrics> {
    let line = last_line(stdout).ok_or_else(|| CheckError::Parse("browser worker printed nothing".to_string()))?;
    let output: MetricsOutput = serde_json::from_str(line)?;
    if let Some(error) = output.error {
        return Err(CheckError::Http(error));
    }
    Ok(BrowserMetrics {
        fcp_ms: output.metrics.fcp,
        lcp_ms: output.metrics.lcp,
        cls: output.metrics.cls,
        ttfb_ms: output.metrics.ttfb_ms.or(output.response.ttfb_ms),
        console_errors: output.console_errors.into_iter().map(|m| m.text).collect(),
    })
}

pub(crate) fn parse_snapshot(stdout: &str) -> CheckResult<String> {
    let line = last_line(stdout).ok_or_else(|| CheckError::Parse("browser worker printed nothing".to_string()))?;
    let output: SnapshotOutput = serde_json::from_str(line)?;
    match (output.error, output.screenshot_path) {
        (Some(error), _) => Err(CheckError::Http(error)),
        (None, Some(path)) => Ok(path),
        (None, None) => Err(CheckError::Parse("no screenshot_path in worker output".to_string())),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MobileSnapshot {
    pub screenshot_path: String,
}

/// Mobile screenshot through the browser worker. Only runs in deep mode.
pub struct MobileSnapshotCheck {
    worker: Capability<BrowserWorker>,
}

impl MobileSnapshotCheck {
    pub fn new(worker: Capability<BrowserWorker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Check for MobileSnapshotCheck {
    fn name(&self) -> CheckName {
        CheckName::MobileSnapshot
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        if !ctx.options.deep_browser_mode {
            return Err(CheckError::Skipped("deep browser mode is off".to_string()));
        }
        let worker = self
            .worker
            .get()
            .map_err(|reason| CheckError::Unavailable(reason.to_string()))?;

        let path = snapshot_path(&ctx.snapshot.host);
        let screenshot_path = worker
            .mobile_snapshot(&ctx.snapshot.final_url, &path, ctx.remaining)
            .await?;
        Ok(CheckReport::MobileSnapshot(MobileSnapshot { screenshot_path }))
    }
}

fn snapshot_path(host: &str) -> String {
    let safe: String = host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}/{}_mobile_snapshot.png", SNAPSHOT_DIR, safe)
}
