// src/checker/probe.rs
// =============================================================================
// ResourceProbe: one lightweight metadata request against one URL.
//
// Key functionality:
// - Makes an HTTP HEAD request (no body download) with its own timeout
// - Captures the headers the findings need (type, length, caching,
//   compression, CDN and security hints)
// - Never returns an error: every failure mode (timeout, DNS, TLS, refused
//   connection, redirect loop, malformed response) becomes an "unresolved"
//   status carrying a FailureKind tag
//
// The `Probe` trait is the seam the ConcurrentChecker is written against,
// so tests can swap in a scripted probe with fake latencies.
// =============================================================================

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT_ENCODING as ACCEPT_ENCODING_HEADER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as _;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::page::ACCEPT_ENCODING;

/// Response headers kept on every probe result, besides the typed fields.
/// These drive CDN and security-header detection.
const KEPT_HEADERS: &[&str] = &[
    "server",
    "via",
    "age",
    "x-cache",
    "cf-cache-status",
    "cf-ray",
    "x-amz-cf-id",
    "x-served-by",
    "x-fastly-request-id",
    "x-akamai-transformed",
    "strict-transport-security",
    "x-content-type-options",
    "x-frame-options",
    "content-security-policy",
];

/// Headers whose presence marks a response as served through a CDN.
const CDN_HEADERS: &[&str] = &[
    "cf-ray",
    "cf-cache-status",
    "x-amz-cf-id",
    "x-served-by",
    "x-fastly-request-id",
    "x-akamai-transformed",
    "x-cache",
];

/// Why a probe ended without an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request timed out
    Timeout,
    /// Could not resolve the hostname
    Dns,
    /// TLS handshake or certificate failure
    Tls,
    /// Connection refused or reset
    Connect,
    /// Redirect loop or too many hops
    TooManyRedirects,
    /// The server answered with something that isn't HTTP
    Malformed,
    /// The URL itself could not be requested
    InvalidUrl,
    /// Anything else
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Dns => "dns error",
            FailureKind::Tls => "tls error",
            FailureKind::Connect => "connection failed",
            FailureKind::TooManyRedirects => "too many redirects",
            FailureKind::Malformed => "malformed response",
            FailureKind::InvalidUrl => "invalid url",
            FailureKind::Other => "error",
        };
        f.write_str(label)
    }
}

/// Terminal outcome of one probe: an HTTP status or an explicit
/// "unresolved" marker, never both and never neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The server answered (after following redirects)
    Http { code: u16 },
    /// No answer; `reason` says why
    Unresolved { reason: FailureKind },
}

/// Everything one probe learned about one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// The URL that was probed
    pub url: String,
    /// HTTP status or unresolved marker
    #[serde(flatten)]
    pub status: ProbeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Lower-cased subset of response headers (see KEPT_HEADERS)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Human-readable detail ("HTTP 404", "Request timed out")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Wall time spent on this probe, in milliseconds
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ProbeResult {
    /// A result for a URL that answered with `code` and no interesting headers.
    pub fn from_status(url: impl Into<String>, code: u16) -> Self {
        Self {
            url: url.into(),
            status: ProbeStatus::Http { code },
            content_type: None,
            content_length: None,
            cache_control: None,
            content_encoding: None,
            headers: BTreeMap::new(),
            message: Some(format!("HTTP {}", code)),
            elapsed_ms: 0,
        }
    }

    /// A result for a URL that never produced a status.
    pub fn unresolved(url: impl Into<String>, reason: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: ProbeStatus::Unresolved { reason },
            content_type: None,
            content_length: None,
            cache_control: None,
            content_encoding: None,
            headers: BTreeMap::new(),
            message: Some(message.into()),
            elapsed_ms: 0,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.status {
            ProbeStatus::Http { code } => Some(code),
            ProbeStatus::Unresolved { .. } => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self.status, ProbeStatus::Unresolved { .. })
    }

    /// Broken = answered with 4xx/5xx, or never answered at all
    pub fn is_broken(&self) -> bool {
        match self.status {
            ProbeStatus::Http { code } => code >= 400,
            ProbeStatus::Unresolved { .. } => true,
        }
    }

    pub fn has_cache_control(&self) -> bool {
        self.cache_control.is_some()
    }

    /// True when any of the CDN fingerprint headers is present
    pub fn served_by_cdn(&self) -> bool {
        is_cdn_response(&self.headers)
    }
}

/// CDN fingerprint check over lower-cased response headers.
pub fn is_cdn_response(headers: &BTreeMap<String, String>) -> bool {
    CDN_HEADERS.iter().any(|h| headers.contains_key(*h))
        || headers
            .get("server")
            .map(|s| {
                let s = s.to_ascii_lowercase();
                s.contains("cloudflare") || s.contains("cloudfront") || s.contains("akamai")
            })
            .unwrap_or(false)
}

/// Anything that can probe one URL. Implementations must not panic and
/// must not return errors; failures are encoded in the result.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult;
}

/// The real probe: an HTTP HEAD through a shared reqwest client. It asks
/// for compression so `content_encoding` reflects what the server offers.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Wrap an existing client (connection pool shared with the page fetch).
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult {
        let started = Instant::now();
        let result = self
            .client
            .head(url)
            .header(ACCEPT_ENCODING_HEADER, ACCEPT_ENCODING)
            .timeout(timeout)
            .send()
            .await;

        let mut outcome = match result {
            Ok(response) => analyze_response(url, response.status().as_u16(), response.headers()),
            Err(e) => categorize_error(url, &e),
        };
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;

        debug!(url = %url, status = ?outcome.status, elapsed_ms = outcome.elapsed_ms, "Probe finished");
        outcome
    }
}

// Turns a status + header map into a ProbeResult.
//
// Redirects have already been followed by the client, so the code here is
// the final hop's status.
pub(crate) fn analyze_response(url: &str, code: u16, headers: &HeaderMap) -> ProbeResult {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
    };

    let kept = KEPT_HEADERS
        .iter()
        .filter_map(|name| header(name).map(|v| (name.to_string(), v)))
        .collect();

    ProbeResult {
        url: url.to_string(),
        status: ProbeStatus::Http { code },
        content_type: header("content-type"),
        content_length: header("content-length").and_then(|v| v.parse().ok()),
        cache_control: header("cache-control"),
        content_encoding: header("content-encoding"),
        headers: kept,
        message: Some(format!("HTTP {}", code)),
        elapsed_ms: 0,
    }
}

// Classifies a reqwest error into a FailureKind.
//
// reqwest only exposes a few predicates (is_timeout, is_redirect,
// is_connect...), so DNS and TLS failures are recognised from the text of
// the whole source chain.
pub(crate) fn categorize_error(url: &str, error: &reqwest::Error) -> ProbeResult {
    let kind = classify_error(error);
    let message = match kind {
        FailureKind::Timeout => "Request timed out".to_string(),
        FailureKind::TooManyRedirects => "Too many redirects".to_string(),
        FailureKind::Dns => "Could not resolve hostname".to_string(),
        FailureKind::Tls => "TLS/certificate error".to_string(),
        FailureKind::Connect => "Connection failed".to_string(),
        _ => error_chain(error),
    };
    ProbeResult::unresolved(url, kind, message)
}

pub(crate) fn classify_error(error: &reqwest::Error) -> FailureKind {
    let chain = error_chain(error).to_ascii_lowercase();

    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_redirect() {
        FailureKind::TooManyRedirects
    } else if error.is_builder() {
        FailureKind::InvalidUrl
    } else if chain.contains("dns") || chain.contains("failed to lookup") {
        FailureKind::Dns
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        FailureKind::Tls
    } else if error.is_connect() {
        FailureKind::Connect
    } else if error.is_body() || error.is_decode() || chain.contains("invalid http") {
        FailureKind::Malformed
    } else {
        FailureKind::Other
    }
}

// Joins an error and all of its sources into one string
fn error_chain(error: &reqwest::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
