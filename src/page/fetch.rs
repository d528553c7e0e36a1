// src/page/fetch.rs
// =============================================================================
// The primary page fetch.
//
// This is the one request that is allowed to fail the whole audit: if the
// page can't be fetched, or isn't an HTML page, there is nothing to score.
//
// `PageFetcher` is the seam the audit runs against, so tests can feed the
// pipeline canned pages without a network.
// =============================================================================

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT_ENCODING as ACCEPT_ENCODING_HEADER};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

use super::encoding::{decode_body, ACCEPT_ENCODING};
use crate::checker::{classify_error, FailureKind};
use crate::error::{AuditError, Result};

/// What the primary request returned.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    /// URL after redirects
    pub final_url: Url,
    pub status: u16,
    /// Response headers, lower-case keys, repeated values joined by ", "
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Decoded body size in bytes
    pub size_bytes: usize,
    /// Body size as sent over the wire
    pub transfer_bytes: usize,
    /// Time until the response headers arrived
    pub ttfb: Duration,
    pub http_version: String,
}

impl FetchedPage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// charset parameter of the Content-Type header, lower-cased
    pub fn header_charset(&self) -> Option<String> {
        let content_type = self.header("content-type")?;
        content_type.split(';').find_map(|part| {
            let (key, value) = part.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches('"').to_ascii_lowercase())
            } else {
                None
            }
        })
    }
}

/// Fetches the page being audited.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage>;
}

/// reqwest-backed fetcher. Follows up to 5 redirects, asks for a
/// compressed body and decodes it itself so Content-Encoding is kept.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage> {
        debug!(url = %url, "Fetching page");
        let started = Instant::now();

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT_ENCODING_HEADER, ACCEPT_ENCODING)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AuditError::Fetch {
                url: url.to_string(),
                kind: classify_error(&e),
                message: e.to_string(),
            })?;
        let ttfb = started.elapsed();

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let http_version = format!("{:?}", response.version());
        let headers = normalize_headers(response.headers());

        let bytes = response.bytes().await.map_err(|e| AuditError::Fetch {
            url: url.to_string(),
            kind: classify_error(&e),
            message: e.to_string(),
        })?;
        let decoded = decode_body(headers.get("content-encoding").map(String::as_str), &bytes)
            .map_err(|e| AuditError::Fetch {
                url: url.to_string(),
                kind: FailureKind::Malformed,
                message: format!("could not decode body: {}", e),
            })?;
        let body = String::from_utf8_lossy(&decoded).into_owned();

        let page = FetchedPage {
            requested_url: url.to_string(),
            final_url,
            status,
            headers,
            size_bytes: decoded.len(),
            transfer_bytes: bytes.len(),
            body,
            ttfb,
            http_version,
        };
        check_page(&page)?;

        info!(
            url = %page.final_url,
            status = page.status,
            bytes = page.size_bytes,
            transfer_bytes = page.transfer_bytes,
            encoding = page.header("content-encoding").unwrap_or("identity"),
            ttfb_ms = page.ttfb.as_millis() as u64,
            "Page fetched"
        );
        Ok(page)
    }
}

/// Decides whether a fetched response is something we can audit.
///
/// - any non-2xx status is fatal
/// - a Content-Type that is present and not HTML is fatal
/// - an empty (or whitespace-only) body is fatal
pub fn check_page(page: &FetchedPage) -> Result<()> {
    if !(200..300).contains(&page.status) {
        return Err(AuditError::HttpStatus {
            url: page.requested_url.clone(),
            status: page.status,
        });
    }

    if let Some(content_type) = page.header("content-type") {
        let lowered = content_type.to_ascii_lowercase();
        if !lowered.contains("html") {
            return Err(AuditError::NotHtml {
                url: page.requested_url.clone(),
                content_type: content_type.to_string(),
            });
        }
    }

    if page.body.trim().is_empty() {
        return Err(AuditError::EmptyBody {
            url: page.requested_url.clone(),
        });
    }

    Ok(())
}

fn normalize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut normalized: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        normalized
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    normalized
}
