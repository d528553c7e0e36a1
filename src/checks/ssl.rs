// src/checks/ssl.rs
// =============================================================================
// Transport security of the page.
//
// - HTTPS: taken from the final URL
// - HSTS: the Strict-Transport-Security header of the primary response
// - http -> https: requests the plain-http version of the page and checks
//   where the redirects end up
//
// Certificate details (issuer, expiry) are not inspected; the TLS handshake
// of the primary fetch already failed fatally if the certificate was bad.
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::error::{CheckError, CheckResult};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SslInspection {
    pub https: bool,
    pub hsts: Option<String>,
    /// None when the page is not served over https, or the http request failed
    pub http_redirects_to_https: Option<bool>,
}

pub struct SslCheck;

#[async_trait]
impl Check for SslCheck {
    fn name(&self) -> CheckName {
        CheckName::Ssl
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let snapshot = ctx.snapshot;
        let https = snapshot.is_https();
        let hsts = snapshot.header("strict-transport-security").map(str::to_string);

        let http_redirects_to_https = if https {
            let plain = plain_http_url(&snapshot.final_url)?;
            match ctx.client.get(plain.clone()).timeout(ctx.request_timeout).send().await {
                Ok(response) => Some(response.url().scheme() == "https"),
                Err(e) => {
                    debug!(url = %plain, error = %e, "Plain-http request failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(CheckReport::Ssl(SslInspection {
            https,
            hsts,
            http_redirects_to_https,
        }))
    }
}

pub fn plain_http_url(url: &str) -> CheckResult<Url> {
    let mut url = Url::parse(url).map_err(|e| CheckError::Parse(e.to_string()))?;
    url.set_scheme("http")
        .map_err(|_| CheckError::Parse(format!("cannot downgrade {} to http", url)))?;
    // An explicit :443 would now point http at the TLS port
    if url.port() == Some(443) {
        url.set_port(None)
            .map_err(|_| CheckError::Parse(format!("cannot reset port of {}", url)))?;
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_http_url() {
        let url = plain_http_url("https://example.com/a?b=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com/a?b=1");
    }

    #[test]
    fn test_plain_http_url_keeps_custom_port() {
        let url = plain_http_url("https://example.com:8443/").unwrap();
        assert_eq!(url.as_str(), "http://example.com:8443/");
    }
}
