// src/checks/error_page.rs
// =============================================================================
// Custom 404 detection.
//
// Requests a path on the same origin that cannot exist and looks at the
// answer:
// - 404 with a friendly page ("page not found", "sorry"...): custom 404
// - 404 with a bare page: no custom 404
// - 2xx: soft 404 (the server claims the missing page exists)
// - 403: the host blocks us; nothing can be concluded
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;

use super::{fetch_text, origin_of, Check, CheckContext, CheckName, CheckReport};
use crate::error::CheckResult;

const MISSING_PATH: &str = "this-page-should-definitely-not-exist-404-test";

/// Only the start of the error page is inspected
const SNIPPET_BYTES: usize = 2048;

const FRIENDLY_PHRASES: &[&str] = &[
    "page not found",
    "404 error",
    "not found",
    "sorry",
    "doesn't exist",
    "does not exist",
    "cannot be found",
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Custom404 {
    pub test_url: String,
    pub status: u16,
    pub custom_page: bool,
    pub soft_404: bool,
    /// The host refused the request (403)
    pub blocked: bool,
}

pub struct ErrorPageCheck;

#[async_trait]
impl Check for ErrorPageCheck {
    fn name(&self) -> CheckName {
        CheckName::Custom404
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let test_url = format!("{}{}", origin_of(ctx.snapshot)?, MISSING_PATH);
        let (status, body) = fetch_text(ctx.client, &test_url, ctx.request_timeout, SNIPPET_BYTES).await?;
        Ok(CheckReport::Custom404(evaluate(test_url, status, &body)))
    }
}

pub fn evaluate(test_url: String, status: u16, body: &str) -> Custom404 {
    let snippet = body.to_lowercase();
    let friendly = FRIENDLY_PHRASES.iter().any(|phrase| snippet.contains(phrase));

    Custom404 {
        test_url,
        status,
        custom_page: status == 404 && friendly,
        soft_404: (200..300).contains(&status),
        blocked: status == 403,
    }
}
