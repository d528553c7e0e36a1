// src/checks/media_query.rs
// =============================================================================
// Responsive CSS: does the page use @media rules anywhere?
//
// Inline <style> blocks are checked first. Otherwise the stylesheets the
// ConcurrentChecker already resolved (and that answered < 400) are fetched
// one by one, stopping at the first hit.
// =============================================================================

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::debug;

use super::{fetch_text, Check, CheckContext, CheckName, CheckReport};
use crate::checker::ResourceKind;
use crate::error::CheckResult;

const MAX_STYLESHEETS: usize = 5;
const MAX_CSS_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MediaQueries {
    pub found: bool,
    /// "inline" or the stylesheet URL the first rule was found in
    pub source: Option<String>,
    pub stylesheets_checked: usize,
}

pub struct MediaQueryCheck;

#[async_trait]
impl Check for MediaQueryCheck {
    fn name(&self) -> CheckName {
        CheckName::MediaQueries
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        if inline_has_media(&ctx.snapshot.html) {
            return Ok(CheckReport::MediaQueries(MediaQueries {
                found: true,
                source: Some("inline".to_string()),
                stylesheets_checked: 0,
            }));
        }

        let stylesheets = ctx
            .snapshot
            .resources_of(ResourceKind::Stylesheet)
            .filter(|r| !r.result.is_broken())
            .take(MAX_STYLESHEETS);

        let mut checked = 0;
        for sheet in stylesheets {
            let url = &sheet.result.url;
            checked += 1;
            match fetch_text(ctx.client, url, ctx.request_timeout, MAX_CSS_BYTES).await {
                Ok((status, css)) if status < 400 && has_media(&css) => {
                    return Ok(CheckReport::MediaQueries(MediaQueries {
                        found: true,
                        source: Some(url.clone()),
                        stylesheets_checked: checked,
                    }));
                }
                Ok(_) => {}
                Err(e) => debug!(url = %url, error = %e, "Stylesheet fetch failed"),
            }
        }

        Ok(CheckReport::MediaQueries(MediaQueries {
            found: false,
            source: None,
            stylesheets_checked: checked,
        }))
    }
}

pub fn has_media(css: &str) -> bool {
    css.to_ascii_lowercase().contains("@media")
}

pub fn inline_has_media(html: &str) -> bool {
    let document = Html::parse_document(html);
    let selector = Selector::parse("style").unwrap();
    document
        .select(&selector)
        .any(|style| has_media(&style.text().collect::<String>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_media() {
        let html = "<head><style>@MEDIA (max-width: 600px) { body { margin: 0 } }</style></head>";
        assert!(inline_has_media(html));
        assert!(!inline_has_media("<head><style>body { margin: 0 }</style></head>"));
    }
}
