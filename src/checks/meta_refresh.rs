// src/checks/meta_refresh.rs
// Finds <meta http-equiv="refresh"> tags in the primary HTML.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Serialize;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::error::CheckResult;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetaRefresh {
    pub found: bool,
    /// content attribute of every refresh tag
    pub contents: Vec<String>,
}

pub struct MetaRefreshCheck;

#[async_trait]
impl Check for MetaRefreshCheck {
    fn name(&self) -> CheckName {
        CheckName::MetaRefresh
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        Ok(CheckReport::MetaRefresh(evaluate(&ctx.snapshot.html)))
    }
}

pub fn evaluate(html: &str) -> MetaRefresh {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[http-equiv]").unwrap();

    let contents: Vec<String> = document
        .select(&selector)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .map(|v| v.trim().eq_ignore_ascii_case("refresh"))
                .unwrap_or(false)
        })
        .map(|el| el.value().attr("content").unwrap_or_default().trim().to_string())
        .collect();

    MetaRefresh {
        found: !contents.is_empty(),
        contents,
    }
}
