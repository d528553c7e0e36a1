// src/checks/minification.rs
// =============================================================================
// Minification of scripts and stylesheets.
//
// Downloads up to five of each (only those the ConcurrentChecker saw answer
// < 400) and calls a file minified when more than 95% of its characters are
// not whitespace. Files that fail to download are not counted.
// =============================================================================

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use super::{fetch_text, Check, CheckContext, CheckName, CheckReport};
use crate::checker::ResourceKind;
use crate::error::CheckResult;

const MAX_PER_KIND: usize = 5;
const MAX_ASSET_BYTES: usize = 4 * 1024 * 1024;
const MINIFIED_RATIO: f64 = 0.95;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct AssetTally {
    pub checked: usize,
    pub minified: usize,
    pub unminified: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Minification {
    pub scripts: AssetTally,
    pub stylesheets: AssetTally,
}

impl Minification {
    /// Every unminified asset, scripts first
    pub fn unminified(&self) -> impl Iterator<Item = &String> {
        self.scripts.unminified.iter().chain(self.stylesheets.unminified.iter())
    }
}

pub struct MinificationCheck;

#[async_trait]
impl Check for MinificationCheck {
    fn name(&self) -> CheckName {
        CheckName::Minification
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let scripts = tally(ctx, ResourceKind::Script).await;
        let stylesheets = tally(ctx, ResourceKind::Stylesheet).await;
        Ok(CheckReport::Minification(Minification { scripts, stylesheets }))
    }
}

async fn tally(ctx: &CheckContext<'_>, kind: ResourceKind) -> AssetTally {
    let urls: Vec<&str> = ctx
        .snapshot
        .resources_of(kind)
        .filter(|r| !r.result.is_broken())
        .map(|r| r.result.url.as_str())
        .take(MAX_PER_KIND)
        .collect();

    let bodies = join_all(
        urls.iter()
            .map(|url| fetch_text(ctx.client, url, ctx.request_timeout, MAX_ASSET_BYTES)),
    )
    .await;

    let mut tally = AssetTally::default();
    for (url, body) in urls.into_iter().zip(bodies) {
        match body {
            Ok((status, content)) if status < 400 => {
                tally.checked += 1;
                if is_minified(&content) {
                    tally.minified += 1;
                } else {
                    tally.unminified.push(url.to_string());
                }
            }
            Ok((status, _)) => debug!(url, status, "Asset not downloadable"),
            Err(e) => debug!(url, error = %e, "Asset fetch failed"),
        }
    }
    tally
}

pub fn is_minified(content: &str) -> bool {
    let total = content.chars().count();
    if total == 0 {
        return false;
    }
    let solid = content.chars().filter(|c| !c.is_whitespace()).count();
    solid as f64 / total as f64 > MINIFIED_RATIO
}
