// src/checks/robots.rs
// =============================================================================
// Site files: robots.txt and the XML sitemap.
//
// Fetches /robots.txt from the page's origin, collects its Disallow rules
// and Sitemap lines, and notices when the "*" group blocks the whole site.
// If robots.txt names no sitemap, /sitemap.xml is tried directly.
//
// A robots.txt that answers 404 is a normal result (robots_txt_found =
// false). Only a network failure makes this check "not run".
// =============================================================================

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{fetch_text, origin_of, Check, CheckContext, CheckName, CheckReport};
use crate::error::CheckResult;

/// robots.txt bodies beyond this are truncated
const MAX_ROBOTS_BYTES: usize = 512 * 1024;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SiteFiles {
    pub robots_txt_url: String,
    pub robots_txt_found: bool,
    pub robots_status: u16,
    /// Every non-empty Disallow value, in file order
    pub disallow_rules: Vec<String>,
    /// The "*" group contains "Disallow: /"
    pub blocks_all: bool,
    pub sitemaps: Vec<String>,
    pub sitemap_found: bool,
}

pub struct RobotsCheck;

#[async_trait]
impl Check for RobotsCheck {
    fn name(&self) -> CheckName {
        CheckName::RobotsDisallow
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let origin = origin_of(ctx.snapshot)?;
        let robots_url = format!("{}robots.txt", origin);

        let (status, body) = fetch_text(ctx.client, &robots_url, ctx.request_timeout, MAX_ROBOTS_BYTES).await?;
        let found = (200..300).contains(&status);
        let parsed = if found { parse_robots(&body) } else { RobotsTxt::default() };

        let mut sitemap_found = !parsed.sitemaps.is_empty();
        if !sitemap_found {
            let sitemap_url = format!("{}sitemap.xml", origin);
            sitemap_found = match ctx.client.head(&sitemap_url).timeout(ctx.request_timeout).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    debug!(url = %sitemap_url, error = %e, "Sitemap probe failed");
                    false
                }
            };
        }

        Ok(CheckReport::SiteFiles(SiteFiles {
            robots_txt_url: robots_url,
            robots_txt_found: found,
            robots_status: status,
            disallow_rules: parsed.disallow_rules,
            blocks_all: parsed.blocks_all,
            sitemaps: parsed.sitemaps,
            sitemap_found,
        }))
    }
}

/// What we read out of a robots.txt body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsTxt {
    pub disallow_rules: Vec<String>,
    pub blocks_all: bool,
    pub sitemaps: Vec<String>,
}

// Groups are runs of User-agent lines followed by rules. A new User-agent
// line after a rule starts a new group.
pub fn parse_robots(body: &str) -> RobotsTxt {
    let mut parsed = RobotsTxt::default();
    let mut agents: Vec<String> = Vec::new();
    let mut in_rules = false;

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or_default().trim();
        let Some((field, value)) = line.split_once(':') else { continue };
        let field = field.trim().to_ascii_lowercase();
        let value = value.trim();

        match field.as_str() {
            "user-agent" => {
                if in_rules {
                    agents.clear();
                    in_rules = false;
                }
                agents.push(value.to_ascii_lowercase());
            }
            "disallow" => {
                in_rules = true;
                if value.is_empty() {
                    continue;
                }
                parsed.disallow_rules.push(value.to_string());
                if value == "/" && agents.iter().any(|agent| agent == "*") {
                    parsed.blocks_all = true;
                }
            }
            "allow" | "crawl-delay" => in_rules = true,
            "sitemap" => {
                if !value.is_empty() {
                    parsed.sitemaps.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_and_sitemaps() {
        let body = "\
User-agent: *
Disallow: /admin
Disallow:
Allow: /public

Sitemap: https://example.com/sitemap.xml
";
        let parsed = parse_robots(body);
        assert_eq!(parsed.disallow_rules, vec!["/admin"]);
        assert!(!parsed.blocks_all);
        assert_eq!(parsed.sitemaps, vec!["https://example.com/sitemap.xml"]);
    }

    #[test]
    fn test_block_all_for_star_group() {
        let parsed = parse_robots("User-agent: *\nDisallow: / # everything\n");
        assert!(parsed.blocks_all);
    }

    #[test]
    fn test_block_all_for_other_bot_only() {
        let body = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nDisallow: /tmp\n";
        let parsed = parse_robots(body);
        assert!(!parsed.blocks_all);
        assert_eq!(parsed.disallow_rules, vec!["/", "/tmp"]);
    }

    #[test]
    fn test_shared_group() {
        let body = "User-agent: Googlebot\nUser-agent: *\nDisallow: /\n";
        assert!(parse_robots(body).blocks_all);
    }
}
