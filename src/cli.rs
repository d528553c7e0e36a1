// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
//   seo-audit audit <url> [--keyword K] [--deep] [--json] [--fail-under N] ...
//   seo-audit rules [--json]
//
// Optional machinery (dictionary, browser worker, PageSpeed key) can come
// from flags or from the environment, so CI can set them once.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use seo_audit::capability::CapabilityConfig;
use seo_audit::config::{AuditOptions, DEFAULT_USER_AGENT};

#[derive(Parser, Debug)]
#[command(
    name = "seo-audit",
    version,
    about = "Audit a web page's on-page and technical SEO",
    long_about = "seo-audit fetches one page, checks its links and resources, runs a set of \
                  SEO checks and prints a weighted score with a prioritized list of fixes."
)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Audit a single page
    ///
    /// Example: seo-audit audit https://example.com --keyword "rust cli"
    Audit(AuditArgs),

    /// List the rules the audit scores against
    Rules {
        /// Output the rule table as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Page to audit (a bare host is audited over https)
    pub url: String,

    /// Keyword the page should rank for
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Collect Core Web Vitals and a mobile snapshot through the browser worker
    #[arg(long)]
    pub deep: bool,

    /// Output the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Exit with code 1 when the overall score is below this value
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub fail_under: Option<u8>,

    /// Maximum number of outbound links to check
    #[arg(long, default_value_t = 20)]
    pub link_cap: usize,

    /// Maximum number of embedded resources to check
    #[arg(long, default_value_t = 100)]
    pub resource_cap: usize,

    /// Concurrent link probes
    #[arg(long, default_value_t = 10)]
    pub link_concurrency: usize,

    /// Concurrent resource probes
    #[arg(long, default_value_t = 40)]
    pub resource_concurrency: usize,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 8)]
    pub timeout: u64,

    /// Deadline for the whole audit, in seconds
    #[arg(long, default_value_t = 60)]
    pub deadline: u64,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Word list (one word per line) for the spell check
    #[arg(long, env = "SEO_AUDIT_DICTIONARY")]
    pub dictionary: Option<PathBuf>,

    /// Command that runs the headless browser worker
    #[arg(long, env = "SEO_AUDIT_BROWSER_WORKER")]
    pub browser_worker: Option<String>,

    /// PageSpeed Insights API key
    #[arg(long, env = "PAGESPEED_API_KEY", hide_env_values = true)]
    pub pagespeed_key: Option<String>,
}

impl AuditArgs {
    pub fn options(&self) -> AuditOptions {
        let mut options = AuditOptions::new()
            .with_deep_browser_mode(self.deep)
            .with_link_check_cap(self.link_cap)
            .with_resource_check_cap(self.resource_cap)
            .with_link_concurrency(self.link_concurrency)
            .with_resource_concurrency(self.resource_concurrency)
            .with_request_timeout(Duration::from_secs(self.timeout))
            .with_overall_deadline(Duration::from_secs(self.deadline))
            .with_user_agent(self.user_agent.as_str());
        if let Some(keyword) = &self.keyword {
            options = options.with_keyword(keyword.as_str());
        }
        options
    }

    pub fn capability_config(&self) -> CapabilityConfig {
        CapabilityConfig {
            dictionary_path: self.dictionary.clone(),
            browser_worker: self.browser_worker.clone(),
            pagespeed_api_key: self.pagespeed_key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_defaults_match_options() {
        let cli = Cli::try_parse_from(["seo-audit", "audit", "https://e.test"]).unwrap();
        let Commands::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        let options = args.options();
        let defaults = AuditOptions::default();
        assert_eq!(options.link_check_cap, defaults.link_check_cap);
        assert_eq!(options.resource_concurrency, defaults.resource_concurrency);
        assert_eq!(options.request_timeout, defaults.request_timeout);
        assert_eq!(options.overall_deadline, defaults.overall_deadline);
        assert!(options.target_keyword.is_none());
    }

    #[test]
    fn test_fail_under_is_bounded() {
        assert!(Cli::try_parse_from(["seo-audit", "audit", "e.test", "--fail-under", "101"]).is_err());
        let cli = Cli::try_parse_from(["seo-audit", "audit", "e.test", "--fail-under", "80", "-k", "rust"])
            .unwrap();
        let Commands::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert_eq!(args.fail_under, Some(80));
        assert_eq!(args.options().target_keyword.as_deref(), Some("rust"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
