// src/config.rs
// =============================================================================
// Options for a single audit run.
//
// The CLI (src/cli.rs) builds an AuditOptions from flags and environment
// variables; library callers can use the builder methods directly:
//
//   let options = AuditOptions::new()
//       .with_keyword("rust")
//       .with_link_check_cap(30)
//       .with_overall_deadline(Duration::from_secs(45));
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AuditError, Result};

pub const DEFAULT_USER_AGENT: &str = concat!("seo-audit/", env!("CARGO_PKG_VERSION"));

/// Everything that shapes one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOptions {
    /// Optional keyword the page is expected to target
    pub target_keyword: Option<String>,

    /// Run the external browser worker for Core Web Vitals and console errors
    pub deep_browser_mode: bool,

    /// Maximum number of outbound links probed
    pub link_check_cap: usize,

    /// Maximum number of embedded resources (img/script/css) probed
    pub resource_check_cap: usize,

    /// Probes in flight at once for the link batch
    pub link_concurrency: usize,

    /// Probes in flight at once for the resource batch
    pub resource_concurrency: usize,

    /// Timeout for each individual request
    pub request_timeout: Duration,

    /// Deadline for the whole audit, page fetch included
    pub overall_deadline: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            target_keyword: None,
            deep_browser_mode: false,
            link_check_cap: 20,
            resource_check_cap: 100,
            link_concurrency: 10,
            resource_concurrency: 40,
            request_timeout: Duration::from_secs(8),
            overall_deadline: Duration::from_secs(60),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AuditOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        // A blank keyword is the same as no keyword
        self.target_keyword = if keyword.trim().is_empty() {
            None
        } else {
            Some(keyword.trim().to_string())
        };
        self
    }

    pub fn with_deep_browser_mode(mut self, enabled: bool) -> Self {
        self.deep_browser_mode = enabled;
        self
    }

    pub fn with_link_check_cap(mut self, cap: usize) -> Self {
        self.link_check_cap = cap;
        self
    }

    pub fn with_resource_check_cap(mut self, cap: usize) -> Self {
        self.resource_check_cap = cap;
        self
    }

    pub fn with_link_concurrency(mut self, limit: usize) -> Self {
        self.link_concurrency = limit;
        self
    }

    pub fn with_resource_concurrency(mut self, limit: usize) -> Self {
        self.resource_concurrency = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = deadline;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Rejects values that would make the run meaningless or unbounded.
    ///
    /// Caps may be zero (that simply disables the batch); concurrency limits
    /// and timeouts may not.
    pub fn validate(&self) -> Result<()> {
        if self.link_concurrency == 0 || self.resource_concurrency == 0 {
            return Err(AuditError::InvalidOptions(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(AuditError::InvalidOptions(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.overall_deadline.is_zero() {
            return Err(AuditError::InvalidOptions(
                "overall deadline must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AuditOptions::default().validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let options = AuditOptions::new().with_link_concurrency(0);
        assert!(matches!(
            options.validate(),
            Err(AuditError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_zero_cap_is_allowed() {
        let options = AuditOptions::new().with_link_check_cap(0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_blank_keyword_is_none() {
        let options = AuditOptions::new().with_keyword("   ");
        assert_eq!(options.target_keyword, None);

        let options = AuditOptions::new().with_keyword(" rust ");
        assert_eq!(options.target_keyword.as_deref(), Some("rust"));
    }
}
