// src/checks/url_friendly.rs
// =============================================================================
// URL friendliness: is the page's own URL short, lower-case and readable?
//
// Pure inspection of the final URL; no network.
// =============================================================================

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use url::Url;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::error::{CheckError, CheckResult};

/// More query parameters than this is flagged
const MAX_QUERY_PARAMS: usize = 3;
/// A single path word longer than this is flagged
const MAX_WORD_LEN: usize = 30;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UrlFriendliness {
    pub path: String,
    pub query: String,
    pub is_friendly: bool,
    pub issues: Vec<String>,
    /// None when no target keyword was given
    pub keyword_in_path: Option<bool>,
}

pub struct UrlFriendlinessCheck;

#[async_trait]
impl Check for UrlFriendlinessCheck {
    fn name(&self) -> CheckName {
        CheckName::UrlFriendliness
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let url = Url::parse(&ctx.snapshot.final_url).map_err(|e| CheckError::Parse(e.to_string()))?;
        let result = evaluate(&url, ctx.options.target_keyword.as_deref());
        Ok(CheckReport::UrlFriendliness(result))
    }
}

fn session_param() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(^|&)(sid|phpsessid|jsessionid|sessionid)=").unwrap())
}

fn special_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Underscores are reported separately
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9\-/._]").unwrap())
}

pub fn evaluate(url: &Url, keyword: Option<&str>) -> UrlFriendliness {
    let path = percent_decode(url.path());
    let query = url.query().unwrap_or_default().to_string();
    let mut issues = Vec::new();

    if session_param().is_match(&query) {
        issues.push("Session ID parameter in query string".to_string());
    }
    if !query.is_empty() && query.split('&').count() > MAX_QUERY_PARAMS {
        issues.push("Too many query parameters".to_string());
    }
    if path.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push("Uppercase letters in path".to_string());
    }
    if special_chars().is_match(&path) {
        issues.push("Special characters in path".to_string());
    }
    if path.contains('_') {
        issues.push("Underscores in path (prefer hyphens)".to_string());
    }
    let has_long_word = path
        .split(|c| c == '-' || c == '/')
        .any(|word| word.chars().count() > MAX_WORD_LEN);
    if has_long_word {
        issues.push("Very long word in path".to_string());
    }

    let keyword_in_path = keyword.map(|kw| {
        let slug = kw.trim().to_lowercase().replace(' ', "-");
        path.to_lowercase().contains(&slug)
    });

    UrlFriendliness {
        is_friendly: issues.is_empty(),
        path,
        query,
        issues,
        keyword_in_path,
    }
}

// Decodes %XX escapes; invalid sequences are kept as-is
fn percent_decode(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(url: &str, keyword: Option<&str>) -> UrlFriendliness {
        evaluate(&Url::parse(url).unwrap(), keyword)
    }

    #[test]
    fn test_clean_url_is_friendly() {
        let result = check("https://example.com/blog/rust-seo-audit", None);
        assert!(result.is_friendly, "{:?}", result.issues);
        assert_eq!(result.keyword_in_path, None);
    }

    #[test]
    fn test_file_extension_is_allowed() {
        assert!(check("https://example.com/index.html", None).is_friendly);
    }

    #[test]
    fn test_session_and_params() {
        let result = check("https://example.com/p?a=1&b=2&c=3&PHPSESSID=x", None);
        assert!(!result.is_friendly);
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_underscore_and_uppercase() {
        let result = check("https://example.com/My_Page", None);
        assert!(result.issues.iter().any(|i| i.contains("Uppercase")));
        assert!(result.issues.iter().any(|i| i.contains("Underscores")));
        assert!(!result.issues.iter().any(|i| i.contains("Special")));
    }

    #[test]
    fn test_encoded_space_is_special() {
        let result = check("https://example.com/my%20page", None);
        assert_eq!(result.path, "/my page");
        assert!(result.issues.iter().any(|i| i.contains("Special")));
    }

    #[test]
    fn test_keyword_slug() {
        let result = check("https://example.com/rust-seo-audit", Some("SEO Audit"));
        assert_eq!(result.keyword_in_path, Some(true));
        let result = check("https://example.com/about", Some("seo"));
        assert_eq!(result.keyword_in_path, Some(false));
    }
}
