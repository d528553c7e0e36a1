// src/checks/responsive_images.rs
// Counts <img> tags with srcset/sizes and with loading="lazy".

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::checker::resolve_url;
use crate::error::{CheckError, CheckResult};

const MAX_LISTED: usize = 20;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResponsiveImages {
    pub total: usize,
    pub responsive: usize,
    pub lazy_loaded: usize,
    /// src of images without srcset/sizes, capped
    pub non_responsive: Vec<String>,
}

impl ResponsiveImages {
    pub fn non_responsive_count(&self) -> usize {
        self.total - self.responsive
    }
}

pub struct ResponsiveImageCheck;

#[async_trait]
impl Check for ResponsiveImageCheck {
    fn name(&self) -> CheckName {
        CheckName::ResponsiveImages
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let base = Url::parse(&ctx.snapshot.final_url).map_err(|e| CheckError::Parse(e.to_string()))?;
        Ok(CheckReport::ResponsiveImages(evaluate(&ctx.snapshot.html, &base)))
    }
}

pub fn evaluate(html: &str, base: &Url) -> ResponsiveImages {
    let document = Html::parse_document(html);
    let selector = Selector::parse("img").unwrap();

    let mut result = ResponsiveImages {
        total: 0,
        responsive: 0,
        lazy_loaded: 0,
        non_responsive: Vec::new(),
    };

    for img in document.select(&selector) {
        let attrs = img.value();
        result.total += 1;

        if attrs.attr("srcset").is_some() || attrs.attr("sizes").is_some() {
            result.responsive += 1;
        } else if result.non_responsive.len() < MAX_LISTED {
            if let Some(src) = attrs.attr("src").and_then(|src| resolve_url(base, src)) {
                result.non_responsive.push(src);
            }
        }

        let lazy = attrs
            .attr("loading")
            .map(|v| v.trim().eq_ignore_ascii_case("lazy"))
            .unwrap_or(false);
        if lazy {
            result.lazy_loaded += 1;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let html = r#"<body>
            <img src="/a.png" srcset="/a@2x.png 2x" loading="lazy">
            <img src="/b.png" sizes="50vw">
            <img src="/c.png" loading="LAZY">
        </body>"#;
        let result = evaluate(html, &Url::parse("https://e.test/").unwrap());
        assert_eq!(result.total, 3);
        assert_eq!(result.responsive, 2);
        assert_eq!(result.lazy_loaded, 2);
        assert_eq!(result.non_responsive, vec!["https://e.test/c.png"]);
        assert_eq!(result.non_responsive_count(), 1);
    }
}
