// src/checks/image_ratio.rs
// =============================================================================
// Declared image dimensions.
//
// An <img> without a width and height (as attributes, or as px values in an
// inline style) makes the browser reflow once the image arrives. This check
// lists those images. data: URIs are skipped.
// =============================================================================

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::sync::OnceLock;
use url::Url;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::checker::resolve_url;
use crate::error::{CheckError, CheckResult};

const MAX_LISTED: usize = 20;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageAspectRatio {
    pub checked: usize,
    pub with_dimensions: Vec<DeclaredImage>,
    pub missing_dimensions: Vec<String>,
    /// Images whose declared width/height are not positive numbers
    pub invalid: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeclaredImage {
    pub src: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
}

pub struct ImageRatioCheck;

#[async_trait]
impl Check for ImageRatioCheck {
    fn name(&self) -> CheckName {
        CheckName::ImageAspectRatio
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let base = Url::parse(&ctx.snapshot.final_url).map_err(|e| CheckError::Parse(e.to_string()))?;
        Ok(CheckReport::ImageAspectRatio(evaluate(&ctx.snapshot.html, &base)))
    }
}

fn css_dimension(property: &str) -> &'static Regex {
    static WIDTH: OnceLock<Regex> = OnceLock::new();
    static HEIGHT: OnceLock<Regex> = OnceLock::new();
    if property == "width" {
        WIDTH.get_or_init(|| Regex::new(r"(?i)(?:^|[;\s])width\s*:\s*([0-9.]+)px").unwrap())
    } else {
        HEIGHT.get_or_init(|| Regex::new(r"(?i)(?:^|[;\s])height\s*:\s*([0-9.]+)px").unwrap())
    }
}

fn from_style(style: &str, property: &str) -> Option<String> {
    css_dimension(property)
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// "300", "300px" and "300.0" are accepted; percentages are not
fn parse_dimension(value: &str) -> Option<u32> {
    let number = value.trim().trim_end_matches("px").trim();
    let parsed: f64 = number.parse().ok()?;
    (parsed >= 1.0 && parsed.is_finite()).then(|| parsed as u32)
}

pub fn evaluate(html: &str, base: &Url) -> ImageAspectRatio {
    let document = Html::parse_document(html);
    let selector = Selector::parse("img[src]").unwrap();

    let mut result = ImageAspectRatio {
        checked: 0,
        with_dimensions: Vec::new(),
        missing_dimensions: Vec::new(),
        invalid: Vec::new(),
    };

    for img in document.select(&selector) {
        let attrs = img.value();
        let raw_src = attrs.attr("src").unwrap_or_default().trim();
        if raw_src.is_empty() || raw_src.starts_with("data:") {
            continue;
        }
        let src = resolve_url(base, raw_src).unwrap_or_else(|| raw_src.to_string());
        result.checked += 1;

        let style = attrs.attr("style").unwrap_or_default();
        let width = attrs.attr("width").map(str::to_string).or_else(|| from_style(style, "width"));
        let height = attrs.attr("height").map(str::to_string).or_else(|| from_style(style, "height"));

        match (width, height) {
            (Some(w), Some(h)) => match (parse_dimension(&w), parse_dimension(&h)) {
                (Some(width), Some(height)) => {
                    let ratio = (width as f64 / height as f64 * 100.0).round() / 100.0;
                    result.with_dimensions.push(DeclaredImage {
                        src,
                        width,
                        height,
                        aspect_ratio: ratio,
                    });
                }
                _ if result.invalid.len() < MAX_LISTED => result.invalid.push(src),
                _ => {}
            },
            _ if result.missing_dimensions.len() < MAX_LISTED => result.missing_dimensions.push(src),
            _ => {}
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(html: &str) -> ImageAspectRatio {
        evaluate(html, &Url::parse("https://e.test/").unwrap())
    }

    #[test]
    fn test_attribute_dimensions() {
        let result = eval(r#"<img src="/a.png" width="400" height="300">"#);
        assert_eq!(result.checked, 1);
        assert_eq!(result.with_dimensions[0].aspect_ratio, 1.33);
        assert!(result.missing_dimensions.is_empty());
    }

    #[test]
    fn test_style_dimensions() {
        let result = eval(r#"<img src="/a.png" style="max-width: 10px; width: 200px; height:100px">"#);
        assert_eq!(result.with_dimensions[0].width, 200);
        assert_eq!(result.with_dimensions[0].height, 100);
    }

    #[test]
    fn test_missing_and_invalid() {
        let result = eval(r#"<img src="/a.png" width="100"><img src="/b.png" width="50%" height="auto"><img src="data:image/png;base64,xx">"#);
        assert_eq!(result.checked, 2);
        assert_eq!(result.missing_dimensions, vec!["https://e.test/a.png"]);
        assert_eq!(result.invalid, vec!["https://e.test/b.png"]);
    }
}
