// src/checks/related_keywords.rs
// =============================================================================
// Related keywords: the terms that keep appearing near the target keyword.
//
// Lexical co-occurrence, no language model: every time the keyword phrase
// occurs in the visible text, the words within WINDOW tokens on either side
// are counted. Stop words, short words and the keyword's own words are
// ignored. Terms seen at least MIN_COUNT times are reported, most frequent
// first.
//
// Without a target keyword the check is skipped.
// =============================================================================

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::error::{CheckError, CheckResult};

const WINDOW: usize = 5;
const MIN_COUNT: usize = 2;
const MAX_TERMS: usize = 15;
const MIN_TERM_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "because", "been", "before", "being",
    "but", "can", "could", "did", "does", "for", "from", "had", "has", "have", "her", "here",
    "his", "how", "into", "its", "just", "more", "most", "not", "now", "only", "other", "our",
    "out", "over", "she", "should", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "too", "very", "was", "were",
    "what", "when", "where", "which", "while", "who", "why", "will", "with", "would", "you",
    "your",
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelatedTerm {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelatedKeywords {
    pub keyword: String,
    /// How often the keyword phrase occurs in the text
    pub occurrences: usize,
    pub related: Vec<RelatedTerm>,
}

pub struct RelatedKeywordsCheck;

#[async_trait]
impl Check for RelatedKeywordsCheck {
    fn name(&self) -> CheckName {
        CheckName::RelatedKeywords
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let keyword = ctx
            .options
            .target_keyword
            .as_deref()
            .ok_or_else(|| CheckError::Skipped("no target keyword".to_string()))?;
        if ctx.snapshot.page.body_text.is_empty() {
            return Err(CheckError::Skipped("no visible text".to_string()));
        }
        Ok(CheckReport::RelatedKeywords(evaluate(&ctx.snapshot.page.body_text, keyword)))
    }
}

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9][a-z0-9'-]*").unwrap())
}

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().trim_end_matches(['\'', '-']).to_string())
        .collect()
}

pub fn evaluate(text: &str, keyword: &str) -> RelatedKeywords {
    let tokens = tokenize(text);
    let phrase = tokenize(keyword);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut occurrences = 0;

    if !phrase.is_empty() && tokens.len() >= phrase.len() {
        for start in 0..=tokens.len() - phrase.len() {
            if tokens[start..start + phrase.len()] != phrase[..] {
                continue;
            }
            occurrences += 1;

            let from = start.saturating_sub(WINDOW);
            let to = (start + phrase.len() + WINDOW).min(tokens.len());
            let neighbours = tokens[from..start].iter().chain(tokens[start + phrase.len()..to].iter());
            for token in neighbours {
                let is_term = token.len() >= MIN_TERM_LEN
                    && !token.chars().all(|c| c.is_ascii_digit())
                    && !STOP_WORDS.contains(&token.as_str())
                    && !phrase.contains(token);
                if is_term {
                    *counts.entry(token.as_str()).or_default() += 1;
                }
            }
        }
    }

    let mut related: Vec<RelatedTerm> = counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_COUNT)
        .map(|(term, count)| RelatedTerm {
            term: term.to_string(),
            count,
        })
        .collect();
    related.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    related.truncate(MAX_TERMS);

    RelatedKeywords {
        keyword: keyword.to_string(),
        occurrences,
        related,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooccurring_terms() {
        let text = "Rust borrow checker explained. The borrow checker prevents data races. \
                    A borrow checker error is common; the checker rejects unsafe aliasing.";
        let result = evaluate(text, "Borrow Checker");
        assert_eq!(result.occurrences, 3);
        let terms: Vec<&str> = result.related.iter().map(|t| t.term.as_str()).collect();
        // "data" and "explained" both sit next to two occurrences
        assert!(terms.contains(&"explained"));
        assert!(!terms.contains(&"the"));
        assert!(!terms.contains(&"borrow"));
    }

    #[test]
    fn test_keyword_absent() {
        let result = evaluate("Nothing relevant here at all.", "rust");
        assert_eq!(result.occurrences, 0);
        assert!(result.related.is_empty());
    }

    #[test]
    fn test_ties_break_alphabetically() {
        let text = "zeta seo beta. zeta seo beta. alpha seo alpha seo zeta";
        let result = evaluate(text, "seo");
        let terms: Vec<(&str, usize)> = result.related.iter().map(|t| (t.term.as_str(), t.count)).collect();
        assert_eq!(terms, vec![("alpha", 7), ("beta", 7), ("zeta", 7)]);
    }
}
