// src/checks/spelling.rs
// =============================================================================
// Dictionary-based spell check of the page's visible text.
//
// The dictionary is an optional capability: a plain word list (one word per
// line; hunspell .dic files work too, affix flags after '/' are ignored).
// Without it the check is "not run".
//
// Capitalised words are skipped: they are mostly names, brands and
// sentence starts, and flagging them would drown the real typos.
// =============================================================================

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use super::{Check, CheckContext, CheckName, CheckReport};
use crate::capability::Capability;
use crate::error::{CheckError, CheckResult};

/// At most this many misspelled words are listed
const MAX_LISTED: usize = 50;

/// A set of known words, lower-cased.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_words(content.lines()))
    }

    pub fn from_words<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let words = lines
            .into_iter()
            .filter_map(|line| {
                let word = line.split('/').next().unwrap_or_default().trim();
                // hunspell files start with a word count
                if word.is_empty() || word.starts_with('#') || word.chars().all(|c| c.is_ascii_digit()) {
                    None
                } else {
                    Some(word.to_lowercase())
                }
            })
            .collect();
        Self { words }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SpellCheckResult {
    pub words_checked: usize,
    /// Distinct unknown words
    pub misspelled_count: usize,
    /// Alphabetical, capped
    pub misspelled: Vec<String>,
}

pub struct SpellCheck {
    dictionary: Capability<Arc<Dictionary>>,
}

impl SpellCheck {
    pub fn new(dictionary: Capability<Arc<Dictionary>>) -> Self {
        Self { dictionary }
    }
}

#[async_trait]
impl Check for SpellCheck {
    fn name(&self) -> CheckName {
        CheckName::SpellCheck
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> CheckResult<CheckReport> {
        let dictionary = self
            .dictionary
            .get()
            .map_err(|reason| CheckError::Unavailable(reason.to_string()))?;
        Ok(CheckReport::SpellCheck(evaluate(&ctx.snapshot.page.body_text, dictionary)))
    }
}

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)?").unwrap())
}

pub fn evaluate(text: &str, dictionary: &Dictionary) -> SpellCheckResult {
    let mut words_checked = 0;
    let mut unknown = BTreeSet::new();

    for token in word_pattern().find_iter(text).map(|m| m.as_str()) {
        let starts_upper = token.chars().next().map(char::is_uppercase).unwrap_or(false);
        if token.len() < 2 || starts_upper {
            continue;
        }
        words_checked += 1;

        let word = token.to_lowercase();
        let stem = word.split('\'').next().unwrap_or_default();
        if !dictionary.contains(&word) && !dictionary.contains(stem) {
            unknown.insert(word);
        }
    }

    SpellCheckResult {
        words_checked,
        misspelled_count: unknown.len(),
        misspelled: unknown.into_iter().take(MAX_LISTED).collect(),
    }
}
