//! Category vocabulary and ordered keyword rules.
//!
//! Loaded once from TOML (`categories = [...]` plus `[[rules]]` tables).
//! Keyword lookup is deterministic: rules are tried in file order and the
//! first rule with a keyword contained in the uppercased text wins.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default household ruleset shipped with the binary.
pub const BUNDLED_RULES: &str = include_str!("../../config/categories.toml");

#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("invalid ruleset TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("category vocabulary is empty")]
    EmptyVocabulary,
    #[error("keyword rule references unknown category '{0}'")]
    UnknownCategory(String),
    #[error("keyword rule for '{0}' has an empty keyword")]
    EmptyKeyword(String),
}

/// One keyword rule: any keyword contained in the text selects `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RulesetFile {
    categories: Vec<String>,
    #[serde(default)]
    rules: Vec<KeywordRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRuleset {
    categories: Vec<String>,
    rules: Vec<KeywordRule>,
}

impl CategoryRuleset {
    /// Build a ruleset, uppercasing keywords. Every rule must name a
    /// vocabulary entry.
    pub fn new(categories: Vec<String>, rules: Vec<KeywordRule>) -> Result<Self, RulesetError> {
        let categories = categories
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>();
        if categories.is_empty() {
            return Err(RulesetError::EmptyVocabulary);
        }

        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            let category = rule.category.trim().to_string();
            if !categories.contains(&category) {
                return Err(RulesetError::UnknownCategory(category));
            }
            let keywords = rule
                .keywords
                .iter()
                .map(|k| k.trim().to_uppercase())
                .collect::<Vec<_>>();
            if keywords.iter().any(|k| k.is_empty()) {
                return Err(RulesetError::EmptyKeyword(category));
            }
            normalized.push(KeywordRule { category, keywords });
        }

        Ok(Self {
            categories,
            rules: normalized,
        })
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RulesetError> {
        let file: RulesetFile = toml::from_str(s)?;
        Self::new(file.categories, file.rules)
    }

    /// Load a ruleset file. A missing file is an error: categorization
    /// cannot run without a vocabulary.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("read category ruleset {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn bundled() -> Result<Self, RulesetError> {
        Self::from_toml_str(BUNDLED_RULES)
    }

    /// Vocabulary in configured order
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// First rule (in order) with any keyword (in order) contained in the
    /// uppercased text.
    pub fn match_keyword(&self, text: &str) -> Option<&str> {
        let upper = text.to_uppercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| upper.contains(k.as_str())))
            .map(|rule| rule.category.as_str())
    }

    /// Map a loosely-spelled category name back onto the vocabulary.
    ///
    /// Exact case-insensitive match first; otherwise the first entry (in
    /// vocabulary order) that contains the name or is contained by it.
    pub fn reconcile(&self, raw: &str) -> Option<&str> {
        let wanted = raw.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }

        if let Some(exact) = self.categories.iter().find(|c| c.to_lowercase() == wanted) {
            return Some(exact);
        }

        self.categories
            .iter()
            .find(|c| {
                let c = c.to_lowercase();
                c.contains(&wanted) || wanted.contains(&c)
            })
            .map(String::as_str)
    }
}
