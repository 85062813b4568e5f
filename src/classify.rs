//! URL categorization.
//!
//! A rule set is an ordered list of (name, regex) pairs plus a fallback:
//! - Rules are tried in declaration order, the first match wins
//! - Patterns are searched anywhere in the URL, not anchored
//! - URLs matching nothing get the fallback category
//!
//! Order is the only tie-breaker between overlapping patterns, so broad
//! rules (like "ends with .html") have to be declared after specific ones.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

pub const DEFAULT_FALLBACK: &str = "brand_or_content";
pub const DEFAULT_PRODUCT_CATEGORY: &str = "pages_produits";

/// Fixed columns of the category stats report, unusable as category names.
pub const RESERVED_NAMES: [&str; 2] = ["date", "total"];

/// Rule as written in the config file, before compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
}

impl RuleSpec {
    pub fn new(name: &str, pattern: &str) -> Self {
        RuleSpec {
            name: name.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// The shipped rules. Order matters: `pages_produits` must stay last.
pub fn default_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            "CATEGORIE",
            concat!(
                r"/(?:telephone-conference|guides|casque-telephonique|telephone-filaire|",
                r"talkie-walkie|ecran-affichage-dynamique-et-publicitaire|passerelles-switch|",
                r"telephonie-mobile|informatique|alarmes-securite)(?:/|\.html)",
            ),
        ),
        RuleSpec::new(
            "autre",
            concat!(
                r"/(?:mentions-legales|qui-sommes-nous|vos-achats-rembourses|modalites-paiement|",
                r"livraison-express|modalites-livraison|engagements|enable-cookies|cgv|garantie-pro|",
                r"10-jours-essai|reprise-materiel|retours-sav)$",
            ),
        ),
        RuleSpec::new(DEFAULT_PRODUCT_CATEGORY, r"\.html$"),
    ]
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    name: String,
    pattern: Regex,
}

impl CategoryRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
    fallback: String,
}

impl RuleSet {
    pub fn new(specs: &[RuleSpec], fallback: &str) -> Result<Self, ConfigError> {
        if fallback.trim().is_empty() {
            return Err(ConfigError::EmptyCategoryName);
        }
        if RESERVED_NAMES.contains(&fallback) {
            return Err(ConfigError::ReservedCategoryName(fallback.to_string()));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(specs.len() + 1);
        seen.push(fallback);

        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.name.trim().is_empty() {
                return Err(ConfigError::EmptyCategoryName);
            }
            if RESERVED_NAMES.contains(&spec.name.as_str()) {
                return Err(ConfigError::ReservedCategoryName(spec.name.clone()));
            }
            if seen.contains(&spec.name.as_str()) {
                return Err(ConfigError::DuplicateCategory(spec.name.clone()));
            }
            seen.push(&spec.name);

            let pattern = Regex::new(&spec.pattern).map_err(|source| ConfigError::InvalidPattern {
                category: spec.name.clone(),
                source,
            })?;
            rules.push(CategoryRule {
                name: spec.name.clone(),
                pattern,
            });
        }

        Ok(RuleSet {
            rules,
            fallback: fallback.to_string(),
        })
    }

    pub fn defaults() -> Self {
        // shipped patterns are constants, compiling them cannot fail
        Self::new(&default_rules(), DEFAULT_FALLBACK).expect("default rules compile")
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// True when `name` is a rule name or the fallback.
    pub fn knows(&self, name: &str) -> bool {
        name == self.fallback || self.rules.iter().any(|r| r.name == name)
    }

    /// Category of `url`: the first matching rule, else the fallback.
    pub fn categorize(&self, url: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(url))
            .map(|rule| rule.name.as_str())
            .unwrap_or(&self.fallback)
    }

    /// Rule names in declaration order, fallback last. This is also the
    /// column order of the category stats report.
    pub fn column_names(&self) -> Vec<&str> {
        self.rules
            .iter()
            .map(|r| r.name.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
            .collect()
    }

    /// URLs from `urls` that fall in `category`.
    pub fn select<'a, I>(&self, urls: I, category: &str) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        urls.into_iter()
            .filter(|url| self.categorize(url) == category)
            .cloned()
            .collect()
    }

    /// Count every URL into exactly one category.
    pub fn tally<'a, I>(&self, urls: I) -> CategoryTally
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut counts: Vec<(String, usize)> = self
            .column_names()
            .into_iter()
            .map(|name| (name.to_string(), 0))
            .collect();

        for url in urls {
            let category = self.categorize(url);
            // column_names covers every possible result of categorize
            if let Some(slot) = counts.iter_mut().find(|(name, _)| name == category) {
                slot.1 += 1;
            }
        }

        CategoryTally { counts }
    }
}

/// Per-category counts in rule order, fallback last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub counts: Vec<(String, usize)>,
}

impl CategoryTally {
    pub fn get(&self, category: &str) -> usize {
        self.counts
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}
