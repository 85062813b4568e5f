//! Snapshot comparison engine.
//!
//! Compares the previous run's URL set with the current one:
//! - added: present now, absent before
//! - removed: present before, absent now
//!
//! Both sides are plain sets so the two results are disjoint by construction.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::classify::RuleSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl UrlDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Sub-diff holding only URLs that categorize as `category`.
    pub fn restrict(&self, rules: &RuleSet, category: &str) -> UrlDiff {
        UrlDiff {
            added: rules.select(&self.added, category),
            removed: rules.select(&self.removed, category),
        }
    }
}

pub fn diff(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> UrlDiff {
    UrlDiff {
        added: current.difference(previous).cloned().collect(),
        removed: previous.difference(current).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn added_and_removed_detected() {
        let result = diff(&set(&["a.html", "b.html"]), &set(&["b.html", "c.html"]));
        assert_eq!(result.added, set(&["c.html"]));
        assert_eq!(result.removed, set(&["a.html"]));
    }

    #[test]
    fn first_run_adds_everything() {
        let result = diff(&BTreeSet::new(), &set(&["x.html"]));
        assert_eq!(result.added, set(&["x.html"]));
        assert!(result.removed.is_empty());
    }

    #[test]
    fn empty_current_removes_everything() {
        let result = diff(&set(&["a", "b"]), &BTreeSet::new());
        assert!(result.added.is_empty());
        assert_eq!(result.removed, set(&["a", "b"]));
    }

    #[test]
    fn empty_both_sides_no_changes() {
        let result = diff(&BTreeSet::new(), &BTreeSet::new());
        assert!(result.is_empty());
    }

    #[test]
    fn unchanged_set_reports_nothing() {
        let both = set(&["a", "b", "c"]);
        assert!(diff(&both, &both).is_empty());
    }

    #[test]
    fn urls_compare_verbatim() {
        let result = diff(&set(&["https://site/A.html"]), &set(&["https://site/a.html"]));
        assert_eq!(result.added, set(&["https://site/a.html"]));
        assert_eq!(result.removed, set(&["https://site/A.html"]));
    }

    #[test]
    fn results_match_set_difference_and_are_disjoint() {
        let cases = [
            (set(&[]), set(&["a"])),
            (set(&["a", "b", "c"]), set(&["c", "d"])),
            (set(&["a", "b"]), set(&["a", "b", "c", "d"])),
            (set(&["x", "y", "z"]), set(&["p", "q"])),
        ];

        for (previous, current) in &cases {
            let result = diff(previous, current);
            let expected_added: BTreeSet<String> = current.difference(previous).cloned().collect();
            let expected_removed: BTreeSet<String> = previous.difference(current).cloned().collect();

            assert_eq!(result.added, expected_added);
            assert_eq!(result.removed, expected_removed);
            assert!(result.added.is_disjoint(&result.removed));
            assert!(result.added.iter().all(|u| current.contains(u) && !previous.contains(u)));
        }
    }

    #[test]
    fn restrict_keeps_one_category() {
        let rules = RuleSet::defaults();
        let result = diff(
            &set(&["https://site/old.html", "https://site/cgv"]),
            &set(&["https://site/new.html", "https://site/guides/"]),
        );

        let products = result.restrict(&rules, "pages_produits");
        assert_eq!(products.added, set(&["https://site/new.html"]));
        assert_eq!(products.removed, set(&["https://site/old.html"]));
    }
}
