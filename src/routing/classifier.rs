//! Keyword classifier.
//!
//! Maps a message onto the labels of one [`RuleSet`]. A label's score is the
//! number of its distinct keywords found as substrings of the lowercased
//! text, plus one for every bridge phrase that names it. Pure and
//! deterministic: the same text and rule set always yield the same decision.

use crate::routing::table::RuleSet;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Which level of the hierarchy is classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Director level: several matches mean a multi-domain request.
    Domain,
    /// Domain level: several matches are ranked, the caller takes the first.
    Specialist,
}

/// Result of classifying one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    /// Matched labels, best first.
    pub targets: Vec<String>,
    /// Score per matched label.
    pub scores: BTreeMap<String, usize>,
    /// Set only at domain granularity with two or more matches.
    pub is_multi_domain: bool,
}

/// What the caller should do with a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePlan {
    /// No label matched; answer locally.
    Direct,
    /// Forward to one label.
    Single(String),
    /// Fan out to several labels.
    Multi(Vec<String>),
}

impl RoutingDecision {
    /// Best-ranked label.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }

    /// Whether nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Collapses the decision into an action.
    #[must_use]
    pub fn plan(&self) -> RoutePlan {
        match self.targets.as_slice() {
            [] => RoutePlan::Direct,
            [first, ..] if !self.is_multi_domain => RoutePlan::Single(first.clone()),
            targets => RoutePlan::Multi(targets.to_vec()),
        }
    }

    /// Whether `label` matched.
    #[must_use]
    pub fn matched(&self, label: &str) -> bool {
        self.scores.contains_key(label)
    }
}

/// Classifies `text` against `rules`.
///
/// Candidates are ordered by descending score, then ascending declared
/// priority, then declaration order.
///
/// # Examples
///
/// ```
/// use director_rs::routing::{Granularity, RoutingTable, classify};
///
/// let table = RoutingTable::default_table();
/// let decision = classify("Plan healthy meals within my budget", &table.domains, Granularity::Domain);
/// assert_eq!(decision.targets, vec!["health", "finance"]);
/// assert!(decision.is_multi_domain);
/// ```
#[must_use]
pub fn classify(text: &str, rules: &RuleSet, granularity: Granularity) -> RoutingDecision {
    let counts = score(text, rules);

    let mut candidates: Vec<(usize, usize)> = counts
        .into_iter()
        .enumerate()
        .filter(|(_, count)| *count > 0)
        .collect();
    candidates.sort_by_key(|&(idx, count)| (Reverse(count), rules.labels[idx].priority, idx));

    let targets: Vec<String> = candidates
        .iter()
        .map(|&(idx, _)| rules.labels[idx].label.clone())
        .collect();
    let scores = candidates
        .iter()
        .map(|&(idx, count)| (rules.labels[idx].label.clone(), count))
        .collect();
    let is_multi_domain = granularity == Granularity::Domain && targets.len() >= 2;

    RoutingDecision {
        targets,
        scores,
        is_multi_domain,
    }
}

/// Keywords and bridge phrases that fired for each label, for diagnostics.
#[must_use]
pub fn matched_keywords(text: &str, rules: &RuleSet) -> BTreeMap<String, Vec<String>> {
    let lowered = text.to_lowercase();
    let mut matched: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for rule in &rules.labels {
        let hits: Vec<String> = rule
            .keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .cloned()
            .collect();
        if !hits.is_empty() {
            matched.insert(rule.label.clone(), hits);
        }
    }
    for bridge in rules.bridges.iter().filter(|b| lowered.contains(&b.phrase)) {
        for label in &bridge.labels {
            matched
                .entry(label.clone())
                .or_default()
                .push(format!("[{}]", bridge.phrase));
        }
    }
    matched
}

fn score(text: &str, rules: &RuleSet) -> Vec<usize> {
    let lowered = text.to_lowercase();
    let mut counts: Vec<usize> = rules
        .labels
        .iter()
        .map(|rule| {
            rule.keywords
                .iter()
                .filter(|k| lowered.contains(k.as_str()))
                .count()
        })
        .collect();

    for bridge in rules.bridges.iter().filter(|b| lowered.contains(&b.phrase)) {
        for label in &bridge.labels {
            if let Some(idx) = rules.position(label) {
                counts[idx] += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::table::RoutingTable;
    use test_case::test_case;

    fn domains() -> RuleSet {
        RoutingTable::default_table().domains
    }

    #[test_case("What's the weather like?", &[] ; "no match")]
    #[test_case("Show me my home gym equipment", &["health"] ; "health only")]
    #[test_case("How much money is in my savings?", &["finance"] ; "finance only")]
    #[test_case("Add a task to my calendar", &["productivity"] ; "productivity only")]
    #[test_case("I want to learn a new skill", &["learning"] ; "learning only")]
    #[test_case("Plan healthy meals within my budget", &["health", "finance"] ; "health and finance")]
    fn test_domain_targets(text: &str, expected: &[&str]) {
        let decision = classify(text, &domains(), Granularity::Domain);
        assert_eq!(decision.targets, expected);
        assert_eq!(decision.is_multi_domain, expected.len() >= 2);
    }

    #[test]
    fn test_higher_score_wins_over_priority() {
        let decision = classify(
            "my budget for food, expense tracking and bank savings",
            &domains(),
            Granularity::Domain,
        );
        assert_eq!(decision.primary(), Some("finance"));
        assert_eq!(decision.targets, vec!["finance", "health"]);
        assert_eq!(decision.scores["finance"], 4);
        assert_eq!(decision.scores["health"], 1);
    }

    #[test]
    fn test_tie_broken_by_priority() {
        let rules = RuleSet::new()
            .label("b", 2, &["alpha"])
            .label("a", 1, &["beta"]);
        let decision = classify("alpha beta", &rules, Granularity::Domain);
        assert_eq!(decision.targets, vec!["a", "b"]);
    }

    #[test]
    fn test_tie_broken_by_declaration_order() {
        let rules = RuleSet::new()
            .label("first", 1, &["alpha"])
            .label("second", 1, &["beta"]);
        let decision = classify("beta alpha", &rules, Granularity::Domain);
        assert_eq!(decision.targets, vec!["first", "second"]);
    }

    #[test]
    fn test_bridge_adds_points() {
        let decision = classify(
            "is a gym membership worth it",
            &domains(),
            Granularity::Domain,
        );
        assert_eq!(decision.targets, vec!["health", "finance"]);
        assert_eq!(decision.scores["finance"], 1);
    }

    #[test]
    fn test_specialist_granularity_never_multi() {
        let health = RoutingTable::default_table().specialists["health"].clone();
        let decision = classify(
            "cook dinner after using the treadmill",
            &health,
            Granularity::Specialist,
        );
        assert!(!decision.is_multi_domain);
        assert_eq!(decision.targets.len(), 2);
        assert_eq!(decision.plan(), RoutePlan::Single("nutrition".to_string()));
    }

    #[test]
    fn test_distinct_keywords_counted_once() {
        let rules = RuleSet::new().label("a", 1, &["meal"]);
        let decision = classify("meal meal meal", &rules, Granularity::Domain);
        assert_eq!(decision.scores["a"], 1);
    }

    #[test]
    fn test_case_insensitive() {
        let decision = classify("KETTLEBELL", &domains(), Granularity::Domain);
        assert_eq!(decision.targets, vec!["health"]);
    }

    #[test]
    fn test_plan() {
        assert_eq!(RoutingDecision::default().plan(), RoutePlan::Direct);
        let decision = classify("meal budget", &domains(), Granularity::Domain);
        assert_eq!(
            decision.plan(),
            RoutePlan::Multi(vec!["health".to_string(), "finance".to_string()])
        );
    }

    #[test]
    fn test_matched_keywords() {
        let matched = matched_keywords("gym membership for my meal", &domains());
        assert_eq!(matched["health"], vec!["meal", "[gym membership]"]);
        assert_eq!(matched["finance"], vec!["[gym membership]"]);
    }
}
