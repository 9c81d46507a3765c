//! The shared, versioned routing table.
//!
//! One table holds every rule set the hierarchy classifies against: the
//! director's domain labels, each domain's specialist labels, and the intent
//! labels specialists use to detect writes. It is built once (compiled-in
//! default or a JSON file), normalized, validated, and shared by `Arc`.

use crate::error::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Routing table format version understood by this build.
pub const ROUTING_TABLE_VERSION: u32 = 1;

/// Intent label for creation requests ("add", "bought", ...).
pub const INTENT_ADD: &str = "add";
/// Intent label for consumption logging ("i ate", ...).
pub const INTENT_LOG: &str = "log";
/// Intent label for listing requests.
pub const INTENT_BROWSE: &str = "browse";
/// Intent label for location questions.
pub const INTENT_LOCATE: &str = "locate";

/// A label with its trigger keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    /// Label name (domain, specialist, or intent).
    pub label: String,
    /// Lowercase keywords and phrases matched as substrings.
    pub keywords: Vec<String>,
    /// Lower wins ties.
    #[serde(default)]
    pub priority: u32,
}

/// A phrase that signals several labels at once.
///
/// "gym membership" is both a health and a finance concern; each label named
/// here gains one point when the phrase occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRule {
    /// Lowercase phrase.
    pub phrase: String,
    /// Labels credited when the phrase occurs.
    pub labels: Vec<String>,
}

/// An ordered set of label rules plus bridge phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Labels in declaration order.
    pub labels: Vec<LabelRule>,
    /// Cross-label phrases.
    #[serde(default)]
    pub bridges: Vec<BridgeRule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label.
    #[must_use]
    pub fn label(mut self, label: &str, priority: u32, keywords: &[&str]) -> Self {
        self.labels.push(LabelRule {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            priority,
        });
        self
    }

    /// Appends a bridge phrase.
    #[must_use]
    pub fn bridge(mut self, phrase: &str, labels: &[&str]) -> Self {
        self.bridges.push(BridgeRule {
            phrase: phrase.to_string(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        });
        self
    }

    /// Looks up a label rule.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&LabelRule> {
        self.labels.iter().find(|r| r.label == label)
    }

    /// Declaration index of a label.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|r| r.label == label)
    }

    /// Whether the label is declared.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Label names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|r| r.label.as_str())
    }

    /// Sort key: declared priority, then declaration index. Unknown labels sort last.
    #[must_use]
    pub fn rank(&self, label: &str) -> (u32, usize) {
        self.position(label)
            .map_or((u32::MAX, usize::MAX), |i| (self.labels[i].priority, i))
    }

    /// Returns `labels` reordered by priority.
    #[must_use]
    pub fn in_priority_order(&self, labels: &[String]) -> Vec<String> {
        let mut ordered = labels.to_vec();
        ordered.sort_by_key(|l| self.rank(l));
        ordered
    }

    /// Lowercases and trims every keyword, phrase and label, dropping
    /// blanks and duplicates while keeping first-seen order.
    fn normalize(&mut self) {
        for rule in &mut self.labels {
            rule.label = rule.label.trim().to_lowercase();
            rule.keywords = dedupe(rule.keywords.iter().map(String::as_str));
        }
        for bridge in &mut self.bridges {
            bridge.phrase = bridge.phrase.trim().to_lowercase();
            bridge.labels = dedupe(bridge.labels.iter().map(String::as_str));
        }
        self.bridges.retain(|b| !b.phrase.is_empty());
    }

    fn validate(&self, scope: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.labels {
            if !seen.insert(rule.label.as_str()) {
                return Err(RoutingError::DuplicateLabel {
                    scope: scope.to_string(),
                    label: rule.label.clone(),
                }
                .into());
            }
            if rule.keywords.is_empty() {
                return Err(RoutingError::EmptyLabel {
                    scope: scope.to_string(),
                    label: rule.label.clone(),
                }
                .into());
            }
        }
        for bridge in &self.bridges {
            if let Some(label) = bridge.labels.iter().find(|l| !self.contains(l)) {
                return Err(RoutingError::UnknownBridgeLabel {
                    scope: scope.to_string(),
                    phrase: bridge.phrase.clone(),
                    label: label.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn dedupe<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Every rule set the hierarchy routes with.
///
/// # Examples
///
/// ```
/// use director_rs::routing::RoutingTable;
///
/// let table = RoutingTable::default_table();
/// assert!(table.domains.contains("health"));
/// assert!(table.specialists_for("health").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    /// Format version.
    pub version: u32,
    /// Director-level domain labels.
    pub domains: RuleSet,
    /// Specialist labels keyed by domain label.
    #[serde(default)]
    pub specialists: BTreeMap<String, RuleSet>,
    /// Intent labels used by specialists.
    #[serde(default)]
    pub intents: RuleSet,
}

impl RoutingTable {
    /// Builds and validates a table from parts.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if any rule set is invalid.
    pub fn new(
        domains: RuleSet,
        specialists: BTreeMap<String, RuleSet>,
        intents: RuleSet,
    ) -> Result<Self> {
        Self {
            version: ROUTING_TABLE_VERSION,
            domains,
            specialists,
            intents,
        }
        .validated()
    }

    /// The compiled-in table.
    #[must_use]
    pub fn default_table() -> Self {
        let domains = RuleSet::new()
            .label(
                "health",
                1,
                &[
                    "health", "meal", "food", "cook", "recipe", "nutrition", "calorie",
                    "protein", "carbs", "breakfast", "lunch", "dinner", "snack", "diet",
                    "weight", "fitness", "exercise", "workout", "medical", "wellness",
                    "blood pressure", "heart rate", "sleep", "vitals", "chef", "equipment",
                    "dumbbell", "treadmill", "home gym", "office gym", "barbell",
                    "kettlebell", "yoga mat",
                ],
            )
            .label(
                "finance",
                2,
                &[
                    "money", "budget", "finance", "financial", "investment", "savings",
                    "expense", "bank", "credit", "debt", "payment", "income", "tax", "cost",
                ],
            )
            .label(
                "productivity",
                3,
                &[
                    "task", "schedule", "calendar", "project", "deadline", "meeting", "todo",
                    "productivity", "organize", "planning",
                ],
            )
            .label(
                "learning",
                4,
                &[
                    "learn", "study", "education", "courses", "skill", "knowledge",
                    "tutorial", "lesson",
                ],
            )
            .bridge("meal budget", &["health", "finance"])
            .bridge("grocery cost", &["health", "finance"])
            .bridge("gym membership", &["health", "finance"])
            .bridge("health insurance", &["health", "finance"])
            .bridge("meal prep time", &["health", "productivity"])
            .bridge("workout schedule", &["health", "productivity"])
            .bridge("budget planning", &["finance", "productivity"]);

        let health = RuleSet::new()
            .label(
                "nutrition",
                1,
                &[
                    "meal", "food", "cook", "recipe", "nutrition", "calorie", "protein",
                    "carbs", "breakfast", "lunch", "dinner", "snack", "hungry", "diet",
                    "ingredient",
                ],
            )
            .label(
                "equipment",
                2,
                &[
                    "equipment", "weights", "dumbbell", "treadmill", "bike", "home gym",
                    "office gym", "gear", "machine", "barbell", "kettlebell", "yoga mat",
                    "bench", "squat rack",
                ],
            );

        let intents = RuleSet::new()
            .label(INTENT_ADD, 1, &["add", "buy", "bought", "new", "got", "purchased"])
            .label(
                INTENT_LOG,
                2,
                &[
                    "i ate", "i had", "i just had", "log meal", "log my", "just ate", "eaten",
                    "i drank",
                ],
            )
            .label(INTENT_BROWSE, 3, &["show", "list", "what", "which", "inventory"])
            .label(INTENT_LOCATE, 4, &["group", "location", "where"]);

        let mut specialists = BTreeMap::new();
        specialists.insert("health".to_string(), health);

        Self {
            version: ROUTING_TABLE_VERSION,
            domains,
            specialists,
            intents,
        }
    }

    /// Parses a table from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Load`] on malformed JSON, or any validation error.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json).map_err(|e| RoutingError::Load {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        table.validated()
    }

    /// Reads a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Load`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let load_err = |reason: String| RoutingError::Load {
            path: path.display().to_string(),
            reason,
        };
        let json = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let table: Self = serde_json::from_str(&json).map_err(|e| load_err(e.to_string()))?;
        table.validated()
    }

    /// Loads from `path` when given, otherwise the default table.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or invalid.
    pub fn load(path: Option<&Path>) -> Result<Arc<Self>> {
        let table = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::default_table(),
        };
        Ok(Arc::new(table))
    }

    /// Specialist rules for a domain.
    #[must_use]
    pub fn specialists_for(&self, domain: &str) -> Option<&RuleSet> {
        self.specialists.get(domain)
    }

    /// Serializes the table as pretty JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    fn validated(mut self) -> Result<Self> {
        if self.version != ROUTING_TABLE_VERSION {
            return Err(RoutingError::UnsupportedVersion {
                found: self.version,
                expected: ROUTING_TABLE_VERSION,
            }
            .into());
        }

        self.domains.normalize();
        self.intents.normalize();
        self.specialists = std::mem::take(&mut self.specialists)
            .into_iter()
            .map(|(domain, mut rules)| {
                rules.normalize();
                (domain.trim().to_lowercase(), rules)
            })
            .collect();

        self.domains.validate("domains")?;
        self.intents.validate("intents")?;
        for (domain, rules) in &self.specialists {
            if !self.domains.contains(domain) {
                return Err(RoutingError::UnknownDomain {
                    domain: domain.clone(),
                }
                .into());
            }
            rules.validate(&format!("specialists.{domain}"))?;
        }
        Ok(self)
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::default_table()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_table_is_valid() {
        let table = RoutingTable::default_table();
        let revalidated = table.clone().validated().unwrap();
        assert_eq!(table, revalidated);
    }

    #[test]
    fn test_default_domains_in_priority_order() {
        let table = RoutingTable::default_table();
        let names: Vec<_> = table.domains.names().collect();
        assert_eq!(names, vec!["health", "finance", "productivity", "learning"]);
    }

    #[test]
    fn test_normalize_lowercases_and_dedupes() {
        let domains = RuleSet::new().label(" Health ", 1, &["Meal", "meal ", "", "FOOD"]);
        let table = RoutingTable::new(domains, BTreeMap::new(), RuleSet::new()).unwrap();
        let rule = table.domains.get("health").unwrap();
        assert_eq!(rule.keywords, vec!["meal", "food"]);
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let domains = RuleSet::new()
            .label("health", 1, &["meal"])
            .label("HEALTH", 2, &["food"]);
        let err = RoutingTable::new(domains, BTreeMap::new(), RuleSet::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Routing(RoutingError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn test_bridge_unknown_label_rejected() {
        let domains = RuleSet::new()
            .label("health", 1, &["meal"])
            .bridge("meal budget", &["health", "finance"]);
        let err = RoutingTable::new(domains, BTreeMap::new(), RuleSet::new()).unwrap_err();
        assert!(err.to_string().contains("finance"));
    }

    #[test]
    fn test_empty_label_rejected() {
        let domains = RuleSet::new().label("health", 1, &["  "]);
        let err = RoutingTable::new(domains, BTreeMap::new(), RuleSet::new()).unwrap_err();
        assert!(matches!(err, Error::Routing(RoutingError::EmptyLabel { .. })));
    }

    #[test]
    fn test_specialists_for_unknown_domain_rejected() {
        let domains = RuleSet::new().label("health", 1, &["meal"]);
        let mut specialists = BTreeMap::new();
        specialists.insert(
            "finance".to_string(),
            RuleSet::new().label("tax", 1, &["tax"]),
        );
        let err = RoutingTable::new(domains, specialists, RuleSet::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Routing(RoutingError::UnknownDomain { .. })
        ));
    }

    #[test]
    fn test_from_json_minimal() {
        let json = r#"{
            "version": 1,
            "domains": {
                "labels": [
                    {"label": "health", "keywords": ["meal", "food"], "priority": 1},
                    {"label": "finance", "keywords": ["budget", "cost"], "priority": 2}
                ]
            }
        }"#;
        let table = RoutingTable::from_json(json).unwrap();
        assert_eq!(table.domains.labels.len(), 2);
        assert!(table.specialists.is_empty());
        assert!(table.intents.labels.is_empty());
    }

    #[test]
    fn test_from_json_wrong_version() {
        let json = r#"{"version": 2, "domains": {"labels": []}}"#;
        let err = RoutingTable::from_json(json).unwrap_err();
        assert!(matches!(
            err,
            Error::Routing(RoutingError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn test_json_round_trip_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("routes.json");
        let table = RoutingTable::default_table();
        std::fs::write(&path, table.to_json()).unwrap();
        assert_eq!(RoutingTable::from_path(&path).unwrap(), table);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = RoutingTable::from_path(Path::new("/nonexistent/routes.json")).unwrap_err();
        assert!(matches!(err, Error::Routing(RoutingError::Load { .. })));
    }

    #[test]
    fn test_in_priority_order() {
        let table = RoutingTable::default_table();
        let ordered = table.domains.in_priority_order(&[
            "learning".to_string(),
            "health".to_string(),
            "finance".to_string(),
        ]);
        assert_eq!(ordered, vec!["health", "finance", "learning"]);
    }
}
