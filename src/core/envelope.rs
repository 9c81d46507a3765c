//! Reply envelopes and provenance metadata.
//!
//! An envelope is built bottom-up. Each level keeps what the level below
//! wrote (nested under [`keys::DOMAIN_METADATA`] when lifted past a domain)
//! and adds its own keys.

use serde::Serialize;
use serde_json::{Map, Value};

/// String-keyed JSON metadata attached to every reply.
pub type Metadata = Map<String, Value>;

/// Well-known metadata keys.
pub mod keys {
    /// Deepest node that produced the reply text.
    pub const HANDLED_BY: &str = "handled_by";
    /// Node the reporting level forwarded to (or itself).
    pub const ROUTED_TO: &str = "routed_to";
    /// Domain label that owns the reply.
    pub const DOMAIN: &str = "domain";
    /// `direct`, `single_domain`, or `multi_domain`.
    pub const COORDINATION_TYPE: &str = "coordination_type";
    /// Metadata produced below a domain manager.
    pub const DOMAIN_METADATA: &str = "domain_metadata";
    /// Domains consulted by a multi-domain reply, in priority order.
    pub const INVOLVED_DOMAINS: &str = "involved_domains";
    /// Per-domain reply and metadata for a multi-domain reply.
    pub const DOMAIN_RESPONSES: &str = "domain_responses";
    /// Set when an external call failed somewhere below.
    pub const ERROR: &str = "error";
    /// Set when the reply is a clarifying question.
    pub const NEEDS_CLARIFICATION: &str = "needs_clarification";
    /// Equipment write flag.
    pub const EQUIPMENT_ADDED: &str = "equipment_added";
    /// Meal log write flag.
    pub const MEAL_LOGGED: &str = "meal_logged";
}

/// Final reply plus provenance metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    /// Reply text.
    pub reply: String,
    /// Provenance and flags.
    pub metadata: Metadata,
}

impl ResponseEnvelope {
    /// Creates an envelope with empty metadata.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            metadata: Metadata::new(),
        }
    }

    /// Sets a metadata key, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Reads a string-valued metadata key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Reads a boolean metadata key, treating absence as false.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Splits into reply text and metadata.
    #[must_use]
    pub fn into_parts(self) -> (String, Metadata) {
        (self.reply, self.metadata)
    }
}

/// Reads a boolean from `metadata[key]`, treating absence as false.
#[must_use]
pub fn flag(metadata: &Metadata, key: &str) -> bool {
    metadata.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Reads a boolean from `metadata["domain_metadata"][key]`.
#[must_use]
pub fn nested_flag(metadata: &Metadata, key: &str) -> bool {
    metadata
        .get(keys::DOMAIN_METADATA)
        .and_then(Value::as_object)
        .is_some_and(|inner| flag(inner, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_overwrites() {
        let env = ResponseEnvelope::new("hi")
            .with(keys::ROUTED_TO, "health")
            .with(keys::ROUTED_TO, "equipment");
        assert_eq!(env.get_str(keys::ROUTED_TO), Some("equipment"));
    }

    #[test]
    fn test_flags() {
        let env = ResponseEnvelope::new("x").with(keys::ERROR, true);
        assert!(env.flag(keys::ERROR));
        assert!(!env.flag(keys::MEAL_LOGGED));
    }

    #[test]
    fn test_nested_flag() {
        let mut metadata = Metadata::new();
        metadata.insert(
            keys::DOMAIN_METADATA.to_string(),
            json!({ "equipment_added": true }),
        );
        assert!(nested_flag(&metadata, keys::EQUIPMENT_ADDED));
        assert!(!nested_flag(&metadata, keys::MEAL_LOGGED));
    }
}
