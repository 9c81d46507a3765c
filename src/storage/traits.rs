//! Store trait definition.
//!
//! The routing core only ever reads with [`Store::get_all`] and writes with
//! [`Store::insert_one`]; rows travel as JSON objects.

use crate::error::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A row, keyed by column name. Always carries an integer `id` when read back.
pub type Record = Map<String, Value>;

/// Comparison applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`.
    Eq(Value),
    /// `column >= value`.
    Gte(Value),
}

impl Condition {
    pub(crate) const fn operator(&self) -> &'static str {
        match self {
            Self::Eq(_) => "=",
            Self::Gte(_) => ">=",
        }
    }

    pub(crate) const fn value(&self) -> &Value {
        match self {
            Self::Eq(v) | Self::Gte(v) => v,
        }
    }
}

/// Conjunction of column conditions.
///
/// # Examples
///
/// ```
/// use director_rs::storage::Filter;
///
/// let filter = Filter::new().eq("area", "health").gte("created_at", 0);
/// assert_eq!(filter.conditions().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    /// Matches every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push((column.to_string(), Condition::Eq(value.into())));
        self
    }

    /// Adds a greater-or-equal condition.
    #[must_use]
    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push((column.to_string(), Condition::Gte(value.into())));
        self
    }

    /// The conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }
}

/// Trait for row-store backends.
///
/// Implementations are shared by every node of the hierarchy, so all
/// methods take `&self` and serialize access internally.
pub trait Store: Send + Sync {
    /// Initializes storage (creates schema).
    ///
    /// Should be idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    fn init(&self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Deletes all rows but preserves the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&self) -> Result<()>;

    /// Reads rows of `table` matching `filter`, ordered by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StorageError::UnknownTable`] for an unknown
    /// table, or a validation error for a filter on an unknown column.
    fn get_all(&self, table: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<Record>>;

    /// Inserts one row and returns it as stored (with `id`).
    ///
    /// Nothing is written when validation fails.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::ValidationError`] for a missing required
    /// field, an unknown field, a value of the wrong type, or a reference to
    /// a row that does not exist.
    fn insert_one(&self, table: &str, fields: Record) -> Result<Record>;

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be computed.
    fn stats(&self) -> Result<StoreStats>;
}

/// Storage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Row count per table.
    pub row_counts: BTreeMap<String, usize>,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}

/// Reads an integer column from a record.
#[must_use]
pub fn record_i64(record: &Record, column: &str) -> Option<i64> {
    record.get(column).and_then(Value::as_i64)
}

/// Reads a text column from a record.
#[must_use]
pub fn record_str<'a>(record: &'a Record, column: &str) -> Option<&'a str> {
    record.get(column).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_builder() {
        let filter = Filter::new().eq("area", "health").gte("meal_time", 100);
        let conditions = filter.conditions();
        assert_eq!(conditions[0].0, "area");
        assert_eq!(conditions[0].1.operator(), "=");
        assert_eq!(conditions[1].1.operator(), ">=");
        assert_eq!(conditions[1].1.value(), &json!(100));
    }

    #[test]
    fn test_record_accessors() {
        let mut record = Record::new();
        record.insert("id".to_string(), json!(7));
        record.insert("item_name".to_string(), json!("Kettlebell"));
        assert_eq!(record_i64(&record, "id"), Some(7));
        assert_eq!(record_str(&record, "item_name"), Some("Kettlebell"));
        assert_eq!(record_str(&record, "id"), None);
    }
}
