//! Default rows written by `init`.

use crate::error::Result;
use crate::storage::schema::{EQUIPMENT_GROUPS, MEAL_TYPES};
use crate::storage::traits::{Filter, Record, Store};
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Equipment groups created for an area with none.
pub const DEFAULT_EQUIPMENT_GROUPS: &[(&str, &str)] = &[
    ("Home Gym", "Equipment kept at home"),
    ("Office", "Equipment kept at the office"),
    ("Gym", "Equipment at the commercial gym"),
    ("Outdoor", "Gear for outdoor training"),
];

/// Meal types created when the table is empty.
pub const DEFAULT_MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

/// Rows written by [`seed_defaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    /// Equipment groups inserted.
    pub equipment_groups: usize,
    /// Meal types inserted.
    pub meal_types: usize,
}

/// Inserts default equipment groups for `area` and default meal types,
/// skipping each set when rows already exist.
pub fn seed_defaults(store: &dyn Store, area: &str) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let existing = store.get_all(EQUIPMENT_GROUPS, &Filter::new().eq("area", area), Some(1))?;
    if existing.is_empty() {
        for (name, description) in DEFAULT_EQUIPMENT_GROUPS {
            store.insert_one(
                EQUIPMENT_GROUPS,
                to_record(&json!({
                    "group_name": name,
                    "description": description,
                    "area": area,
                })),
            )?;
            report.equipment_groups += 1;
        }
    }

    if store.get_all(MEAL_TYPES, &Filter::new(), Some(1))?.is_empty() {
        for name in DEFAULT_MEAL_TYPES {
            store.insert_one(MEAL_TYPES, to_record(&json!({ "name": name })))?;
            report.meal_types += 1;
        }
    }

    info!(
        area,
        groups = report.equipment_groups,
        meal_types = report.meal_types,
        "seeded defaults"
    );
    Ok(report)
}

fn to_record(value: &serde_json::Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    #[test]
    fn test_seed_once() {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();

        let first = seed_defaults(&store, "health").unwrap();
        assert_eq!(first.equipment_groups, DEFAULT_EQUIPMENT_GROUPS.len());
        assert_eq!(first.meal_types, DEFAULT_MEAL_TYPES.len());

        let second = seed_defaults(&store, "health").unwrap();
        assert_eq!(second, SeedReport::default());
    }

    #[test]
    fn test_seed_per_area() {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        seed_defaults(&store, "health").unwrap();

        let other = seed_defaults(&store, "work").unwrap();
        assert_eq!(other.equipment_groups, DEFAULT_EQUIPMENT_GROUPS.len());
        assert_eq!(other.meal_types, 0);
    }
}
