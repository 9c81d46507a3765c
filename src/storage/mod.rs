//! Storage layer for director-rs.
//!
//! A relational row store reached only through [`Store::get_all`] and
//! [`Store::insert_one`], backed by `SQLite`.

pub mod schema;
pub mod seed;
pub mod sqlite;
pub mod traits;

pub use schema::{
    COOKBOOK, CURRENT_SCHEMA_VERSION, EQUIPMENT_GROUPS, EQUIPMENT_ITEMS, FOOD_LOG, GOALS,
    MEAL_TYPES, SCHEMA_SQL, TABLES, table_spec,
};
pub use seed::{SeedReport, seed_defaults};
pub use sqlite::SqliteStore;
pub use traits::{Condition, Filter, Record, Store, StoreStats, record_i64, record_str};

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".director/director.db";
