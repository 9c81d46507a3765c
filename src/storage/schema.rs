//! Database schema definitions.
//!
//! Contains the SQL schema and the column catalogue used to validate
//! writes before they reach `SQLite`.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Named places equipment lives in, scoped by area
CREATE TABLE IF NOT EXISTS equipment_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_name TEXT NOT NULL,
    description TEXT,
    area TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_equipment_groups_area ON equipment_groups(area);

-- Individual pieces of equipment
CREATE TABLE IF NOT EXISTS equipment_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_name TEXT NOT NULL,
    item_description TEXT,
    equipment_group INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (equipment_group) REFERENCES equipment_groups(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_equipment_items_group ON equipment_items(equipment_group);

-- Meals eaten
CREATE TABLE IF NOT EXISTS food_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meal_details TEXT NOT NULL,
    calories INTEGER,
    protein INTEGER,
    carbs INTEGER,
    fats INTEGER,
    meal_time INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_food_log_time ON food_log(meal_time);

-- Goals, scoped by area
CREATE TABLE IF NOT EXISTS goals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    area TEXT NOT NULL,
    status TEXT,
    created_at INTEGER NOT NULL
);

-- Meal categories
CREATE TABLE IF NOT EXISTS meal_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Saved recipes
CREATE TABLE IF NOT EXISTS cookbook (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipe_name TEXT NOT NULL,
    meal_type INTEGER,
    ingredients TEXT,
    instructions TEXT,
    calories INTEGER,
    FOREIGN KEY (meal_type) REFERENCES meal_types(id) ON DELETE SET NULL
);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// SQL to delete every row while keeping the schema.
pub const RESET_SQL: &str = r"
DELETE FROM equipment_items;
DELETE FROM equipment_groups;
DELETE FROM food_log;
DELETE FROM goals;
DELETE FROM cookbook;
DELETE FROM meal_types;
";

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `TEXT`.
    Text,
    /// `INTEGER`.
    Integer,
}

impl ColumnKind {
    /// Human-readable type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Storage class.
    pub kind: ColumnKind,
    /// Must be present and non-blank on insert.
    pub required: bool,
    /// Filled with the current time when omitted.
    pub auto_now: bool,
    /// Table whose `id` this column references.
    pub references: Option<&'static str>,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        name,
        kind,
        required: false,
        auto_now: false,
        references: None,
    }
}

const fn required(name: &'static str, kind: ColumnKind) -> Column {
    Column {
        required: true,
        ..col(name, kind)
    }
}

const fn timestamp(name: &'static str) -> Column {
    Column {
        required: true,
        auto_now: true,
        ..col(name, ColumnKind::Integer)
    }
}

const fn reference(name: &'static str, table: &'static str, is_required: bool) -> Column {
    Column {
        required: is_required,
        references: Some(table),
        ..col(name, ColumnKind::Integer)
    }
}

/// A table the store exposes.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Table name.
    pub name: &'static str,
    /// Columns other than `id`.
    pub columns: &'static [Column],
}

impl TableSpec {
    /// Looks up a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `id` followed by every declared column, comma-separated.
    #[must_use]
    pub fn select_list(&self) -> String {
        std::iter::once("id")
            .chain(self.columns.iter().map(|c| c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Equipment groups table name.
pub const EQUIPMENT_GROUPS: &str = "equipment_groups";
/// Equipment items table name.
pub const EQUIPMENT_ITEMS: &str = "equipment_items";
/// Food log table name.
pub const FOOD_LOG: &str = "food_log";
/// Goals table name.
pub const GOALS: &str = "goals";
/// Meal types table name.
pub const MEAL_TYPES: &str = "meal_types";
/// Cookbook table name.
pub const COOKBOOK: &str = "cookbook";

/// Every table, in dependency order.
pub const TABLES: &[TableSpec] = &[
    TableSpec {
        name: EQUIPMENT_GROUPS,
        columns: &[
            required("group_name", ColumnKind::Text),
            col("description", ColumnKind::Text),
            required("area", ColumnKind::Text),
            timestamp("created_at"),
        ],
    },
    TableSpec {
        name: EQUIPMENT_ITEMS,
        columns: &[
            required("item_name", ColumnKind::Text),
            col("item_description", ColumnKind::Text),
            reference("equipment_group", EQUIPMENT_GROUPS, true),
            timestamp("created_at"),
        ],
    },
    TableSpec {
        name: FOOD_LOG,
        columns: &[
            required("meal_details", ColumnKind::Text),
            col("calories", ColumnKind::Integer),
            col("protein", ColumnKind::Integer),
            col("carbs", ColumnKind::Integer),
            col("fats", ColumnKind::Integer),
            timestamp("meal_time"),
        ],
    },
    TableSpec {
        name: GOALS,
        columns: &[
            required("description", ColumnKind::Text),
            required("area", ColumnKind::Text),
            col("status", ColumnKind::Text),
            timestamp("created_at"),
        ],
    },
    TableSpec {
        name: MEAL_TYPES,
        columns: &[required("name", ColumnKind::Text)],
    },
    TableSpec {
        name: COOKBOOK,
        columns: &[
            required("recipe_name", ColumnKind::Text),
            reference("meal_type", MEAL_TYPES, false),
            col("ingredients", ColumnKind::Text),
            col("instructions", ColumnKind::Text),
            col("calories", ColumnKind::Integer),
        ],
    },
];

/// Looks up a table by name.
#[must_use]
pub fn table_spec(name: &str) -> Option<&'static TableSpec> {
    TABLES.iter().find(|t| t.name == name)
}
