//! `SQLite` storage implementation.
//!
//! Writes are validated against the column catalogue in
//! [`crate::storage::schema`] inside the same transaction that performs the
//! insert, so a rejected row leaves the database untouched.

// SQLite stores all integers as i64. Counts are non-negative and fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::core::message::now;
use crate::error::{Result, StorageError, ValidationError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, Column, ColumnKind, GET_VERSION_SQL, RESET_SQL,
    SCHEMA_SQL, SET_VERSION_SQL, TABLES, TableSpec, table_spec,
};
use crate::storage::traits::{Filter, Record, Store, StoreStats};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-based store.
///
/// # Examples
///
/// ```no_run
/// use director_rs::storage::{SqliteStore, Store};
///
/// let store = SqliteStore::open("director.db").unwrap();
/// store.init().unwrap();
/// ```
pub struct SqliteStore {
    /// `SQLite` connection.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        // journal_mode returns a row, so it needs query_row
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database.
    ///
    /// Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Transaction("connection lock poisoned".to_string()).into())
    }

    fn schema_version(conn: &Connection) -> Result<Option<u32>> {
        let version: Option<String> = conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn spec(table: &str) -> Result<&'static TableSpec> {
        table_spec(table).ok_or_else(|| {
            StorageError::UnknownTable {
                name: table.to_string(),
            }
            .into()
        })
    }
}

impl Store for SqliteStore {
    fn init(&self) -> Result<()> {
        let conn = self.lock()?;
        let is_init: i64 = conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            conn.execute_batch(SCHEMA_SQL)
                .map_err(|e| StorageError::Migration(e.to_string()))?;
            conn.execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
                .map_err(StorageError::from)?;
            debug!(version = CURRENT_SCHEMA_VERSION, "created schema");
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(RESET_SQL).map_err(StorageError::from)?;
        Ok(())
    }

    fn get_all(&self, table: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<Record>> {
        let spec = Self::spec(table)?;

        let mut sql = format!("SELECT {} FROM {}", spec.select_list(), spec.name);
        let mut values = Vec::with_capacity(filter.conditions().len());
        for (i, (column, condition)) in filter.conditions().iter().enumerate() {
            if column != "id" && spec.column(column).is_none() {
                return Err(ValidationError::UnknownField {
                    table: table.to_string(),
                    field: column.clone(),
                }
                .into());
            }
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("{column} {} ?", condition.operator()));
            values.push(to_sql(condition.value()));
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| read_record(spec, row))
            .map_err(StorageError::from)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(StorageError::from)?);
        }
        Ok(records)
    }

    fn insert_one(&self, table: &str, fields: Record) -> Result<Record> {
        let spec = Self::spec(table)?;
        let row = validate_fields(spec, fields)?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        check_references(&tx, spec, &row)?;

        let columns: Vec<&str> = row.iter().map(|(c, _)| c.name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            spec.name,
            columns.join(", ")
        );
        tx.execute(&sql, params_from_iter(row.iter().map(|(_, v)| v.clone())))
            .map_err(StorageError::from)?;
        let id = tx.last_insert_rowid();

        let select = format!("SELECT {} FROM {} WHERE id = ?", spec.select_list(), spec.name);
        let record = tx
            .query_row(&select, params![id], |r| read_record(spec, r))
            .map_err(StorageError::from)?;

        tx.commit()
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        debug!(table = spec.name, id, "inserted row");
        Ok(record)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let mut row_counts = std::collections::BTreeMap::new();
        for spec in TABLES {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", spec.name), [], |row| {
                    row.get(0)
                })
                .map_err(StorageError::from)?;
            row_counts.insert(spec.name.to_string(), count as usize);
        }

        let schema_version = Self::schema_version(&conn)?.unwrap_or(0);

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StoreStats {
            row_counts,
            schema_version,
            db_size,
        })
    }
}

/// Checks names, types and required columns; fills timestamp columns.
///
/// Returns the row as `(column, value)` pairs in catalogue order.
fn validate_fields(spec: &TableSpec, mut fields: Record) -> Result<Vec<(&Column, SqlValue)>> {
    if let Some(unknown) = fields.keys().find(|k| spec.column(k).is_none()) {
        return Err(ValidationError::UnknownField {
            table: spec.name.to_string(),
            field: unknown.clone(),
        }
        .into());
    }

    let mut row = Vec::with_capacity(spec.columns.len());
    for column in spec.columns {
        let value = match fields.remove(column.name) {
            Some(v) if !is_blank(&v) => Some(coerce(spec, column, v)?),
            _ if column.auto_now => Some(SqlValue::Integer(now())),
            _ => None,
        };
        match value {
            Some(v) => row.push((column, v)),
            None if column.required => {
                return Err(ValidationError::MissingField {
                    table: spec.name.to_string(),
                    field: column.name.to_string(),
                }
                .into());
            }
            None => {}
        }
    }
    Ok(row)
}

fn check_references(tx: &Transaction<'_>, spec: &TableSpec, row: &[(&Column, SqlValue)]) -> Result<()> {
    for (column, value) in row {
        let Some(target) = column.references else {
            continue;
        };
        let exists: i64 = tx
            .query_row(
                &format!("SELECT COUNT(*) FROM {target} WHERE id = ?"),
                params![value],
                |r| r.get(0),
            )
            .map_err(StorageError::from)?;
        if exists == 0 {
            return Err(ValidationError::UnresolvedReference {
                table: spec.name.to_string(),
                field: column.name.to_string(),
                value: display_sql(value),
            }
            .into());
        }
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce(spec: &TableSpec, column: &Column, value: Value) -> Result<SqlValue> {
    let wrong_type = || ValidationError::WrongType {
        table: spec.name.to_string(),
        field: column.name.to_string(),
        expected: column.kind.name().to_string(),
    };
    let coerced = match (column.kind, value) {
        (ColumnKind::Text, Value::String(s)) => SqlValue::Text(s.trim().to_string()),
        (ColumnKind::Text, Value::Number(n)) => SqlValue::Text(n.to_string()),
        (ColumnKind::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(SqlValue::Integer)
            .ok_or_else(wrong_type)?,
        (ColumnKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|_| wrong_type())?,
        _ => return Err(wrong_type().into()),
    };
    Ok(coerced)
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn display_sql(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "null".to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

fn read_record(spec: &TableSpec, row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    let names = std::iter::once("id").chain(spec.columns.iter().map(|c| c.name));
    for (i, name) in names.enumerate() {
        let value: SqlValue = row.get(i)?;
        let json = match value {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::from(n),
            SqlValue::Real(f) => Value::from(f),
            SqlValue::Text(s) => Value::String(s),
            SqlValue::Blob(_) => Value::Null,
        };
        record.insert(name.to_string(), json);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::schema::{COOKBOOK, EQUIPMENT_GROUPS, EQUIPMENT_ITEMS, FOOD_LOG};
    use serde_json::json;

    fn setup() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn add_group(store: &SqliteStore, name: &str) -> i64 {
        let row = store
            .insert_one(
                EQUIPMENT_GROUPS,
                record(json!({ "group_name": name, "area": "health" })),
            )
            .unwrap();
        row["id"].as_i64().unwrap()
    }

    #[test]
    fn test_init() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.is_initialized().unwrap());
        assert!(store.init().is_ok());
        assert!(store.is_initialized().unwrap());
    }

    #[test]
    fn test_init_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.init().is_ok());
        assert!(store.init().is_ok()); // Second init should be fine
        assert_eq!(store.stats().unwrap().schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_insert_and_get_all() {
        let store = setup();
        let group = add_group(&store, "Home Gym");

        let item = store
            .insert_one(
                EQUIPMENT_ITEMS,
                record(json!({
                    "item_name": "Kettlebell",
                    "item_description": "16kg",
                    "equipment_group": group,
                })),
            )
            .unwrap();
        assert_eq!(item["item_name"], "Kettlebell");
        assert!(item["created_at"].as_i64().unwrap() > 0);

        let items = store
            .get_all(
                EQUIPMENT_ITEMS,
                &Filter::new().eq("equipment_group", group),
                None,
            )
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], item["id"]);
    }

    #[test]
    fn test_missing_required_field_writes_nothing() {
        let store = setup();
        let group = add_group(&store, "Home Gym");

        let err = store
            .insert_one(
                EQUIPMENT_ITEMS,
                record(json!({ "item_name": "  ", "equipment_group": group })),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MissingField { ref field, .. }) if field == "item_name"
        ));
        assert!(store.get_all(EQUIPMENT_ITEMS, &Filter::new(), None).unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_reference_writes_nothing() {
        let store = setup();
        let err = store
            .insert_one(
                EQUIPMENT_ITEMS,
                record(json!({ "item_name": "Bench", "equipment_group": 42 })),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnresolvedReference { .. })
        ));
        assert_eq!(store.stats().unwrap().row_counts[EQUIPMENT_ITEMS], 0);
    }

    #[test]
    fn test_optional_reference_may_be_absent() {
        let store = setup();
        let recipe = store
            .insert_one(COOKBOOK, record(json!({ "recipe_name": "Oats" })))
            .unwrap();
        assert_eq!(recipe["meal_type"], Value::Null);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let store = setup();
        let err = store
            .insert_one(
                EQUIPMENT_GROUPS,
                record(json!({ "group_name": "X", "area": "health", "colour": "red" })),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_integer_coercion() {
        let store = setup();
        let row = store
            .insert_one(
                FOOD_LOG,
                record(json!({ "meal_details": "Eggs", "calories": "320", "protein": 21.6 })),
            )
            .unwrap();
        assert_eq!(row["calories"], 320);
        assert_eq!(row["protein"], 22);

        let err = store
            .insert_one(
                FOOD_LOG,
                record(json!({ "meal_details": "Eggs", "calories": "lots" })),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_filters_and_limit() {
        let store = setup();
        for name in ["A", "B", "C"] {
            add_group(&store, name);
        }
        store
            .insert_one(
                EQUIPMENT_GROUPS,
                record(json!({ "group_name": "Desk", "area": "work" })),
            )
            .unwrap();

        let health = store
            .get_all(EQUIPMENT_GROUPS, &Filter::new().eq("area", "health"), None)
            .unwrap();
        assert_eq!(health.len(), 3);

        let limited = store
            .get_all(EQUIPMENT_GROUPS, &Filter::new(), Some(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0]["group_name"], "A");

        let tail = store
            .get_all(EQUIPMENT_GROUPS, &Filter::new().gte("id", 3), None)
            .unwrap();
        assert_eq!(tail.len(), 2);
    }

    #[test]
    fn test_unknown_table_and_column() {
        let store = setup();
        assert!(matches!(
            store.get_all("widgets", &Filter::new(), None).unwrap_err(),
            Error::Storage(StorageError::UnknownTable { .. })
        ));
        assert!(matches!(
            store
                .get_all(EQUIPMENT_GROUPS, &Filter::new().eq("bogus", 1), None)
                .unwrap_err(),
            Error::Validation(ValidationError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_reset() {
        let store = setup();
        add_group(&store, "Gym");
        store.reset().unwrap();
        assert!(store.is_initialized().unwrap());
        assert_eq!(store.stats().unwrap().row_counts[EQUIPMENT_GROUPS], 0);
    }

    #[test]
    fn test_open_file_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("director.db");
        let store = SqliteStore::open(&path).unwrap();
        store.init().unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert!(store.stats().unwrap().db_size.is_some());
    }
}
