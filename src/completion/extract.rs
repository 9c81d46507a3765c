//! Typed field extraction.
//!
//! Structured writes never parse free-form model prose. The model is asked
//! for one JSON object matching an [`ExtractionSchema`]; the reply is parsed
//! and type-checked here, and a missing required field surfaces as a
//! [`ValidationError`] rather than a bad row.

use crate::completion::{Completion, Prompt};
use crate::core::Turn;
use crate::error::{Error, Result, ValidationError};
use crate::storage::Record;
use regex::Regex;
use serde_json::Value;
use std::fmt::Write;
use std::sync::OnceLock;

/// Value type of an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text.
    Text,
    /// Whole number; "350 kcal" yields 350.
    Integer,
}

/// One field to extract.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// JSON key.
    pub name: &'static str,
    /// Value type.
    pub kind: FieldKind,
    /// Whether extraction fails without it.
    pub required: bool,
    /// Hint shown to the model.
    pub description: &'static str,
}

/// Named set of fields.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionSchema {
    /// Schema name, reported in validation errors.
    pub name: &'static str,
    /// Fields in presentation order.
    pub fields: &'static [FieldSpec],
}

impl ExtractionSchema {
    /// Describes the expected JSON object for the model.
    #[must_use]
    pub fn instructions(&self) -> String {
        let mut output = String::from("Return ONLY a JSON object with these keys:\n");
        for field in self.fields {
            let kind = match field.kind {
                FieldKind::Text => "string",
                FieldKind::Integer => "integer",
            };
            let presence = if field.required { "required" } else { "optional" };
            let _ = writeln!(
                output,
                "- \"{}\" ({kind}, {presence}): {}",
                field.name, field.description
            );
        }
        output.push_str("Use null for anything the message does not state. Do not guess.");
        output
    }
}

/// Asks `completion` for the fields of `schema` found in `text`.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the reply holds no JSON object or a
/// required field is absent, and propagates completion failures.
pub fn extract_fields(
    completion: &dyn Completion,
    system: &str,
    text: &str,
    schema: &ExtractionSchema,
    history: &[Turn],
) -> Result<Record> {
    let prompt = Prompt::new(format!("{system}\n\n{}", schema.instructions()), text).json();
    let raw = completion.complete(&prompt, history)?;
    parse_fields(&raw, schema)
}

/// Parses and type-checks a model reply against `schema`.
///
/// Keys not in the schema are dropped; blank and null values count as absent.
///
/// # Errors
///
/// Returns [`ValidationError::Extraction`] when no JSON object is found and
/// [`ValidationError::MissingField`] for an absent required field.
pub fn parse_fields(raw: &str, schema: &ExtractionSchema) -> Result<Record> {
    let object = json_object(raw).ok_or_else(|| extraction("no JSON object in reply"))?;
    let parsed: Value =
        serde_json::from_str(object).map_err(|e| extraction(&format!("invalid JSON: {e}")))?;
    let Value::Object(mut map) = parsed else {
        return Err(extraction("reply is not a JSON object"));
    };

    let mut record = Record::new();
    for field in schema.fields {
        let value = map.remove(field.name).and_then(|v| coerce(field.kind, v));
        match value {
            Some(v) => {
                record.insert(field.name.to_string(), v);
            }
            None if field.required => {
                return Err(ValidationError::MissingField {
                    table: schema.name.to_string(),
                    field: field.name.to_string(),
                }
                .into());
            }
            None => {}
        }
    }
    Ok(record)
}

fn extraction(reason: &str) -> Error {
    ValidationError::Extraction {
        reason: reason.to_string(),
    }
    .into()
}

fn coerce(kind: FieldKind, value: Value) -> Option<Value> {
    match (kind, value) {
        (_, Value::Null) => None,
        (FieldKind::Text, Value::String(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| Value::String(s.to_string()))
        }
        (FieldKind::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
        (FieldKind::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(round_to_i64))
            .map(Value::from),
        (FieldKind::Integer, Value::String(s)) => first_integer(&s).map(Value::from),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_to_i64(f: f64) -> i64 {
    f.round() as i64
}

/// Locates the outermost JSON object, tolerating code fences and prose.
fn json_object(raw: &str) -> Option<&str> {
    static OBJECT: OnceLock<Option<Regex>> = OnceLock::new();
    OBJECT
        .get_or_init(|| Regex::new(r"(?s)\{.*\}").ok())
        .as_ref()
        .and_then(|re| re.find(raw))
        .map(|m| m.as_str())
}

fn first_integer(s: &str) -> Option<i64> {
    static INTEGER: OnceLock<Option<Regex>> = OnceLock::new();
    INTEGER
        .get_or_init(|| Regex::new(r"-?\d+").ok())
        .as_ref()
        .and_then(|re| re.find(s))
        .and_then(|m| m.as_str().parse().ok())
}
