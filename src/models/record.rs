//! Per-user tracker records (workouts and meals) and their field schemas.
//!
//! Both kinds share one shape: a required `date`, a required label column, a
//! set of optional numeric columns and optional free-text `notes`. What differs
//! between kinds is captured by a static [`RecordSchema`].

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;

/// Field schema and table binding of one record kind.
///
/// Table and column names are only ever taken from these constants when
/// building SQL, values are always bound as parameters.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordSchema {
    pub kind: &'static str,
    pub table: &'static str,
    pub label: &'static str,
    pub numeric: &'static [&'static str],
}

pub static WORKOUTS: RecordSchema = RecordSchema {
    kind: "workout",
    table: "workouts",
    label: "exercise",
    numeric: &["weight", "reps"],
};

pub static MEALS: RecordSchema = RecordSchema {
    kind: "meal",
    table: "meals",
    label: "food",
    numeric: &["calories", "protein", "carbs", "fat"],
};

impl RecordSchema {
    fn columns(&self) -> Vec<&'static str> {
        let mut columns = vec!["date", self.label];
        columns.extend_from_slice(self.numeric);
        columns.push("notes");
        columns
    }

    /// Dates are free text, so they are ordered bytewise regardless of the
    /// database collation.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT id, user_id, {}, created_at FROM {} WHERE user_id = $1 \
             ORDER BY date COLLATE \"C\" DESC, created_at DESC",
            self.columns().join(", "),
            self.table
        )
    }

    pub fn insert_sql(&self) -> String {
        let columns = self.columns();
        // id, user_id, created_at plus the mutable columns
        let placeholders: Vec<String> = (1..=columns.len() + 3).map(|i| format!("${i}")).collect();
        format!(
            "INSERT INTO {} (id, user_id, created_at, {}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    pub fn update_sql(&self) -> String {
        let columns = self.columns();
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE id = ${} AND user_id = ${}",
            self.table,
            assignments.join(", "),
            columns.len() + 1,
            columns.len() + 2
        )
    }

    pub fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", self.table)
    }

    fn required_message(&self) -> String {
        format!("date and {} required", self.label)
    }
}

/// The caller-editable part of a record, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFields {
    pub date: String,
    pub label: String,
    /// One slot per entry of `RecordSchema::numeric`, in the same order.
    pub metrics: Vec<Option<f64>>,
    pub notes: Option<String>,
}

impl RecordFields {
    /// Validates a JSON request body against `schema`.
    pub fn parse(schema: &RecordSchema, body: &Value) -> Result<Self, AppError> {
        let Value::Object(fields) = body else {
            return Err(AppError::Validation(schema.required_message()));
        };

        let date = required_text(fields.get("date"));
        let label = required_text(fields.get(schema.label));
        let (Some(date), Some(label)) = (date, label) else {
            return Err(AppError::Validation(schema.required_message()));
        };

        let metrics = schema
            .numeric
            .iter()
            .map(|name| {
                optional_number(fields.get(*name))
                    .ok_or_else(|| AppError::Validation(format!("{name} must be a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let notes = match fields.get("notes") {
            None | Some(Value::Null) => None,
            Some(Value::String(notes)) => Some(notes.clone()),
            Some(_) => return Err(AppError::Validation("notes must be text".into())),
        };

        Ok(Self { date, label, metrics, notes })
    }
}

fn required_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// `Some(None)` for an absent value, `Some(Some(n))` for a number, `None` when
/// the value is present but not numeric.
fn optional_number(value: Option<&Value>) -> Option<Option<f64>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(Value::Number(n)) => n.as_f64().map(Some),
        Some(Value::String(text)) if text.trim().is_empty() => Some(None),
        Some(Value::String(text)) => match text.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(Some(n)),
            _ => None,
        },
        Some(_) => None,
    }
}

/// A stored record of either kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub schema: &'static RecordSchema,
    pub id: Uuid,
    pub user_id: Uuid,
    pub fields: RecordFields,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(schema: &'static RecordSchema, user_id: Uuid, fields: RecordFields) -> Self {
        Self {
            schema,
            id: Uuid::new_v4(),
            user_id,
            fields,
            created_at: Utc::now(),
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.schema
            .numeric
            .iter()
            .position(|column| *column == name)
            .and_then(|i| self.fields.metrics.get(i).copied().flatten())
    }
}

/// Serializes with the kind's own column names, e.g. `exercise` and `weight`.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6 + self.schema.numeric.len()))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("user_id", &self.user_id)?;
        map.serialize_entry("date", &self.fields.date)?;
        map.serialize_entry(self.schema.label, &self.fields.label)?;
        for (name, value) in self.schema.numeric.iter().zip(&self.fields.metrics) {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("notes", &self.fields.notes)?;
        map.serialize_entry("created_at", &self.created_at)?;
        map.end()
    }
}
