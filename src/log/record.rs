//! Record definitions
//!
//! A record is a JSON object with a mandatory non-negative integer `id`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OffsetDbError, Result};

/// Record key
pub type RecordId = u64;

/// Name of the mandatory key field
pub const ID_FIELD: &str = "id";

/// A single record: an open-ended JSON object with a canonical numeric `id`
///
/// Construction always goes through validation, so `id()` never fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record holding only an id
    pub fn new(id: RecordId) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), Value::from(id));
        Self { fields }
    }

    /// Validate a JSON value as a record.
    ///
    /// The value must be an object with an `id` that is either a
    /// non-negative integer or a decimal string; string ids are rewritten
    /// as numbers.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(OffsetDbError::Validation(format!(
                "record must be a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }

    /// Validate a field map as a record
    pub fn from_map(mut fields: Map<String, Value>) -> Result<Self> {
        let raw = fields
            .get(ID_FIELD)
            .ok_or_else(|| OffsetDbError::Validation("record id is required".to_string()))?;

        let id = parse_id(raw).ok_or_else(|| {
            OffsetDbError::Validation(format!(
                "record id must be a non-negative integer, got {}",
                raw
            ))
        })?;

        fields.insert(ID_FIELD.to_string(), Value::from(id));
        Ok(Self { fields })
    }

    /// Merge `partial` under `id`. The given id always wins over any id
    /// carried by `partial`.
    pub fn merged(id: RecordId, mut partial: Map<String, Value>) -> Self {
        partial.insert(ID_FIELD.to_string(), Value::from(id));
        Self { fields: partial }
    }

    /// The record's id
    pub fn id(&self) -> RecordId {
        self.fields
            .get(ID_FIELD)
            .and_then(Value::as_u64)
            .unwrap_or_default()
    }

    /// Get a field by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field. Setting `id` is ignored.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        if field != ID_FIELD {
            self.fields.insert(field, value.into());
        }
        self
    }

    /// Convert into a plain JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Serialize as one log line: compact JSON followed by `\n`.
    ///
    /// Compact output keeps the key as a contiguous `"id":<n>` token.
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(&self.fields)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parse one log line (without its trailing newline)
    pub fn parse_line(line: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(line)?;
        Self::from_value(value)
    }
}

impl TryFrom<Value> for Record {
    type Error = OffsetDbError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// Read an id out of a JSON value: a non-negative integer or a decimal string
pub fn parse_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        }
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
