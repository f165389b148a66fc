use std::fmt;

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as Json;
use tokio_postgres::types::{ToSql, Type};

use crate::error::{EngineError, EngineResult};

/// The engine's closed value classification, independent of the store's
/// native column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalType {
    Integer,
    Text,
    Boolean,
    Date,
    Json,
}

impl LogicalType {
    /// Postgres column type emitted by the DDL translator.
    pub fn store_type(&self) -> &'static str {
        match self {
            LogicalType::Integer => "INTEGER",
            LogicalType::Text => "TEXT",
            LogicalType::Boolean => "BOOLEAN",
            LogicalType::Date => "DATE",
            LogicalType::Json => "JSONB",
        }
    }

    /// Classify an `information_schema.columns.data_type` string back into a
    /// logical type. External columns with no logical counterpart read as
    /// Text so introspection never fails on them.
    pub fn from_store_type(data_type: &str) -> Self {
        match data_type {
            "smallint" | "integer" | "bigint" => LogicalType::Integer,
            "boolean" => LogicalType::Boolean,
            "date" => LogicalType::Date,
            "json" | "jsonb" => LogicalType::Json,
            _ => LogicalType::Text,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalType::Integer => "Integer",
            LogicalType::Text => "Text",
            LogicalType::Boolean => "Boolean",
            LogicalType::Date => "Date",
            LogicalType::Json => "Json",
        };
        write!(f, "{s}")
    }
}

/// A dynamically-typed cell value, carried end-to-end between the wire and
/// the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Json(Json),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render for error messages and display.
    pub fn display(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Json(j) => j.to_string(),
        }
    }

    /// Convert into a concretely-typed bound parameter for the given column
    /// type. Coercion has already guaranteed the tag matches, so the only
    /// decision left is which Postgres wire type a Null binds as.
    pub fn to_param(&self, ty: LogicalType) -> SqlParam {
        match (self, ty) {
            (Value::Null, LogicalType::Integer) => SqlParam::Int(None),
            (Value::Null, LogicalType::Text) => SqlParam::Text(None),
            (Value::Null, LogicalType::Boolean) => SqlParam::Bool(None),
            (Value::Null, LogicalType::Date) => SqlParam::Date(None),
            (Value::Null, LogicalType::Json) => SqlParam::Json(None),
            (Value::Integer(i), _) => SqlParam::Int(Some(*i as i32)),
            (Value::Text(s), _) => SqlParam::Text(Some(s.clone())),
            (Value::Boolean(b), _) => SqlParam::Bool(Some(*b)),
            (Value::Date(d), _) => SqlParam::Date(Some(*d)),
            (Value::Json(j), _) => SqlParam::Json(Some(j.clone())),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Value::Json(j) => j.serialize(serializer),
        }
    }
}

/// A bound statement parameter with a concrete Postgres wire type.
///
/// Each variant wraps an `Option` so NULLs bind with the column's own type;
/// `tokio_postgres` already implements `ToSql` for every wrapped type.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Int(Option<i32>),
    BigInt(Option<i64>),
    Text(Option<String>),
    Bool(Option<bool>),
    Date(Option<NaiveDate>),
    Json(Option<Json>),
}

impl SqlParam {
    pub fn as_dyn(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Int(v) => v,
            SqlParam::BigInt(v) => v,
            SqlParam::Text(v) => v,
            SqlParam::Bool(v) => v,
            SqlParam::Date(v) => v,
            SqlParam::Json(v) => v,
        }
    }
}

/// Borrow a parameter list in the form `Client::query` expects.
pub fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(SqlParam::as_dyn).collect()
}

/// Coerce a raw wire value into the column's logical type.
///
/// Raw values arrive as JSON (form fields are usually strings regardless of
/// the column type, so string renditions are accepted for every tag). An
/// empty or absent value coerces to Null; the caller decides whether that
/// means "omit" (insert) or "set NULL" (update).
pub fn coerce(column: &str, ty: LogicalType, raw: &Json) -> EngineResult<Value> {
    let mismatch = || EngineError::TypeMismatch {
        column: column.to_string(),
        expected: ty,
        value: raw.to_string(),
    };

    match raw {
        Json::Null => return Ok(Value::Null),
        Json::String(s) if s.trim().is_empty() => return Ok(Value::Null),
        _ => {}
    }

    match ty {
        LogicalType::Integer => {
            let n = match raw {
                Json::Number(n) => n.as_i64().ok_or_else(mismatch)?,
                Json::String(s) => s.trim().parse::<i64>().map_err(|_| mismatch())?,
                _ => return Err(mismatch()),
            };
            // INTEGER columns are 32-bit; reject overflow here rather than
            // at the wire
            i32::try_from(n).map_err(|_| mismatch())?;
            Ok(Value::Integer(n))
        }
        LogicalType::Boolean => match raw {
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
        LogicalType::Date => match raw {
            Json::String(s) => parse_date(s.trim()).ok_or_else(mismatch).map(Value::Date),
            _ => Err(mismatch()),
        },
        LogicalType::Json => match raw {
            // structured payloads pass through; text must itself be valid
            // JSON, never stored as a bare string
            Json::Object(_) | Json::Array(_) => Ok(Value::Json(raw.clone())),
            Json::String(s) => serde_json::from_str::<Json>(s)
                .map(Value::Json)
                .map_err(|_| mismatch()),
            _ => Ok(Value::Json(raw.clone())),
        },
        LogicalType::Text => match raw {
            Json::String(s) => Ok(Value::Text(s.clone())),
            Json::Number(n) => Ok(Value::Text(n.to_string())),
            Json::Bool(b) => Ok(Value::Text(b.to_string())),
            _ => Err(mismatch()),
        },
    }
}

/// Accepts ISO `YYYY-MM-DD` or `DD/MM/YYYY`; the latter normalizes to ISO.
/// Both forms must be exactly ten characters, so two-digit years are
/// rejected rather than guessed.
fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 10 {
        return None;
    }
    if s.contains('/') {
        NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }
}

/// Extract a store result cell back into the value model.
///
/// Matches on the column's wire type the same way results are decoded
/// elsewhere in the crate; anything outside the engine's five logical types
/// falls back to its text rendition.
pub fn from_store_cell(row: &tokio_postgres::Row, idx: usize) -> Value {
    let pg_type = row.columns()[idx].type_();
    match *pg_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Boolean)
            .unwrap_or(Value::Null),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Integer(v as i64))
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Integer(v as i64))
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Integer)
            .unwrap_or(Value::Null),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(Value::Date)
            .unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Json>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Text(v.to_string()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}

/// A result row: ordered column/value pairs, serialized as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new(cells: Vec<(String, Value)>) -> Self {
        Self { cells }
    }

    /// Decode every column of a store result row. Projection aliases (join
    /// disambiguation) have already been applied by the store, so the result
    /// columns carry their final names.
    pub fn from_store(row: &tokio_postgres::Row) -> Self {
        let cells = row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| (col.name().to_string(), from_store_cell(row, i)))
            .collect();
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
