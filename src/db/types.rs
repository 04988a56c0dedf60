//! Column decoding for result rows.
//!
//! Rows are turned into [`Row`] values (ordered JSON objects) before they are
//! mapped onto the caller's type, so decoding is done once here for every
//! backend.
//!
//! # Architecture
//!
//! Decoding is two-phase:
//! 1. `categorize_type` classifies the column's declared type name
//! 2. `decode_common` extracts the value with the Rust type for that category
//!
//! MySQL adds unsigned integers on top of the shared categories.

use crate::models::Row;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, ColumnIndex, Decode, Row as _, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    /// MySQL `... UNSIGNED` integers
    Unsigned,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Date,
    Time,
    /// Timestamp without time zone
    DateTime,
    /// Timestamp with time zone (PostgreSQL `TIMESTAMPTZ`)
    DateTimeTz,
    /// Untyped `NULL` literal column (MySQL reports these as `NULL`)
    Null,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_ascii_lowercase();
    let mut words = lower.split_whitespace();
    let base = words.next().unwrap_or("");
    let unsigned = words.any(|w| w == "unsigned");

    match base {
        "bool" | "boolean" => TypeCategory::Boolean,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "year" | "oid" => {
            if unsigned {
                TypeCategory::Unsigned
            } else {
                TypeCategory::Integer
            }
        }
        "decimal" | "numeric" => TypeCategory::Decimal,
        "float" | "double" | "real" | "float4" | "float8" => TypeCategory::Float,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "date" => TypeCategory::Date,
        "time" => TypeCategory::Time,
        "datetime" | "timestamp" => TypeCategory::DateTime,
        "timestamptz" => TypeCategory::DateTimeTz,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" | "bytea"
        | "bit" => TypeCategory::Binary,
        "null" | "void" => TypeCategory::Null,
        _ => TypeCategory::Text,
    }
}

/// Encode binary data as a JSON string.
///
/// Bytes that are valid UTF-8 become text only when `prefer_text` is set;
/// everything else is base64.
pub fn encode_binary(bytes: &[u8], prefer_text: bool) -> JsonValue {
    if prefer_text {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return JsonValue::String(s.to_string());
        }
    }
    JsonValue::String(STANDARD.encode(bytes))
}

/// Trait for converting driver rows to [`Row`] values.
pub trait JsonRow {
    fn to_json_row(&self) -> Row;
}

impl JsonRow for MySqlRow {
    fn to_json_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let value = match categorize_type(col.type_info().name()) {
                    TypeCategory::Unsigned => decode(self, idx, |v: u64| JsonValue::from(v)),
                    category => decode_common(self, idx, category),
                };
                (col.name().to_string(), value.unwrap_or(JsonValue::Null))
            })
            .collect()
    }
}

impl JsonRow for PgRow {
    fn to_json_row(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                let value = decode_common(self, idx, category);
                (col.name().to_string(), value.unwrap_or(JsonValue::Null))
            })
            .collect()
    }
}

/// Decode one column as `V`. `None` means `V` does not fit the column.
fn decode<'r, R, V>(
    row: &'r R,
    idx: usize,
    to_json: impl FnOnce(V) -> JsonValue,
) -> Option<JsonValue>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    V: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get::<Option<V>, _>(idx) {
        Ok(Some(v)) => Some(to_json(v)),
        Ok(None) => Some(JsonValue::Null),
        Err(e) => {
            tracing::trace!(column = idx, error = %e, "Column decode attempt failed");
            None
        }
    }
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// DECIMAL/NUMERIC as a JSON number: an integer when the value has no
/// fractional part and fits `i64`, otherwise the nearest `f64`. Only values
/// outside the `f64` range stay text.
pub fn decimal_json(v: Decimal) -> JsonValue {
    if v.fract().is_zero() {
        if let Some(i) = v.to_i64() {
            return JsonValue::from(i);
        }
    }
    v.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn decode_common<'r, R>(row: &'r R, idx: usize, category: TypeCategory) -> Option<JsonValue>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    bool: Decode<'r, R::Database> + Type<R::Database>,
    i16: Decode<'r, R::Database> + Type<R::Database>,
    i32: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    f32: Decode<'r, R::Database> + Type<R::Database>,
    f64: Decode<'r, R::Database> + Type<R::Database>,
    Decimal: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
    JsonValue: Decode<'r, R::Database> + Type<R::Database>,
    uuid::Uuid: Decode<'r, R::Database> + Type<R::Database>,
    NaiveDate: Decode<'r, R::Database> + Type<R::Database>,
    NaiveTime: Decode<'r, R::Database> + Type<R::Database>,
    NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    let decoded = match category {
        TypeCategory::Null => Some(JsonValue::Null),
        TypeCategory::Boolean => decode(row, idx, JsonValue::Bool)
            .or_else(|| decode(row, idx, |v: i64| JsonValue::Bool(v != 0))),
        TypeCategory::Integer | TypeCategory::Unsigned => {
            decode(row, idx, |v: i64| JsonValue::from(v))
                .or_else(|| decode(row, idx, |v: i32| JsonValue::from(v)))
                .or_else(|| decode(row, idx, |v: i16| JsonValue::from(v)))
        }
        TypeCategory::Float => decode(row, idx, float_json)
            .or_else(|| decode(row, idx, |v: f32| float_json(f64::from(v)))),
        TypeCategory::Decimal => decode(row, idx, decimal_json),
        TypeCategory::Binary => decode(row, idx, |v: Vec<u8>| encode_binary(&v, false)),
        TypeCategory::Json => decode(row, idx, |v: JsonValue| v),
        TypeCategory::Uuid => decode(row, idx, |v: uuid::Uuid| JsonValue::String(v.to_string())),
        TypeCategory::Date => decode(row, idx, |v: NaiveDate| JsonValue::String(v.to_string())),
        TypeCategory::Time => decode(row, idx, |v: NaiveTime| JsonValue::String(v.to_string())),
        TypeCategory::DateTime => decode(row, idx, |v: NaiveDateTime| {
            JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        })
        .or_else(|| decode(row, idx, |v: DateTime<Utc>| JsonValue::String(v.to_rfc3339()))),
        TypeCategory::DateTimeTz => {
            decode(row, idx, |v: DateTime<Utc>| JsonValue::String(v.to_rfc3339()))
        }
        TypeCategory::Text => None,
    };

    // Anything unrecognised, or a category whose decoder did not fit, falls
    // back to text and then to raw bytes.
    decoded
        .or_else(|| decode(row, idx, JsonValue::String))
        .or_else(|| decode(row, idx, |v: Vec<u8>| encode_binary(&v, true)))
}
