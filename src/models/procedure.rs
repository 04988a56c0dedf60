//! Stored procedure invocation models.
//!
//! A [`ProcedureCall`] is built once per operation from the caller's
//! procedure name and optional [`ProcedureParams`]. Building it validates
//! every identifier, since the name is rendered into the `CALL` statement.

use crate::error::{DbError, DbResult};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::str::FromStr;

/// A parameter value passed to a stored procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureValue {
    /// Rendered as a literal `NULL` in the call rather than bound, so the
    /// database infers its type from the procedure signature.
    Null,
    Bool(bool),
    /// Bound as a 32-bit integer. PostgreSQL resolves procedure overloads by
    /// argument type, so `INTEGER` parameters need this rather than `Int`.
    Int32(i32),
    Int(i64),
    /// Bound as `DOUBLE PRECISION`; PostgreSQL will not pass it to a
    /// `NUMERIC` parameter. Use `Decimal` there.
    Float(f64),
    Decimal(Decimal),
    String(String),
    Json(JsonValue),
    Bytes(Vec<u8>),
}

impl ProcedureValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
            Self::Json(_) => "json",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Convert a JSON value into the closest scalar parameter.
    ///
    /// Arrays and objects stay JSON. Integers that fit in an `i64` become
    /// `Int`. Other numbers become an exact `Decimal`, which PostgreSQL also
    /// accepts for `DOUBLE PRECISION` parameters, or `Float` when out of its
    /// range.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => match Decimal::from_str(&n.to_string()) {
                    Ok(d) => Self::Decimal(d),
                    Err(_) => n
                        .as_f64()
                        .map(Self::Float)
                        .unwrap_or(Self::Json(JsonValue::Number(n))),
                },
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for ProcedureValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )+
    };
}

impl_from_value! {
    bool => Bool,
    i8 => Int32,
    i16 => Int32,
    i32 => Int32,
    u8 => Int32,
    u16 => Int32,
    i64 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    JsonValue => Json,
}

impl From<&str> for ProcedureValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<&[u8]> for ProcedureValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<T: Into<ProcedureValue>> From<Option<T>> for ProcedureValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Ordered mapping from parameter name to value.
///
/// Order matters: MySQL binds procedure arguments positionally, so the
/// parameters must be added in the order the procedure declares them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureParams {
    entries: Vec<(String, ProcedureValue)>,
}

impl ProcedureParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter and return `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ProcedureValue>) -> Self {
        self.add(name, value);
        self
    }

    /// Add a parameter.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<ProcedureValue>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a parameter by name. A leading `@` is ignored on both sides.
    pub fn get(&self, name: &str) -> Option<&ProcedureValue> {
        let wanted = strip_marker(name);
        self.entries
            .iter()
            .find(|(n, _)| strip_marker(n) == wanted)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProcedureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &ProcedureValue> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<K, V> FromIterator<(K, V)> for ProcedureParams
where
    K: Into<String>,
    V: Into<ProcedureValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One stored procedure invocation: a validated name and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    name: String,
    params: ProcedureParams,
}

impl ProcedureCall {
    /// Validate and build a call.
    ///
    /// Parameter names lose their leading `@` here, so `@id` and `id` refer
    /// to the same argument.
    pub fn new(name: impl Into<String>, params: Option<ProcedureParams>) -> DbResult<Self> {
        let name = name.into();
        validate_procedure_name(&name)?;

        let params = params.unwrap_or_default();
        let mut seen = HashSet::with_capacity(params.len());
        let mut entries = Vec::with_capacity(params.len());
        for (raw, value) in params.entries {
            let param = strip_marker(&raw);
            if !is_identifier(param) {
                return Err(DbError::invalid_input(format!(
                    "Invalid parameter name '{}' for procedure '{}'",
                    raw, name
                )));
            }
            if !seen.insert(param.to_ascii_lowercase()) {
                return Err(DbError::invalid_input(format!(
                    "Duplicate parameter '{}' for procedure '{}'",
                    param, name
                )));
            }
            entries.push((param.to_string(), value));
        }

        Ok(Self {
            name,
            params: ProcedureParams { entries },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ProcedureParams {
        &self.params
    }
}

fn strip_marker(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !s.starts_with(|c: char| c.is_ascii_digit())
}

/// Procedure names are dot-separated identifiers, e.g. `dbo.GetUser`.
fn validate_procedure_name(name: &str) -> DbResult<()> {
    if name.trim().is_empty() {
        return Err(DbError::invalid_input("Procedure name cannot be empty"));
    }
    if !name.split('.').all(is_identifier) {
        return Err(DbError::invalid_input(format!(
            "Invalid procedure name '{}': expected identifiers made of letters, digits, '_' or '$', separated by '.'",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(ProcedureValue::from(1), ProcedureValue::Int32(1));
        assert_eq!(ProcedureValue::from(1_i64), ProcedureValue::Int(1));
        assert_eq!(ProcedureValue::from("a"), ProcedureValue::String("a".into()));
        assert_eq!(ProcedureValue::from(None::<i64>), ProcedureValue::Null);
        assert_eq!(ProcedureValue::from(Some(true)), ProcedureValue::Bool(true));
        assert_eq!(ProcedureValue::from(2.5), ProcedureValue::Float(2.5));
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(
            ProcedureValue::from_json(serde_json::json!(7)),
            ProcedureValue::Int(7)
        );
        assert_eq!(
            ProcedureValue::from_json(serde_json::json!(1.5)),
            ProcedureValue::Decimal(Decimal::new(15, 1))
        );
        assert_eq!(
            ProcedureValue::from_json(serde_json::json!(1e300)),
            ProcedureValue::Float(1e300)
        );
        assert_eq!(
            ProcedureValue::from_json(serde_json::json!("x")),
            ProcedureValue::String("x".into())
        );
        assert!(matches!(
            ProcedureValue::from_json(serde_json::json!({"a": 1})),
            ProcedureValue::Json(_)
        ));
        assert!(ProcedureValue::from_json(JsonValue::Null).is_null());
    }

    #[test]
    fn test_params_preserve_order() {
        let params = ProcedureParams::new()
            .with("b", 2)
            .with("a", 1)
            .with("c", "three");
        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("@a"), Some(&ProcedureValue::Int32(1)));
    }

    #[test]
    fn test_params_from_iterator() {
        let params: ProcedureParams = vec![("id", 1), ("age", 30)].into_iter().collect();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_call_strips_marker() {
        let call = ProcedureCall::new("GetUser", Some(ProcedureParams::new().with("@id", 1)))
            .unwrap();
        assert_eq!(call.params().iter().next().unwrap().0, "id");
    }

    #[test]
    fn test_call_without_params() {
        let call = ProcedureCall::new("dbo.ListUsers", None).unwrap();
        assert_eq!(call.name(), "dbo.ListUsers");
        assert!(call.params().is_empty());
    }

    #[test]
    fn test_call_rejects_empty_name() {
        let err = ProcedureCall::new("  ", None).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_call_rejects_injection() {
        for name in ["GetUser(); DROP TABLE users; --", "a..b", "1abc", "get user", "x.", "`x`"] {
            assert!(
                ProcedureCall::new(name, None).is_err(),
                "name should be rejected: {name}"
            );
        }
    }

    #[test]
    fn test_call_rejects_bad_param_names() {
        let params = ProcedureParams::new().with("id) OR 1=1 --", 1);
        assert!(ProcedureCall::new("GetUser", Some(params)).is_err());

        let params = ProcedureParams::new().with("", 1);
        assert!(ProcedureCall::new("GetUser", Some(params)).is_err());
    }

    #[test]
    fn test_call_rejects_duplicate_params() {
        let params = ProcedureParams::new().with("id", 1).with("@ID", 2);
        let err = ProcedureCall::new("GetUser", Some(params)).unwrap_err();
        assert!(err.to_string().contains("Duplicate parameter"));
    }
}
