//! Result set models and row mapping.
//!
//! Rows leave the driver as ordered JSON objects keyed by column name and are
//! mapped onto the caller's type with `serde`. A [`ResultShape`] carries the
//! mapping for one result set of a multi-result call; [`MultipleResults`]
//! holds the mapped sets for the caller to downcast.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::any::{Any, type_name};
use std::fmt;

/// One row: column name to value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// One tabular output of a procedure, rows in database order.
pub type ResultSet = Vec<Row>;

/// Map a row onto `T`.
///
/// The row is first read as an object keyed by column name. A single-column
/// row that does not fit `T` as an object is read as its lone value, which
/// lets `T` be a scalar such as `i64` or `String`.
///
/// When both readings fail, the error of the reading `T` accepts is kept: a
/// `T` that rejects objects outright reports why the lone value did not fit.
pub fn map_row<T: DeserializeOwned>(row: Row) -> Result<T, serde_json::Error> {
    if row.len() != 1 {
        return serde_json::from_value(JsonValue::Object(row));
    }

    match serde_json::from_value(JsonValue::Object(row.clone())) {
        Ok(mapped) => Ok(mapped),
        Err(object_err) => {
            let value = row.into_iter().next().map(|(_, v)| v).unwrap_or_default();
            serde_json::from_value(value).map_err(|scalar_err| {
                if rejects_objects(&object_err) {
                    scalar_err
                } else {
                    object_err
                }
            })
        }
    }
}

fn rejects_objects(err: &serde_json::Error) -> bool {
    err.to_string().starts_with("invalid type: map")
}

/// Map every row of a result set onto `T`, preserving order.
pub fn map_rows<T: DeserializeOwned>(rows: ResultSet) -> Result<Vec<T>, serde_json::Error> {
    rows.into_iter().map(map_row).collect()
}

/// Coerce the first column of a row to a boolean.
///
/// `None` means the value has no boolean reading.
pub fn first_column_as_bool(row: &Row) -> Option<bool> {
    match row.values().next() {
        None | Some(JsonValue::Null) => Some(false),
        Some(JsonValue::Bool(b)) => Some(*b),
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(i) => Some(i != 0),
            None => n.as_f64().map(|f| f != 0.0),
        },
        Some(JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        Some(_) => None,
    }
}

type ReadFn = fn(ResultSet) -> Result<Box<dyn Any + Send>, serde_json::Error>;

fn read_as<U>(rows: ResultSet) -> Result<Box<dyn Any + Send>, serde_json::Error>
where
    U: DeserializeOwned + Send + 'static,
{
    let mapped: Vec<U> = map_rows(rows)?;
    Ok(Box::new(mapped))
}

/// The target type of one result set in a multi-result call.
///
/// A set read with `ResultShape::of::<U>()` is stored as `Vec<U>`.
#[derive(Clone, Copy)]
pub struct ResultShape {
    type_name: &'static str,
    read: ReadFn,
}

impl ResultShape {
    pub fn of<U>() -> Self
    where
        U: DeserializeOwned + Send + 'static,
    {
        Self {
            type_name: type_name::<U>(),
            read: read_as::<U>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn read(&self, rows: ResultSet) -> Result<Box<dyn Any + Send>, serde_json::Error> {
        (self.read)(rows)
    }
}

impl fmt::Debug for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResultShape").field(&self.type_name).finish()
    }
}

/// Mapped result sets of a multi-result call, one per requested shape.
pub struct MultipleResults {
    sets: Vec<Option<Box<dyn Any + Send>>>,
    type_names: Vec<&'static str>,
}

impl MultipleResults {
    pub(crate) fn new(mapped: Vec<(&'static str, Box<dyn Any + Send>)>) -> Self {
        let (type_names, sets) = mapped
            .into_iter()
            .map(|(name, set)| (name, Some(set)))
            .unzip();
        Self { sets, type_names }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Borrow set `index` as `Vec<U>`.
    ///
    /// Returns `None` if the index is out of range, the set was already taken,
    /// or it was requested with a different shape.
    pub fn get<U: 'static>(&self, index: usize) -> Option<&Vec<U>> {
        self.sets
            .get(index)?
            .as_ref()?
            .downcast_ref::<Vec<U>>()
    }

    /// Move set `index` out as `Vec<U>`. A failed downcast leaves the set in place.
    pub fn take<U: 'static>(&mut self, index: usize) -> Option<Vec<U>> {
        let slot = self.sets.get_mut(index)?;
        let boxed = slot.take()?;
        match boxed.downcast::<Vec<U>>() {
            Ok(rows) => Some(*rows),
            Err(original) => {
                *slot = Some(original);
                None
            }
        }
    }

    /// The opaque sets in request order; sets already taken are skipped.
    pub fn into_inner(self) -> Vec<Box<dyn Any + Send>> {
        self.sets.into_iter().flatten().collect()
    }
}

impl fmt::Debug for MultipleResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleResults")
            .field("shapes", &self.type_names)
            .finish_non_exhaustive()
    }
}
