//! Data models for stored procedure calls.
//!
//! This module re-exports all model types used throughout the crate.

pub mod procedure;
pub mod result;

// Re-export commonly used types
pub use procedure::{ProcedureCall, ProcedureParams, ProcedureValue};
pub use result::{
    MultipleResults, ResultSet, ResultShape, Row, first_column_as_bool, map_row, map_rows,
};
