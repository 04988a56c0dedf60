//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The connection seam (`ConnectionFactory`, `ProcedureConnection`)
//! - Scoped connection ownership (`ConnectionGuard`)
//! - The `sqlx` implementation for MySQL/MariaDB and PostgreSQL
//! - `CALL` statement rendering and parameter binding
//! - Column decoding into JSON rows

pub mod connection;
pub mod dialect;
pub mod driver;
mod params;
pub mod types;

pub use connection::{ConnectionFactory, ConnectionGuard, ProcedureConnection};
pub use dialect::{Backend, masked_connection_string};
pub use driver::SqlxConnectionFactory;
pub use types::{JsonRow, TypeCategory};
