//! sproc-mapper Library
//!
//! Runs database stored procedures and maps their result sets onto typed
//! values, so application code does not repeat connection handling and row
//! mapping around every call.
//!
//! ```ignore
//! use sproc_mapper::{StoredProcedureClient, StoredProcedures, params};
//!
//! let users: StoredProcedureClient<User> = StoredProcedureClient::new(settings, "main");
//! let user = users.query_single("GetUser", Some(params! { "id" => 1 })).await?;
//! ```

#[macro_use]
mod macros;

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use client::{StoredProcedureClient, StoredProcedures};
pub use config::{Config, ConnectionStrings};
pub use error::{DbError, DbResult};
pub use models::{MultipleResults, ProcedureParams, ProcedureValue, ResultShape, Row};
pub use repository::GenericRepository;
