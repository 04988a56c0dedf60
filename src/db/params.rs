//! Parameter binding for procedure calls.
//!
//! Binds [`ProcedureValue`]s to database-specific query objects, in the order
//! the call statement declares its placeholders. NULLs are written into the
//! statement itself and skipped here.

use crate::models::{ProcedureParams, ProcedureValue};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{MySql, Postgres};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q ProcedureValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        // Not reached through `*_query`, which skips NULLs.
        ProcedureValue::Null => query.bind(None::<String>),
        ProcedureValue::Bool(v) => query.bind(*v),
        ProcedureValue::Int32(v) => query.bind(*v),
        ProcedureValue::Int(v) => query.bind(*v),
        ProcedureValue::Float(v) => query.bind(*v),
        ProcedureValue::Decimal(v) => query.bind(*v),
        ProcedureValue::String(v) => query.bind(v.as_str()),
        ProcedureValue::Json(v) => query.bind(Json(v)),
        ProcedureValue::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q ProcedureValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        // Not reached through `*_query`, which skips NULLs.
        ProcedureValue::Null => query.bind(None::<String>),
        ProcedureValue::Bool(v) => query.bind(*v),
        ProcedureValue::Int32(v) => query.bind(*v),
        ProcedureValue::Int(v) => query.bind(*v),
        ProcedureValue::Float(v) => query.bind(*v),
        ProcedureValue::Decimal(v) => query.bind(*v),
        ProcedureValue::String(v) => query.bind(v.as_str()),
        ProcedureValue::Json(v) => query.bind(Json(v)),
        ProcedureValue::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Build a MySQL query for `sql` with every parameter bound.
pub(crate) fn mysql_query<'q>(
    sql: &'q str,
    params: &'q ProcedureParams,
) -> Query<'q, MySql, MySqlArguments> {
    bound_values(params).fold(sqlx::query(sql), |query, value| bind_mysql_param(query, value))
}

/// Build a PostgreSQL query for `sql` with every parameter bound.
pub(crate) fn postgres_query<'q>(
    sql: &'q str,
    params: &'q ProcedureParams,
) -> Query<'q, Postgres, PgArguments> {
    bound_values(params).fold(sqlx::query(sql), |query, value| {
        bind_postgres_param(query, value)
    })
}

/// The values that get a placeholder in the call statement.
fn bound_values(params: &ProcedureParams) -> impl Iterator<Item = &ProcedureValue> {
    params.values().filter(|value| !value.is_null())
}
