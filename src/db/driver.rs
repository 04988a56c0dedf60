//! `sqlx`-backed connections.
//!
//! Each call opens a single `MySqlConnection` or `PgConnection` (no pool; any
//! pooling belongs to the driver or to a proxy in front of the database),
//! invokes the procedure with a rendered `CALL` statement and closes the
//! connection again.

use crate::db::connection::{ConnectionFactory, ProcedureConnection};
use crate::db::dialect::{Backend, masked_connection_string};
use crate::db::params::{mysql_query, postgres_query};
use crate::db::types::JsonRow;
use crate::error::{DbError, DbResult};
use crate::models::{ProcedureCall, ResultSet};
use async_trait::async_trait;
use futures_util::{Stream, TryStreamExt};
use sqlx::{Connection, Either, Executor, MySqlConnection, PgConnection};
use tracing::debug;

/// Opens a dedicated `sqlx` connection per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnectionFactory;

impl SqlxConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for SqlxConnectionFactory {
    async fn connect(&self, connection_string: &str) -> DbResult<Box<dyn ProcedureConnection>> {
        let backend = Backend::from_connection_string(connection_string).ok_or_else(|| {
            DbError::configuration(
                "",
                format!(
                    "Unsupported connection string '{}': expected a mysql://, mariadb://, postgres:// or postgresql:// URL",
                    masked_connection_string(connection_string)
                ),
            )
        })?;

        debug!(
            backend = %backend,
            target = %masked_connection_string(connection_string),
            "Opening connection"
        );

        match backend {
            Backend::MySql => {
                let url = mysql_url(connection_string);
                let conn = MySqlConnection::connect(&url).await?;
                Ok(Box::new(MySqlProcedureConnection { conn }))
            }
            Backend::PostgreSql => {
                let conn = PgConnection::connect(connection_string).await?;
                Ok(Box::new(PgProcedureConnection { conn }))
            }
        }
    }
}

/// The MySQL driver only accepts the `mysql` scheme.
fn mysql_url(connection_string: &str) -> String {
    let trimmed = connection_string.trim_start();
    match trimmed.get(..10) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mariadb://") => {
            format!("mysql://{}", &trimmed[10..])
        }
        _ => trimmed.to_string(),
    }
}

/// Group a `fetch_many` stream into result sets.
///
/// The driver yields rows followed by a summary for each result set, so every
/// summary closes the set collected so far (which may be empty).
async fn collect_result_sets<R, Q, S>(
    mut stream: S,
    trailing_status: bool,
) -> DbResult<Vec<ResultSet>>
where
    R: JsonRow,
    S: Stream<Item = Result<Either<Q, R>, sqlx::Error>> + Unpin,
{
    let mut sets = Vec::new();
    let mut current = ResultSet::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(_) => sets.push(std::mem::take(&mut current)),
            Either::Right(row) => current.push(row.to_json_row()),
        }
    }
    if !current.is_empty() {
        sets.push(current);
    }
    if trailing_status && sets.last().is_some_and(|set| set.is_empty()) {
        sets.pop();
    }
    Ok(sets)
}

struct MySqlProcedureConnection {
    conn: MySqlConnection,
}

#[async_trait]
impl ProcedureConnection for MySqlProcedureConnection {
    async fn execute(&mut self, call: &ProcedureCall) -> DbResult<u64> {
        let sql = Backend::MySql.call_statement(call);
        debug!(sql = %sql, params = call.params().len(), "Executing procedure");
        let result = (&mut self.conn)
            .execute(mysql_query(&sql, call.params()))
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_result_sets(&mut self, call: &ProcedureCall) -> DbResult<Vec<ResultSet>> {
        let sql = Backend::MySql.call_statement(call);
        debug!(sql = %sql, params = call.params().len(), "Querying procedure");
        let stream = (&mut self.conn).fetch_many(mysql_query(&sql, call.params()));
        collect_result_sets(stream, Backend::MySql.has_trailing_call_status()).await
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

struct PgProcedureConnection {
    conn: PgConnection,
}

#[async_trait]
impl ProcedureConnection for PgProcedureConnection {
    /// Always 0: the `CALL` command tag carries no row count.
    async fn execute(&mut self, call: &ProcedureCall) -> DbResult<u64> {
        let sql = Backend::PostgreSql.call_statement(call);
        debug!(sql = %sql, params = call.params().len(), "Executing procedure");
        let result = (&mut self.conn)
            .execute(postgres_query(&sql, call.params()))
            .await?;
        Ok(result.rows_affected())
    }

    async fn fetch_result_sets(&mut self, call: &ProcedureCall) -> DbResult<Vec<ResultSet>> {
        let sql = Backend::PostgreSql.call_statement(call);
        debug!(sql = %sql, params = call.params().len(), "Querying procedure");
        let stream = (&mut self.conn).fetch_many(postgres_query(&sql, call.params()));
        collect_result_sets(stream, Backend::PostgreSql.has_trailing_call_status()).await
    }

    async fn close(self: Box<Self>) -> DbResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}
