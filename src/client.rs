//! Stored procedure client.
//!
//! [`StoredProcedureClient<T>`] runs named procedures and maps their rows onto
//! `T`. Every operation follows the same sequence:
//!
//! 1. validate the procedure name and parameters
//! 2. resolve the configured connection string (on every call, never cached)
//! 3. open a dedicated connection
//! 4. invoke the procedure
//! 5. release the connection, whatever the outcome
//! 6. map the rows and return
//!
//! Nothing is retried and no error is swallowed.

use crate::config::ConnectionStrings;
use crate::db::{ConnectionFactory, ConnectionGuard, SqlxConnectionFactory};
use crate::error::{DbError, DbResult};
use crate::models::{
    MultipleResults, ProcedureCall, ProcedureParams, ResultSet, ResultShape, first_column_as_bool,
    map_row, map_rows,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// The operations available on a procedure client bound to `T`.
#[async_trait]
pub trait StoredProcedures<T>: Send + Sync
where
    T: DeserializeOwned + Send + 'static,
{
    /// Run the procedure and return the number of affected rows.
    ///
    /// PostgreSQL reports no row count for `CALL`, so the result is always 0
    /// there. MySQL reports the count of the last statement the procedure ran.
    async fn execute(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<u64>;

    /// Map every row of the first result set onto `T`, in database order.
    async fn query(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<Vec<T>>;

    /// Map the first row; [`DbError::NotFound`] when there is none.
    async fn query_first(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<T>;

    /// Map the first row, or return `T::default()` when there is none.
    async fn query_first_or_default(
        &self,
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<T>
    where
        T: Default;

    /// Map the only row; [`DbError::NotFound`] on zero rows and
    /// [`DbError::MultipleResults`] on more than one.
    async fn query_single(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<T>;

    /// Like `query_single`, but zero rows yield `T::default()`.
    async fn query_single_or_default(
        &self,
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<T>
    where
        T: Default;

    /// Read the first column of the first row as a boolean; `false` when
    /// there are no rows or the value is NULL.
    async fn query_first_or_default_bool(
        &self,
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<bool>;

    /// Read one result set per shape, in order. The procedure must produce at
    /// least as many result sets as shapes requested.
    async fn query_multiple(
        &self,
        shapes: &[ResultShape],
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<MultipleResults>;
}

/// Runs stored procedures and maps their rows onto `T`.
pub struct StoredProcedureClient<T> {
    settings: Arc<dyn ConnectionStrings>,
    connection_string_name: String,
    factory: Arc<dyn ConnectionFactory>,
    _mapped: PhantomData<fn() -> T>,
}

impl<T> StoredProcedureClient<T> {
    /// Create a client that connects through `sqlx`.
    ///
    /// The connection string is looked up by `connection_string_name` on each
    /// call; a missing entry surfaces as [`DbError::Configuration`] then.
    pub fn new(
        settings: Arc<dyn ConnectionStrings>,
        connection_string_name: impl Into<String>,
    ) -> Self {
        Self::with_factory(
            settings,
            connection_string_name,
            Arc::new(SqlxConnectionFactory::new()),
        )
    }

    /// Create a client with a custom connection factory.
    pub fn with_factory(
        settings: Arc<dyn ConnectionStrings>,
        connection_string_name: impl Into<String>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        Self {
            settings,
            connection_string_name: connection_string_name.into(),
            factory,
            _mapped: PhantomData,
        }
    }

    pub fn connection_string_name(&self) -> &str {
        &self.connection_string_name
    }

    /// Resolve the connection string and open a guarded connection.
    async fn open(&self, call: &ProcedureCall) -> DbResult<ConnectionGuard> {
        let name = &self.connection_string_name;
        let connection_string = self
            .settings
            .connection_string(name)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                DbError::configuration(name.as_str(), "Connection string not found or empty")
            })?;

        let connection = self
            .factory
            .connect(&connection_string)
            .await
            .map_err(|e| e.for_connection_string(name))?;
        Ok(ConnectionGuard::new(connection, call.name()))
    }

    async fn affected_rows(&self, call: &ProcedureCall) -> DbResult<u64> {
        let mut guard = self.open(call).await?;
        let outcome = guard.execute(call).await;
        guard.release().await;
        outcome.map_err(|e| e.for_procedure(call.name()))
    }

    async fn result_sets(&self, call: &ProcedureCall) -> DbResult<Vec<ResultSet>> {
        let mut guard = self.open(call).await?;
        let outcome = guard.fetch_result_sets(call).await;
        guard.release().await;
        outcome.map_err(|e| e.for_procedure(call.name()))
    }

    /// Rows of the first result set; a procedure without result sets has none.
    async fn first_result_set(&self, call: &ProcedureCall) -> DbResult<ResultSet> {
        Ok(self
            .result_sets(call)
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}

fn prepare(
    operation: &'static str,
    procedure: &str,
    params: Option<ProcedureParams>,
) -> DbResult<ProcedureCall> {
    let call = ProcedureCall::new(procedure, params)?;
    debug!(
        operation,
        procedure = %call.name(),
        params = call.params().len(),
        "Calling stored procedure"
    );
    Ok(call)
}

fn map_one<T: DeserializeOwned>(call: &ProcedureCall, row: crate::models::Row) -> DbResult<T> {
    map_row(row).map_err(|e| DbError::mapping(call.name(), e.to_string()))
}

/// At most one row, or [`DbError::MultipleResults`].
fn at_most_one(call: &ProcedureCall, rows: ResultSet) -> DbResult<Option<crate::models::Row>> {
    if rows.len() > 1 {
        return Err(DbError::multiple_results(call.name(), rows.len()));
    }
    Ok(rows.into_iter().next())
}

#[async_trait]
impl<T> StoredProcedures<T> for StoredProcedureClient<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn execute(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<u64> {
        let call = prepare("execute", procedure, params)?;
        self.affected_rows(&call).await
    }

    async fn query(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<Vec<T>> {
        let call = prepare("query", procedure, params)?;
        let rows = self.first_result_set(&call).await?;
        map_rows(rows).map_err(|e| DbError::mapping(call.name(), e.to_string()))
    }

    async fn query_first(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<T> {
        let call = prepare("query_first", procedure, params)?;
        let rows = self.first_result_set(&call).await?;
        match rows.into_iter().next() {
            Some(row) => map_one(&call, row),
            None => Err(DbError::not_found(call.name())),
        }
    }

    async fn query_first_or_default(
        &self,
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<T>
    where
        T: Default,
    {
        let call = prepare("query_first_or_default", procedure, params)?;
        let rows = self.first_result_set(&call).await?;
        match rows.into_iter().next() {
            Some(row) => map_one(&call, row),
            None => Ok(T::default()),
        }
    }

    async fn query_single(&self, procedure: &str, params: Option<ProcedureParams>) -> DbResult<T> {
        let call = prepare("query_single", procedure, params)?;
        let rows = self.first_result_set(&call).await?;
        match at_most_one(&call, rows)? {
            Some(row) => map_one(&call, row),
            None => Err(DbError::not_found(call.name())),
        }
    }

    async fn query_single_or_default(
        &self,
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<T>
    where
        T: Default,
    {
        let call = prepare("query_single_or_default", procedure, params)?;
        let rows = self.first_result_set(&call).await?;
        match at_most_one(&call, rows)? {
            Some(row) => map_one(&call, row),
            None => Ok(T::default()),
        }
    }

    async fn query_first_or_default_bool(
        &self,
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<bool> {
        let call = prepare("query_first_or_default_bool", procedure, params)?;
        let rows = self.first_result_set(&call).await?;
        let Some(row) = rows.first() else {
            return Ok(false);
        };
        first_column_as_bool(row).ok_or_else(|| {
            DbError::mapping(
                call.name(),
                format!(
                    "Cannot read {} as a boolean",
                    row.values().next().map(|v| v.to_string()).unwrap_or_default()
                ),
            )
        })
    }

    async fn query_multiple(
        &self,
        shapes: &[ResultShape],
        procedure: &str,
        params: Option<ProcedureParams>,
    ) -> DbResult<MultipleResults> {
        if shapes.is_empty() {
            return Err(DbError::invalid_input(
                "query_multiple needs at least one result shape",
            ));
        }
        let call = prepare("query_multiple", procedure, params)?;
        let sets = self.result_sets(&call).await?;
        if sets.len() < shapes.len() {
            return Err(DbError::execution(
                call.name(),
                format!(
                    "Expected {} result sets but the procedure returned {}",
                    shapes.len(),
                    sets.len()
                ),
                None,
            ));
        }

        let mapped = shapes
            .iter()
            .zip(sets)
            .map(|(shape, rows)| {
                shape
                    .read(rows)
                    .map(|set| (shape.type_name(), set))
                    .map_err(|e| DbError::mapping(call.name(), e.to_string()))
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(MultipleResults::new(mapped))
    }
}

impl<T> Clone for StoredProcedureClient<T> {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            connection_string_name: self.connection_string_name.clone(),
            factory: Arc::clone(&self.factory),
            _mapped: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StoredProcedureClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredProcedureClient")
            .field("mapped_type", &std::any::type_name::<T>())
            .field("connection_string_name", &self.connection_string_name)
            .finish_non_exhaustive()
    }
}
