//! Connection seam between the client and a database driver.
//!
//! The client never talks to a driver directly. It asks a
//! [`ConnectionFactory`] for one [`ProcedureConnection`] per call and wraps it
//! in a [`ConnectionGuard`] for the duration of that call.

use crate::error::{DbError, DbResult};
use crate::models::{ProcedureCall, ResultSet};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Opens connections from a resolved connection string.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open a new, dedicated connection.
    async fn connect(&self, connection_string: &str) -> DbResult<Box<dyn ProcedureConnection>>;
}

/// One open connection able to invoke stored procedures.
///
/// Implementations must release the underlying resource when dropped, so a
/// cancelled call does not leak it.
#[async_trait]
pub trait ProcedureConnection: Send {
    /// Invoke the procedure and return the number of affected rows.
    async fn execute(&mut self, call: &ProcedureCall) -> DbResult<u64>;

    /// Invoke the procedure and return every result set it produced, in order.
    async fn fetch_result_sets(&mut self, call: &ProcedureCall) -> DbResult<Vec<ResultSet>>;

    /// Close the connection gracefully.
    async fn close(self: Box<Self>) -> DbResult<()>;
}

/// Scoped ownership of a connection for one call.
///
/// Call [`release`](Self::release) when done. A guard dropped without release
/// (cancellation, panic) drops the connection, which closes it.
pub struct ConnectionGuard {
    connection: Option<Box<dyn ProcedureConnection>>,
    procedure: String,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("procedure", &self.procedure)
            .field("released", &self.connection.is_none())
            .finish_non_exhaustive()
    }
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn ProcedureConnection>, procedure: impl Into<String>) -> Self {
        Self {
            connection: Some(connection),
            procedure: procedure.into(),
        }
    }

    fn connection(&mut self) -> DbResult<&mut Box<dyn ProcedureConnection>> {
        self.connection.as_mut().ok_or_else(|| {
            DbError::connection(
                "Connection already released",
                "Open a new connection for each call",
            )
        })
    }

    pub async fn execute(&mut self, call: &ProcedureCall) -> DbResult<u64> {
        self.connection()?.execute(call).await
    }

    pub async fn fetch_result_sets(&mut self, call: &ProcedureCall) -> DbResult<Vec<ResultSet>> {
        self.connection()?.fetch_result_sets(call).await
    }

    /// Close the connection. A close failure is logged, not returned: the
    /// call's own outcome has already been decided by then.
    pub async fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            match connection.close().await {
                Ok(()) => debug!(procedure = %self.procedure, "Connection released"),
                Err(e) => warn!(
                    procedure = %self.procedure,
                    error = %e,
                    "Failed to close connection cleanly"
                ),
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.connection.take().is_some() {
            warn!(
                procedure = %self.procedure,
                "Connection dropped without release - call was cancelled or panicked"
            );
        }
    }
}
