//! Error types for stored procedure calls.
//!
//! Every failure a call can produce is a variant of [`DbError`]. Nothing in
//! this crate retries or swallows an error; callers are expected to match on
//! the variant they care about (most commonly telling "no rows" apart from
//! "more than one row" and from "the call itself failed").

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error for connection string '{name}': {message}")]
    Configuration { name: String, message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Procedure '{procedure}' failed: {message}")]
    Execution {
        procedure: String,
        message: String,
        /// e.g., "42883" for an undefined procedure on PostgreSQL
        sql_state: Option<String>,
    },

    #[error("Procedure '{procedure}' returned no rows")]
    NotFound { procedure: String },

    #[error("Procedure '{procedure}' returned {count} rows where exactly one was expected")]
    MultipleResults { procedure: String, count: usize },

    #[error("Failed to map a row returned by '{procedure}': {message}")]
    Mapping { procedure: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create a configuration error for the named connection string.
    pub fn configuration(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(
        procedure: impl Into<String>,
        message: impl Into<String>,
        sql_state: Option<String>,
    ) -> Self {
        Self::Execution {
            procedure: procedure.into(),
            message: message.into(),
            sql_state,
        }
    }

    pub fn not_found(procedure: impl Into<String>) -> Self {
        Self::NotFound {
            procedure: procedure.into(),
        }
    }

    pub fn multiple_results(procedure: impl Into<String>, count: usize) -> Self {
        Self::MultipleResults {
            procedure: procedure.into(),
            count,
        }
    }

    pub fn mapping(procedure: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            procedure: procedure.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Attach the procedure name to an execution error raised by a driver
    /// that did not know which procedure it was running.
    pub(crate) fn for_procedure(self, name: &str) -> Self {
        match self {
            Self::Execution {
                procedure,
                message,
                sql_state,
            } if procedure.is_empty() => Self::Execution {
                procedure: name.to_string(),
                message,
                sql_state,
            },
            Self::Mapping { procedure, message } if procedure.is_empty() => Self::Mapping {
                procedure: name.to_string(),
                message,
            },
            Self::NotFound { procedure } if procedure.is_empty() => Self::not_found(name),
            other => other,
        }
    }

    /// Attach the connection string name to a configuration error raised by a
    /// connection factory, which only ever sees the resolved value.
    pub(crate) fn for_connection_string(self, name: &str) -> Self {
        match self {
            Self::Configuration { name: missing, message } if missing.is_empty() => {
                Self::configuration(name, message)
            }
            other => other,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// True for the "zero rows" outcome of a single-result operation.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is retryable.
    ///
    /// Informational only: nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// Errors raised while a procedure runs carry an empty procedure name; the
/// client fills it in with [`DbError::for_procedure`].
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::execution("", db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::not_found(""),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::mapping("", format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::mapping(
                "",
                format!("Column index {} out of bounds (len: {})", index, len),
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::mapping("", format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::mapping("", format!("Decode error: {}", source)),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::execution("", format!("Type not found: {}", type_name), None)
            }
            sqlx::Error::WorkerCrashed => DbError::connection(
                "Database worker crashed",
                "Reconnect to the database",
            ),
            _ => DbError::execution("", format!("Unknown database error: {}", err), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
