//! Backend detection and `CALL` statement rendering.

use crate::models::ProcedureCall;
use std::fmt;

/// Database backends that support stored procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Includes MariaDB
    MySql,
    PostgreSql,
}

impl Backend {
    /// Parse the backend from a connection string's scheme.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.trim_start().to_ascii_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSql)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else {
            None
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::PostgreSql => "PostgreSQL",
        }
    }

    /// Render the statement that invokes `call` as a stored procedure.
    ///
    /// MySQL has no named-argument syntax, so arguments are positional in the
    /// order they were added. PostgreSQL uses named notation, which makes the
    /// order irrelevant there.
    ///
    /// NULL arguments are written as an untyped `NULL` literal instead of a
    /// placeholder: a bound NULL carries a type, and PostgreSQL would look
    /// for an overload taking that type. Placeholders are numbered over the
    /// remaining arguments only.
    pub fn call_statement(&self, call: &ProcedureCall) -> String {
        let mut placeholders = 0;
        let args: Vec<String> = call
            .params()
            .iter()
            .map(|(name, value)| {
                let arg = if value.is_null() {
                    "NULL".to_string()
                } else {
                    placeholders += 1;
                    match self {
                        Self::MySql => "?".to_string(),
                        Self::PostgreSql => format!("${}", placeholders),
                    }
                };
                match self {
                    Self::MySql => arg,
                    Self::PostgreSql => format!("{} => {}", name, arg),
                }
            })
            .collect();
        format!("CALL {}({})", call.name(), args.join(", "))
    }

    /// Whether the server ends a `CALL` with a status packet that the driver
    /// reports like the end of an extra, empty result set.
    pub(crate) fn has_trailing_call_status(&self) -> bool {
        matches!(self, Self::MySql)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Mask the password of a connection URL for diagnostics.
pub fn masked_connection_string(connection_string: &str) -> String {
    match url::Url::parse(connection_string) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_ok() {
                parsed.to_string()
            } else {
                "<unparseable connection string>".to_string()
            }
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable connection string>".to_string(),
    }
}
