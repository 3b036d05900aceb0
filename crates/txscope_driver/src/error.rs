//! Error types for driver operations.

use crate::context::ContextError;
use std::fmt;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// A structured error reported by the store.
///
/// `code` is always a SQLSTATE code (see [`crate::codes`]). The optional
/// fields are filled in when the store names the offending object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// SQLSTATE code.
    pub code: String,
    /// Human-readable message from the store.
    pub message: String,
    /// Table the error refers to.
    pub table: Option<String>,
    /// Column the error refers to.
    pub column: Option<String>,
    /// Constraint the error refers to.
    pub constraint: Option<String>,
}

impl DbError {
    /// Creates an error with a code and message and no object names.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            table: None,
            column: None,
            constraint: None,
        }
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Sets the column name.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (SQLSTATE {})", self.message, self.code)
    }
}

impl std::error::Error for DbError {}

/// Errors that can occur in driver operations.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// A single-row query matched nothing.
    #[error("no rows in result set")]
    NoRows,

    /// The transaction was already committed or rolled back.
    #[error("transaction is closed")]
    TxClosed,

    /// The store rejected the statement.
    #[error("{0}")]
    Db(#[from] DbError),

    /// The call context stopped admitting work.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A connection could not be opened or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// A column value could not be converted.
    #[error("cannot decode column {column}: {message}")]
    Decode {
        /// Column index or name.
        column: String,
        /// What went wrong.
        message: String,
    },
}

impl DriverError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a decode error.
    pub fn decode(column: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.to_string(),
            message: message.into(),
        }
    }

    /// Returns the store error, if this is one.
    #[must_use]
    pub fn as_db_error(&self) -> Option<&DbError> {
        match self {
            Self::Db(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true for [`DriverError::TxClosed`].
    #[must_use]
    pub fn is_tx_closed(&self) -> bool {
        matches!(self, Self::TxClosed)
    }
}
