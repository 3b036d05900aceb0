//! Error types for txscope core.

use thiserror::Error;
use txscope_driver::DriverError;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by [`Db`](crate::Db) itself.
///
/// Every variant keeps the driver error as its `source()`, so the
/// classifier predicates see through it.
#[derive(Debug, Error)]
pub enum Error {
    /// A statement failed.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// The transaction could not be started.
    #[error("begin transaction: {0}")]
    Begin(#[source] DriverError),

    /// The transaction could not be committed.
    #[error("commit transaction: {0}")]
    Commit(#[source] DriverError),

    /// Rolling back after a failed commit also failed.
    #[error("rollback transaction: {0}")]
    Rollback(#[source] DriverError),
}

impl Error {
    /// Returns the underlying driver error.
    #[must_use]
    pub fn driver_error(&self) -> &DriverError {
        match self {
            Self::Driver(e) | Self::Begin(e) | Self::Commit(e) | Self::Rollback(e) => e,
        }
    }
}
