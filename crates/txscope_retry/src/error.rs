//! Error types for the retry engine.

use thiserror::Error;
use txscope_driver::{ContextError, DriverError};

/// Errors returned by [`execute_in_tx`](crate::execute_in_tx).
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The closure failed with an error that is not retried, or the attempt
    /// budget ran out; holds the closure's last error.
    #[error("{0}")]
    Closure(E),

    /// A savepoint statement failed.
    #[error("{statement}: {source}")]
    Savepoint {
        /// The statement that failed.
        statement: &'static str,
        /// The driver error.
        #[source]
        source: DriverError,
    },

    /// The context was cancelled or its deadline passed between attempts.
    #[error("{0}")]
    Context(#[from] ContextError),
}
