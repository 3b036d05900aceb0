//! # txscope retry engine
//!
//! Replays a unit of work inside one open transaction when the database
//! reports a serialization conflict, using a restart savepoint:
//!
//! ```text
//! SAVEPOINT txscope_restart
//! <work>                                  -- conflict?
//! ROLLBACK TO SAVEPOINT txscope_restart   -- then replay <work>
//! RELEASE SAVEPOINT txscope_restart
//! ```
//!
//! The engine only needs to execute statements, so it is written against the
//! small [`RetryTx`] trait rather than a full driver transaction.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;

pub use config::RetryConfig;
pub use error::RetryError;
pub use executor::{execute_in_tx, RetryTx, RESTART_SAVEPOINT, ROLLBACK_TO_SQL};
