//! # txscope
//!
//! Context-scoped transactions for application code.
//!
//! Application functions take a [`Context`] and issue statements through a
//! shared [`Db`]. When the context carries a transaction (because some
//! caller up the stack is inside [`Db::run_tx`]), the statement joins it;
//! otherwise it runs on the pool. Functions never need to know which.
//!
//! This crate provides:
//! - [`Db`], the scoped query facade (`query`, `query_row`, `exec`, `run_tx`)
//! - [`with_tx`] / [`tx_from_context`], the context carrier
//! - Error classification predicates (`is_not_found_error`,
//!   `is_unique_violation_error`, ...) that see through wrapped errors
//! - [`TxMode::Retrying`], which replays a transaction after serialization
//!   conflicts using the `txscope_retry` engine
//!
//! ## Example
//!
//! ```rust,no_run
//! use txscope_core::{is_unique_violation_error, params, Context, Db, Error};
//! use txscope_sqlite::{SqliteConfig, SqlitePool};
//!
//! fn create_user(db: &Db, cx: &Context, name: &str) -> Result<(), Error> {
//!     db.exec(cx, "INSERT INTO users (name) VALUES (?1)", &params![name])?;
//!     Ok(())
//! }
//!
//! let db = Db::new(SqlitePool::open(SqliteConfig::new("app.db")).unwrap());
//! let cx = Context::background();
//!
//! let result = db.run_tx(&cx, |cx| create_user(&db, cx, "alice"));
//! if let Err(e) = &result {
//!     if is_unique_violation_error(e, &["name"]) {
//!         println!("name taken");
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod carrier;
mod classify;
mod config;
mod db;
mod error;

pub use carrier::{tx_from_context, with_tx, TxHandle};
pub use classify::{
    db_error, is_error, is_foreign_key_violation_error, is_not_found_error,
    is_not_null_violation_error, is_serialization_failure, is_unique_violation_error,
};
pub use config::{TxConfig, TxMode};
pub use db::Db;
pub use error::{Error, Result};

pub use txscope_driver::{
    codes, params, CancelHandle, CommandTag, Context, ContextError, DbError, DriverError,
    DriverResult, FromValue, Pool, Queryer, Row, Rows, Transaction, Value,
};
pub use txscope_retry::RetryConfig;
