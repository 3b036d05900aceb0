//! # txscope SQLite driver
//!
//! Implements the [`txscope_driver`] traits on top of `rusqlite`.
//!
//! - [`SqlitePool`] keeps a small list of idle connections to one database
//!   file and opens more on demand.
//! - [`SqliteTx`] owns one connection for the lifetime of a transaction.
//! - SQLite result codes are reported as SQLSTATE codes: constraint
//!   failures map to class 23, `SQLITE_BUSY`/`SQLITE_LOCKED` map to
//!   `40001` so they are treated as retryable conflicts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use txscope_driver::{params, Context, Queryer};
//! use txscope_sqlite::{SqliteConfig, SqlitePool};
//!
//! let pool = SqlitePool::open(SqliteConfig::new("app.db")).unwrap();
//! let cx = Context::background();
//! pool.exec(&cx, "CREATE TABLE IF NOT EXISTS users (name TEXT PRIMARY KEY)", &[]).unwrap();
//! pool.exec(&cx, "INSERT INTO users (name) VALUES (?1)", &params!["alice"]).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod pool;
mod statement;
mod transaction;

pub use config::{BeginMode, SqliteConfig};
pub use pool::SqlitePool;
pub use transaction::{SqliteTx, TxState};
