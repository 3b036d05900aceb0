//! # txscope Testkit
//!
//! Test utilities for txscope.
//!
//! This crate provides:
//! - Temporary SQLite databases behind a [`Db`](txscope_core::Db)
//! - A scripted, fault-injecting driver for exercising the transaction
//!   protocol deterministically
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use txscope_core::{Context, Db, Error};
//! use txscope_testkit::prelude::*;
//!
//! let pool = ScriptedPool::new();
//! pool.fail_on("INSERT", Fault::conflict(), 1);
//!
//! let db = Db::new(pool.clone());
//! let result = db.run_tx(&Context::background(), |cx| {
//!     db.exec(cx, "INSERT INTO users VALUES ('alice')", &[])?;
//!     Ok::<_, Error>(())
//! });
//! assert!(result.is_err());
//! assert_eq!(pool.count(ROLLBACK), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scripted::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scripted::*;
