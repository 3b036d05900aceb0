//! # txscope driver
//!
//! The interface txscope consumes from a store driver.
//!
//! This crate is the lowest layer of txscope. It defines:
//! - [`Context`], the immutable call context every operation takes
//! - [`Queryer`], [`Pool`] and [`Transaction`], the driver traits
//! - [`Value`], [`Row`], [`Rows`] and [`CommandTag`], the data model
//! - [`DbError`] and [`DriverError`], with SQLSTATE [`codes`]
//!
//! ## Design Principles
//!
//! - Drivers report store failures as [`DbError`] with a SQLSTATE code,
//!   never as their native error type
//! - Drivers honor the context's deadline and cancellation on every call
//! - Implementations must be `Send + Sync`
//!
//! ## Example
//!
//! ```rust
//! use txscope_driver::{params, Context};
//! use std::time::Duration;
//!
//! let cx = Context::background().with_timeout(Duration::from_secs(5));
//! assert!(cx.check().is_ok());
//! let args = params!["alice"];
//! assert_eq!(args.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codes;
mod context;
mod driver;
mod error;
mod row;
mod value;

pub use context::{CancelHandle, Context, ContextError};
pub use driver::{Pool, Queryer, Transaction};
pub use error::{DbError, DriverError, DriverResult};
pub use row::{CommandTag, Row, Rows};
pub use value::{FromValue, Value};
