//! Mapping from SQLite errors to driver errors.

use rusqlite::ffi;
use rusqlite::ErrorCode;
use txscope_driver::{codes, DbError, DriverError};

/// Converts a rusqlite error into a [`DriverError`].
pub(crate) fn map_err(err: rusqlite::Error) -> DriverError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => DriverError::NoRows,
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.unwrap_or_else(|| failure.to_string());
            DriverError::Db(db_error(&failure, message))
        }
        rusqlite::Error::InvalidColumnType(index, name, ty) => {
            DriverError::decode(format!("{index} ({name})"), format!("unexpected type {ty}"))
        }
        rusqlite::Error::FromSqlConversionFailure(index, ty, source) => {
            DriverError::decode(index, format!("cannot convert {ty}: {source}"))
        }
        other => DriverError::Db(DbError::new(codes::INTERNAL_ERROR, other.to_string())),
    }
}

fn db_error(failure: &ffi::Error, message: String) -> DbError {
    let code = sqlstate(failure);
    let mut err = DbError::new(code, message);
    if failure.code == ErrorCode::ConstraintViolation {
        if let Some(target) = constraint_target(&err.message) {
            match target.split_once('.') {
                Some((table, column)) => {
                    err.table = Some(table.to_owned());
                    err.column = Some(column.to_owned());
                }
                None => err.constraint = Some(target.to_owned()),
            }
        }
    }
    err
}

fn sqlstate(failure: &ffi::Error) -> &'static str {
    match failure.code {
        ErrorCode::ConstraintViolation => match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                codes::UNIQUE_VIOLATION
            }
            ffi::SQLITE_CONSTRAINT_NOTNULL => codes::NOT_NULL_VIOLATION,
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => codes::FOREIGN_KEY_VIOLATION,
            ffi::SQLITE_CONSTRAINT_CHECK => codes::CHECK_VIOLATION,
            _ => codes::INTEGRITY_CONSTRAINT_VIOLATION,
        },
        ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => codes::SERIALIZATION_FAILURE,
        _ => codes::INTERNAL_ERROR,
    }
}

/// Extracts the first object named by a `... constraint failed: <target>`
/// message, e.g. `users.name` or a CHECK constraint name.
fn constraint_target(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once("constraint failed: ")?;
    let first = rest.split(", ").next()?.trim();
    (!first.is_empty()).then_some(first)
}
