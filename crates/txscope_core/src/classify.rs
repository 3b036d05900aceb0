//! Error classification.
//!
//! The predicates walk an error and its `source()` chain looking for the
//! store's [`DbError`], so they work on a bare [`DriverError`], on
//! [`crate::Error`], and on any application error that keeps one of those
//! as its source.
//!
//! The optional `cols` hints narrow a match to one column or constraint. A
//! hint matches when it equals the reported column or constraint name, or
//! when it appears (case-insensitively) in the error text.

use std::error::Error as StdError;
use txscope_driver::{codes, DbError, DriverError};

/// Finds the first [`DbError`] in `err`'s source chain.
pub fn db_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a DbError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(db) = e.downcast_ref::<DbError>() {
            return Some(db);
        }
        if let Some(db) = e.downcast_ref::<DriverError>().and_then(DriverError::as_db_error) {
            return Some(db);
        }
        current = e.source();
    }
    None
}

fn driver_error<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a DriverError> {
    std::iter::successors(Some(err), |&e| e.source())
        .filter_map(|e| e.downcast_ref::<DriverError>())
}

/// Returns true when `err` carries a store error with SQLSTATE `code` that
/// matches one of `cols`, or any store error with that code when `cols` is
/// empty.
pub fn is_error(err: &(dyn StdError + 'static), code: &str, cols: &[&str]) -> bool {
    let Some(db) = db_error(err) else {
        return false;
    };
    if db.code != code {
        return false;
    }
    if cols.is_empty() {
        return true;
    }

    if let Some(column) = db.column.as_deref() {
        if cols.contains(&column) {
            return true;
        }
    }
    if let Some(constraint) = db.constraint.as_deref() {
        if cols.contains(&constraint) {
            return true;
        }
    }

    let text = db.to_string().to_lowercase();
    cols.iter().any(|col| text.contains(&col.to_lowercase()))
}

/// Returns true when `err` means the query matched no rows.
///
/// Accepts both [`DriverError::NoRows`] and a store error with SQLSTATE
/// `02000`.
pub fn is_not_found_error(err: &(dyn StdError + 'static)) -> bool {
    driver_error(err).any(|e| matches!(e, DriverError::NoRows))
        || is_error(err, codes::NO_DATA, &[])
}

/// Returns true for a NOT NULL violation, optionally on one of `cols`.
pub fn is_not_null_violation_error(err: &(dyn StdError + 'static), cols: &[&str]) -> bool {
    is_error(err, codes::NOT_NULL_VIOLATION, cols)
}

/// Returns true for a foreign key violation, optionally on one of `cols`.
pub fn is_foreign_key_violation_error(err: &(dyn StdError + 'static), cols: &[&str]) -> bool {
    is_error(err, codes::FOREIGN_KEY_VIOLATION, cols)
}

/// Returns true for a unique violation, optionally on one of `cols`.
pub fn is_unique_violation_error(err: &(dyn StdError + 'static), cols: &[&str]) -> bool {
    is_error(err, codes::UNIQUE_VIOLATION, cols)
}

/// Returns true for conflicts that are resolved by replaying the transaction.
pub fn is_serialization_failure(err: &(dyn StdError + 'static)) -> bool {
    db_error(err).is_some_and(|db| codes::is_retryable(&db.code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use proptest::prelude::*;
    use std::fmt;

    fn unique(column: Option<&str>, constraint: Option<&str>, message: &str) -> DriverError {
        let mut db = DbError::new(codes::UNIQUE_VIOLATION, message);
        if let Some(column) = column {
            db = db.with_column(column);
        }
        if let Some(constraint) = constraint {
            db = db.with_constraint(constraint);
        }
        db.into()
    }

    #[derive(Debug)]
    struct AppError(Error);

    impl fmt::Display for AppError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "register user: {}", self.0)
        }
    }

    impl StdError for AppError {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn non_db_errors_never_match() {
        let err = DriverError::connection("refused");
        assert!(!is_error(&err, codes::UNIQUE_VIOLATION, &[]));
        assert!(!is_unique_violation_error(&err, &["name"]));
        assert!(!is_serialization_failure(&err));
        assert!(db_error(&err).is_none());
    }

    #[test]
    fn code_must_match() {
        let err = unique(Some("name"), None, "duplicate");
        assert!(!is_not_null_violation_error(&err, &[]));
        assert!(!is_foreign_key_violation_error(&err, &["name"]));
        assert!(is_unique_violation_error(&err, &[]));
    }

    #[test]
    fn column_hint_matches_exactly() {
        let err = unique(Some("name"), None, "duplicate key");
        assert!(is_unique_violation_error(&err, &["name"]));
        assert!(is_unique_violation_error(&err, &["email", "name"]));
        assert!(!is_unique_violation_error(&err, &["email"]));
    }

    #[test]
    fn constraint_hint_matches() {
        let err = unique(None, Some("users_name_key"), "duplicate key");
        assert!(is_unique_violation_error(&err, &["users_name_key"]));
    }

    #[test]
    fn message_hint_is_case_insensitive() {
        let err = unique(None, None, "UNIQUE constraint failed: users.Email");
        assert!(is_unique_violation_error(&err, &["email"]));
        assert!(is_unique_violation_error(&err, &["USERS"]));
        assert!(!is_unique_violation_error(&err, &["phone"]));
    }

    #[test]
    fn predicates_see_through_wrappers() {
        let err = AppError(Error::Commit(unique(Some("name"), None, "dup")));
        assert!(is_unique_violation_error(&err, &["name"]));
        assert_eq!(db_error(&err).unwrap().code, codes::UNIQUE_VIOLATION);

        let bare = DbError::new(codes::NOT_NULL_VIOLATION, "null value").with_column("email");
        assert!(is_not_null_violation_error(&bare, &["email"]));
    }

    #[test]
    fn not_found_accepts_both_forms() {
        assert!(is_not_found_error(&DriverError::NoRows));
        assert!(is_not_found_error(&Error::Driver(DriverError::NoRows)));
        let no_data: DriverError = DbError::new(codes::NO_DATA, "no data").into();
        assert!(is_not_found_error(&no_data));
        assert!(!is_not_found_error(&DriverError::TxClosed));
        assert!(!is_not_found_error(&unique(None, None, "dup")));
    }

    #[test]
    fn serialization_failures_include_deadlocks() {
        let conflict: DriverError = DbError::new(codes::SERIALIZATION_FAILURE, "retry").into();
        let deadlock: DriverError = DbError::new(codes::DEADLOCK_DETECTED, "deadlock").into();
        assert!(is_serialization_failure(&conflict));
        assert!(is_serialization_failure(&Error::Commit(deadlock)));
        assert!(!is_serialization_failure(&unique(None, None, "dup")));
    }

    proptest! {
        #[test]
        fn empty_hints_match_iff_code_matches(
            code in "[0-9A-Z]{5}",
            other in "[0-9A-Z]{5}",
            message in ".{0,40}",
        ) {
            let err: DriverError = DbError::new(code.clone(), message).into();
            prop_assert_eq!(is_error(&err, &other, &[]), code == other);
        }

        #[test]
        fn reported_column_always_matches_itself(column in "[a-z_]{1,16}") {
            let err = unique(Some(&column), None, "duplicate key");
            prop_assert!(is_unique_violation_error(&err, &[column.as_str()]));
        }

        #[test]
        fn hint_absent_everywhere_never_matches(hint in "[x-z]{12}") {
            let err = unique(Some("name"), Some("users_pkey"), "duplicate key value");
            prop_assert!(!is_unique_violation_error(&err, &[hint.as_str()]));
        }
    }
}
