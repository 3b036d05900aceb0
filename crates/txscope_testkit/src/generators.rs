//! Property-based test generators using proptest.

use proptest::prelude::*;
use txscope_driver::{codes, DbError, DriverError};

/// SQLSTATE codes the classifier knows about.
pub const KNOWN_CODES: &[&str] = &[
    codes::NO_DATA,
    codes::INTEGRITY_CONSTRAINT_VIOLATION,
    codes::NOT_NULL_VIOLATION,
    codes::FOREIGN_KEY_VIOLATION,
    codes::UNIQUE_VIOLATION,
    codes::CHECK_VIOLATION,
    codes::SERIALIZATION_FAILURE,
    codes::DEADLOCK_DETECTED,
    codes::INTERNAL_ERROR,
];

/// Strategy for SQLSTATE codes, mostly known ones.
pub fn sqlstate_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::sample::select(KNOWN_CODES).prop_map(str::to_owned),
        1 => prop::string::string_regex("[0-9A-Z]{5}").expect("Invalid regex"),
    ]
}

/// Strategy for SQL identifiers.
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for store errors, with and without object names.
pub fn db_error_strategy() -> impl Strategy<Value = DbError> {
    (
        sqlstate_strategy(),
        ".{0,60}",
        prop::option::of(identifier_strategy()),
        prop::option::of(identifier_strategy()),
        prop::option::of(identifier_strategy()),
    )
        .prop_map(|(code, message, table, column, constraint)| DbError {
            code,
            message,
            table,
            column,
            constraint,
        })
}

/// Strategy for driver errors of every kind.
pub fn driver_error_strategy() -> impl Strategy<Value = DriverError> {
    prop_oneof![
        4 => db_error_strategy().prop_map(DriverError::Db),
        1 => Just(DriverError::NoRows),
        1 => Just(DriverError::TxClosed),
        1 => ".{0,30}".prop_map(DriverError::Connection),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn identifiers_are_lowercase(name in identifier_strategy()) {
            prop_assert!(!name.is_empty());
            prop_assert_eq!(name.to_lowercase(), name);
        }

        #[test]
        fn sqlstates_have_five_chars(code in sqlstate_strategy()) {
            prop_assert_eq!(code.len(), 5);
        }
    }
}
