//! SQLSTATE error codes.
//!
//! Drivers report store errors with these five-character codes so that
//! callers never match on a store's native numbering.

/// Class 02, no data.
pub const NO_DATA: &str = "02000";

/// Class 23, generic integrity constraint violation.
pub const INTEGRITY_CONSTRAINT_VIOLATION: &str = "23000";

/// A `NOT NULL` column received a null.
pub const NOT_NULL_VIOLATION: &str = "23502";

/// A foreign key reference has no target.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// A unique or primary key constraint was violated.
pub const UNIQUE_VIOLATION: &str = "23505";

/// A `CHECK` constraint evaluated to false.
pub const CHECK_VIOLATION: &str = "23514";

/// The transaction lost a serialization conflict and may be retried.
pub const SERIALIZATION_FAILURE: &str = "40001";

/// The transaction was chosen as a deadlock victim and may be retried.
pub const DEADLOCK_DETECTED: &str = "40P01";

/// Anything the driver could not map more precisely.
pub const INTERNAL_ERROR: &str = "XX000";

/// Returns true for codes that signal a transient conflict.
#[must_use]
pub fn is_retryable(code: &str) -> bool {
    code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED
}
