//! Materialized query results.

use crate::error::{DriverError, DriverResult};
use crate::value::{FromValue, Value};
use std::sync::Arc;

/// One result row.
///
/// Column names are shared between all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` must line up with `columns`.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns all values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the value of the first column named `name`.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    /// Decodes the value at `index`.
    pub fn try_get<T: FromValue>(&self, index: usize) -> DriverResult<T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| DriverError::decode(index, "column index out of range"))?;
        let name = self.columns.get(index).map_or("", String::as_str);
        T::from_value(value, name)
    }

    /// Decodes the value of the column named `name`.
    pub fn try_get_by_name<T: FromValue>(&self, name: &str) -> DriverResult<T> {
        let value = self
            .get_by_name(name)
            .ok_or_else(|| DriverError::decode(name, "no such column"))?;
        T::from_value(value, name)
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// A fully materialized result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rows {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl Rows {
    /// Creates a result set.
    #[must_use]
    pub fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the first row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Returns the first row, or [`DriverError::NoRows`].
    pub fn into_first(self) -> DriverResult<Row> {
        self.rows.into_iter().next().ok_or(DriverError::NoRows)
    }
}

impl IntoIterator for Rows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Outcome of an `exec` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandTag {
    /// Number of rows inserted, updated or deleted, or returned when the
    /// statement produces rows.
    pub rows_affected: u64,
}

impl CommandTag {
    /// Creates a tag.
    #[must_use]
    pub const fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }
}
