//! Statement arguments and column values.

use crate::error::{DriverError, DriverResult};

/// A single SQL value, used both for statement arguments and result columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name used in decode errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Builds a `[Value; N]` argument list.
///
/// ```rust
/// use txscope_driver::{params, Value};
///
/// let args = params!["alice", 42, None::<i64>];
/// assert_eq!(args[0], Value::Text("alice".into()));
/// assert_eq!(args[2], Value::Null);
/// ```
#[macro_export]
macro_rules! params {
    () => {{
        let args: [$crate::Value; 0] = [];
        args
    }};
    ($($arg:expr),+ $(,)?) => {
        [$($crate::Value::from($arg)),+]
    };
}

/// Conversion from a column value.
pub trait FromValue: Sized {
    /// Converts `value`, taken from column `column`.
    fn from_value(value: &Value, column: &str) -> DriverResult<Self>;
}

fn mismatch(value: &Value, column: &str, want: &str) -> DriverError {
    DriverError::decode(
        column,
        format!("expected {want}, found {}", value.type_name()),
    )
}

impl FromValue for i64 {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        match value {
            Value::Integer(v) => Ok(*v),
            other => Err(mismatch(other, column, "integer")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        let v = i64::from_value(value, column)?;
        i32::try_from(v).map_err(|_| DriverError::decode(column, format!("{v} out of range for i32")))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        match value {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => Err(mismatch(other, column, "real")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        match value {
            Value::Integer(v) => Ok(*v != 0),
            other => Err(mismatch(other, column, "boolean")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(mismatch(other, column, "text")),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        match value {
            Value::Blob(v) => Ok(v.clone()),
            Value::Text(v) => Ok(v.as_bytes().to_vec()),
            other => Err(mismatch(other, column, "blob")),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value, column: &str) -> DriverResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}
