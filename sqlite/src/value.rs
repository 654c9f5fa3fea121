//! SQLite value type and implementations

use trawl_core::sql::SqlParam;

#[cfg(feature = "rusqlite")]
use rusqlite::types::FromSql;

/// Represents a SQLite value bound to a compiled statement
#[derive(Debug, Clone, PartialEq, PartialOrd, Default)]
pub enum SqliteValue {
    /// Integer value (i64)
    Integer(i64),
    /// Real value (f64)
    Real(f64),
    /// Text value (owned string)
    Text(String),
    /// Blob value (owned binary data)
    Blob(Box<[u8]>),
    /// NULL value
    #[default]
    Null,
}

impl SqlParam for SqliteValue {}

impl std::fmt::Display for SqliteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            SqliteValue::Integer(i) => i.to_string(),
            SqliteValue::Real(r) => r.to_string(),
            SqliteValue::Text(s) => s.clone(),
            SqliteValue::Blob(b) => String::from_utf8_lossy(b).to_string(),
            SqliteValue::Null => String::new(),
        };
        write!(f, "{value}")
    }
}

impl From<i64> for SqliteValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqliteValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqliteValue {
    fn from(value: bool) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<&str> for SqliteValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqliteValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&serde_json::Value> for SqliteValue {
    /// JSON scalars bind natively; arrays and objects bind as their JSON text,
    /// which is how array columns are stored in the engine.
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Integer(*b as i64),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<serde_json::Value> for SqliteValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::from(&other),
        }
    }
}

impl From<SqliteValue> for serde_json::Value {
    fn from(value: SqliteValue) -> Self {
        match value {
            SqliteValue::Integer(i) => serde_json::Value::from(i),
            SqliteValue::Real(r) => serde_json::Value::from(r),
            SqliteValue::Text(s) => serde_json::Value::String(s),
            SqliteValue::Blob(b) => {
                serde_json::Value::String(String::from_utf8_lossy(&b).into_owned())
            }
            SqliteValue::Null => serde_json::Value::Null,
        }
    }
}

//------------------------------------------------------------------------------
// Database Driver Implementations
//------------------------------------------------------------------------------

#[cfg(feature = "rusqlite")]
impl rusqlite::ToSql for SqliteValue {
    fn to_sql(&self) -> ::rusqlite::Result<::rusqlite::types::ToSqlOutput<'_>> {
        match self {
            SqliteValue::Null => Ok(rusqlite::types::ToSqlOutput::Owned(
                rusqlite::types::Value::Null,
            )),
            SqliteValue::Integer(i) => Ok(rusqlite::types::ToSqlOutput::Owned(
                rusqlite::types::Value::Integer(*i),
            )),
            SqliteValue::Real(f) => Ok(rusqlite::types::ToSqlOutput::Owned(
                rusqlite::types::Value::Real(*f),
            )),
            SqliteValue::Text(s) => Ok(rusqlite::types::ToSqlOutput::Borrowed(
                rusqlite::types::ValueRef::Text(s.as_bytes()),
            )),
            SqliteValue::Blob(b) => Ok(rusqlite::types::ToSqlOutput::Borrowed(
                rusqlite::types::ValueRef::Blob(b.as_ref()),
            )),
        }
    }
}

#[cfg(feature = "rusqlite")]
impl FromSql for SqliteValue {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let result = match value {
            rusqlite::types::ValueRef::Null => SqliteValue::Null,
            rusqlite::types::ValueRef::Integer(i) => SqliteValue::Integer(i),
            rusqlite::types::ValueRef::Real(r) => SqliteValue::Real(r),
            rusqlite::types::ValueRef::Text(items) => {
                SqliteValue::Text(String::from_utf8_lossy(items).into_owned())
            }
            rusqlite::types::ValueRef::Blob(items) => {
                SqliteValue::Blob(items.to_vec().into_boxed_slice())
            }
        };
        Ok(result)
    }
}
