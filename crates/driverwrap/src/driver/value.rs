//! Values exchanged across the driver contract

use std::fmt;
use std::time::SystemTime;

use crate::error::{DriverError, DriverResult};

/// A single SQL value as seen by a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(SystemTime),
}

impl Value {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The scan type a column holding this value reports.
    #[must_use]
    pub const fn scan_type(&self) -> ScanType {
        match self {
            Self::Null => ScanType::Any,
            Self::Bool(_) => ScanType::Bool,
            Self::Int(_) => ScanType::Int,
            Self::Float(_) => ScanType::Float,
            Self::Text(_) => ScanType::Text,
            Self::Bytes(_) => ScanType::Bytes,
            Self::Timestamp(_) => ScanType::Timestamp,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
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

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<SystemTime> for Value {
    fn from(v: SystemTime) -> Self {
        Self::Timestamp(v)
    }
}

/// Argument of a context-aware call; `ordinal` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub name: Option<String>,
    pub ordinal: usize,
    pub value: Value,
}

impl NamedValue {
    #[must_use]
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>, ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value: value.into(),
        }
    }
}

/// Kind of value a result column scans into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanType {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
}

/// Transaction isolation requested by `begin_tx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    WriteCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
    Linearizable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "Default",
            Self::ReadUncommitted => "Read Uncommitted",
            Self::ReadCommitted => "Read Committed",
            Self::WriteCommitted => "Write Committed",
            Self::RepeatableRead => "Repeatable Read",
            Self::Snapshot => "Snapshot",
            Self::Serializable => "Serializable",
            Self::Linearizable => "Linearizable",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

/// Outcome of an exec call.
pub trait ExecResult: Send + Sync {
    fn last_insert_id(&self) -> DriverResult<i64>;

    fn rows_affected(&self) -> DriverResult<i64>;
}

/// Exec outcome for drivers that only know the affected row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected(pub i64);

impl ExecResult for RowsAffected {
    fn last_insert_id(&self) -> DriverResult<i64> {
        Err(DriverError::message(
            "no LastInsertId available after DDL statement",
        ))
    }

    fn rows_affected(&self) -> DriverResult<i64> {
        Ok(self.0)
    }
}

/// Converts an argument into a value the driver accepts.
pub trait ValueConverter: Send + Sync {
    fn convert_value(&self, value: Value) -> DriverResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_type_follows_variant() {
        assert_eq!(Value::from(7_i64).scan_type(), ScanType::Int);
        assert_eq!(Value::from("a").scan_type(), ScanType::Text);
        assert_eq!(Value::Null.scan_type(), ScanType::Any);
    }

    #[test]
    fn test_named_value_constructors() {
        let v = NamedValue::named("id", 1, 42_i64);
        assert_eq!(v.name.as_deref(), Some("id"));
        assert_eq!(v.value, Value::Int(42));
        assert!(NamedValue::positional(2, Value::Null).name.is_none());
    }

    #[test]
    fn test_rows_affected() {
        let r = RowsAffected(3);
        assert_eq!(r.rows_affected().unwrap(), 3);
        assert!(r.last_insert_id().is_err());
    }

    #[test]
    fn test_isolation_display() {
        assert_eq!(IsolationLevel::RepeatableRead.to_string(), "Repeatable Read");
        assert_eq!(TxOptions::default().isolation, IsolationLevel::Default);
    }
}
