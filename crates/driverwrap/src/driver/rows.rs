//! Result cursor contract

use super::value::{ScanType, Value};
use crate::error::DriverResult;
use crate::unwrap::Unwrap;

/// Iterator over the rows of a query result.
pub trait Rows: Send + Sync {
    fn columns(&self) -> Vec<String>;

    fn close(&self) -> DriverResult<()>;

    /// Writes the next row into `dest`; `Ok(false)` once rows are exhausted.
    fn next(&self, dest: &mut [Value]) -> DriverResult<bool>;

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        None
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        None
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        None
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        None
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn ColumnTypeScanType> {
        None
    }

    fn as_next_result_set(&self) -> Option<&dyn RowsNextResultSet> {
        None
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Rows>> {
        None
    }
}

pub trait ColumnTypeDatabaseTypeName {
    fn column_type_database_type_name(&self, index: usize) -> String;
}

/// Length of variable-width columns; `None` when not applicable.
pub trait ColumnTypeLength {
    fn column_type_length(&self, index: usize) -> Option<i64>;
}

/// Nullability; `None` when unknown.
pub trait ColumnTypeNullable {
    fn column_type_nullable(&self, index: usize) -> Option<bool>;
}

/// Decimal `(precision, scale)`; `None` when not applicable.
pub trait ColumnTypePrecisionScale {
    fn column_type_precision_scale(&self, index: usize) -> Option<(i64, i64)>;
}

pub trait ColumnTypeScanType {
    fn column_type_scan_type(&self, index: usize) -> ScanType;
}

pub trait RowsNextResultSet {
    fn has_next_result_set(&self) -> bool;

    fn next_result_set(&self) -> DriverResult<()>;
}
