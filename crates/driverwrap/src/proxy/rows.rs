//! Result cursor proxy

use std::fmt;
use std::sync::Arc;

use super::{exposed, required};
use crate::driver::{
    ColumnTypeDatabaseTypeName, ColumnTypeLength, ColumnTypeNullable, ColumnTypePrecisionScale,
    ColumnTypeScanType, Rows, RowsNextResultSet, ScanType, Value,
};
use crate::error::DriverResult;
use crate::registry::{self, CapabilitySet, rows};
use crate::unwrap::Unwrap;

hooks! {
    /// Interceptors for [`Rows`] and its column metadata capabilities.
    pub struct RowsHooks {
        columns: RowsColumnsFn, RowsColumnsHook = Fn() -> Vec<String>;
        close: RowsCloseFn, RowsCloseHook = Fn() -> DriverResult<()>;
        next: RowsNextFn, RowsNextHook = Fn(&mut [Value]) -> DriverResult<bool>;
        column_type_database_type_name: RowsColumnTypeDatabaseTypeNameFn,
            RowsColumnTypeDatabaseTypeNameHook = Fn(usize) -> String;
        column_type_length: RowsColumnTypeLengthFn, RowsColumnTypeLengthHook =
            Fn(usize) -> Option<i64>;
        column_type_nullable: RowsColumnTypeNullableFn, RowsColumnTypeNullableHook =
            Fn(usize) -> Option<bool>;
        column_type_precision_scale: RowsColumnTypePrecisionScaleFn,
            RowsColumnTypePrecisionScaleHook = Fn(usize) -> Option<(i64, i64)>;
        column_type_scan_type: RowsColumnTypeScanTypeFn, RowsColumnTypeScanTypeHook =
            Fn(usize) -> ScanType;
        has_next_result_set: RowsHasNextResultSetFn, RowsHasNextResultSetHook = Fn() -> bool;
        next_result_set: RowsNextResultSetFn, RowsNextResultSetHook = Fn() -> DriverResult<()>;
    }
}

/// Forwarding wrapper around a result cursor.
pub struct RowsProxy {
    wrapped: Arc<dyn Rows>,
    hooks: RowsHooks,
    capabilities: CapabilitySet,
}

impl RowsProxy {
    pub fn new(wrapped: Arc<dyn Rows>, hooks: RowsHooks) -> Self {
        let capabilities = registry::detect(&*wrapped, &registry::ROWS);
        tracing::debug!(
            variant = registry::ROWS.name,
            capabilities = ?registry::ROWS.describe(capabilities),
            hooks = ?hooks.installed(),
            "wrapping rows"
        );
        Self {
            wrapped,
            hooks,
            capabilities,
        }
    }

    #[must_use]
    pub const fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }
}

impl fmt::Debug for RowsProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowsProxy")
            .field("capabilities", &registry::ROWS.describe(self.capabilities))
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

pub fn wrap_rows(wrapped: Arc<dyn Rows>, hooks: RowsHooks) -> Arc<dyn Rows> {
    Arc::new(RowsProxy::new(wrapped, hooks))
}

impl Unwrap<dyn Rows> for RowsProxy {
    fn unwrap_inner(&self) -> Arc<dyn Rows> {
        Arc::clone(&self.wrapped)
    }
}

impl Rows for RowsProxy {
    fn columns(&self) -> Vec<String> {
        forward!(self.hooks.columns, &*self.wrapped => columns())
    }

    fn close(&self) -> DriverResult<()> {
        forward!(self.hooks.close, &*self.wrapped => close())
    }

    fn next(&self, dest: &mut [Value]) -> DriverResult<bool> {
        forward!(self.hooks.next, &*self.wrapped => next(dest: &mut [Value]))
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        exposed(
            self.capabilities,
            rows::DATABASE_TYPE_NAME,
            self as &dyn ColumnTypeDatabaseTypeName,
        )
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        exposed(self.capabilities, rows::LENGTH, self as &dyn ColumnTypeLength)
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        exposed(self.capabilities, rows::NULLABLE, self as &dyn ColumnTypeNullable)
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        exposed(self.capabilities, rows::PRECISION_SCALE, self as &dyn ColumnTypePrecisionScale)
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn ColumnTypeScanType> {
        exposed(self.capabilities, rows::SCAN_TYPE, self as &dyn ColumnTypeScanType)
    }

    fn as_next_result_set(&self) -> Option<&dyn RowsNextResultSet> {
        exposed(self.capabilities, rows::NEXT_RESULT_SET, self as &dyn RowsNextResultSet)
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Rows>> {
        Some(self)
    }
}

impl ColumnTypeDatabaseTypeName for RowsProxy {
    fn column_type_database_type_name(&self, index: usize) -> String {
        let meta = required(
            self.wrapped.as_column_type_database_type_name(),
            "rows",
            "ColumnTypeDatabaseTypeName",
        );
        forward!(
            self.hooks.column_type_database_type_name,
            meta => column_type_database_type_name(index: usize)
        )
    }
}

impl ColumnTypeLength for RowsProxy {
    fn column_type_length(&self, index: usize) -> Option<i64> {
        let meta = required(self.wrapped.as_column_type_length(), "rows", "ColumnTypeLength");
        forward!(self.hooks.column_type_length, meta => column_type_length(index: usize))
    }
}

impl ColumnTypeNullable for RowsProxy {
    fn column_type_nullable(&self, index: usize) -> Option<bool> {
        let meta = required(
            self.wrapped.as_column_type_nullable(),
            "rows",
            "ColumnTypeNullable",
        );
        forward!(self.hooks.column_type_nullable, meta => column_type_nullable(index: usize))
    }
}

impl ColumnTypePrecisionScale for RowsProxy {
    fn column_type_precision_scale(&self, index: usize) -> Option<(i64, i64)> {
        let meta = required(
            self.wrapped.as_column_type_precision_scale(),
            "rows",
            "ColumnTypePrecisionScale",
        );
        forward!(
            self.hooks.column_type_precision_scale,
            meta => column_type_precision_scale(index: usize)
        )
    }
}

impl ColumnTypeScanType for RowsProxy {
    fn column_type_scan_type(&self, index: usize) -> ScanType {
        let meta = required(
            self.wrapped.as_column_type_scan_type(),
            "rows",
            "ColumnTypeScanType",
        );
        forward!(self.hooks.column_type_scan_type, meta => column_type_scan_type(index: usize))
    }
}

impl RowsNextResultSet for RowsProxy {
    fn has_next_result_set(&self) -> bool {
        let sets = required(self.wrapped.as_next_result_set(), "rows", "RowsNextResultSet");
        forward!(self.hooks.has_next_result_set, sets => has_next_result_set())
    }

    fn next_result_set(&self) -> DriverResult<()> {
        let sets = required(self.wrapped.as_next_result_set(), "rows", "RowsNextResultSet");
        forward!(self.hooks.next_result_set, sets => next_result_set())
    }
}
