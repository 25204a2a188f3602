//! Prepared statement contract

use std::sync::Arc;

use super::conn::NamedValueChecker;
use super::context::Context;
use super::rows::Rows;
use super::value::{ExecResult, NamedValue, Value, ValueConverter};
use crate::error::DriverResult;
use crate::unwrap::Unwrap;

pub trait Stmt: Send + Sync {
    fn close(&self) -> DriverResult<()>;

    /// Number of placeholders, or `None` when the driver cannot tell.
    fn num_input(&self) -> Option<usize>;

    fn exec(&self, args: &[Value]) -> DriverResult<Arc<dyn ExecResult>>;

    fn query(&self, args: &[Value]) -> DriverResult<Arc<dyn Rows>>;

    fn as_column_converter(&self) -> Option<&dyn ColumnConverter> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        None
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        None
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Stmt>> {
        None
    }
}

pub trait ColumnConverter {
    fn column_converter(&self, index: usize) -> Arc<dyn ValueConverter>;
}

pub trait StmtExecContext {
    fn exec_context(&self, ctx: &Context, args: &[NamedValue])
    -> DriverResult<Arc<dyn ExecResult>>;
}

pub trait StmtQueryContext {
    fn query_context(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<Arc<dyn Rows>>;
}
