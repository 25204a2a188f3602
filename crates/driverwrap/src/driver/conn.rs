//! Connection contract and its optional capabilities

use std::sync::Arc;

use super::context::Context;
use super::rows::Rows;
use super::stmt::Stmt;
use super::tx::Tx;
use super::value::{ExecResult, NamedValue, TxOptions, Value};
use crate::error::DriverResult;
use crate::unwrap::Unwrap;

/// A database connection.
///
/// Optional capabilities are discovered through the `as_*` accessors. An
/// implementation exposes a capability by overriding its accessor to return
/// `Some(self)`; the defaults report the capability as absent.
pub trait Conn: Send + Sync {
    fn prepare(&self, query: &str) -> DriverResult<Arc<dyn Stmt>>;

    fn close(&self) -> DriverResult<()>;

    fn begin(&self) -> DriverResult<Arc<dyn Tx>>;

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        None
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        None
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        None
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        None
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        None
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        None
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        None
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        None
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }

    /// Present only on wrappers; see [`crate::unwrap`].
    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Conn>> {
        None
    }
}

pub trait Pinger {
    fn ping(&self, ctx: &Context) -> DriverResult<()>;
}

pub trait Execer {
    fn exec(&self, query: &str, args: &[Value]) -> DriverResult<Arc<dyn ExecResult>>;
}

pub trait ExecerContext {
    fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Arc<dyn ExecResult>>;
}

pub trait Queryer {
    fn query(&self, query: &str, args: &[Value]) -> DriverResult<Arc<dyn Rows>>;
}

pub trait QueryerContext {
    fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Arc<dyn Rows>>;
}

pub trait ConnPrepareContext {
    fn prepare_context(&self, ctx: &Context, query: &str) -> DriverResult<Arc<dyn Stmt>>;
}

pub trait ConnBeginTx {
    fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DriverResult<Arc<dyn Tx>>;
}

/// Called before a pooled connection is reused.
pub trait SessionResetter {
    fn reset_session(&self, ctx: &Context) -> DriverResult<()>;
}

pub trait Validator {
    fn is_valid(&self) -> bool;
}

/// Argument checking, shared by connections and statements.
///
/// May rewrite `value` in place; returning [`DriverError::skip`] falls back
/// to the default converter.
///
/// [`DriverError::skip`]: crate::DriverError::skip
pub trait NamedValueChecker {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()>;
}
