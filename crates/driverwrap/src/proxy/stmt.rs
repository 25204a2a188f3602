//! Prepared statement proxy

use std::fmt;
use std::sync::Arc;

use super::{exposed, required};
use crate::driver::{
    ColumnConverter, Context, ExecResult, NamedValue, NamedValueChecker, Rows, Stmt,
    StmtExecContext, StmtQueryContext, Value, ValueConverter,
};
use crate::error::DriverResult;
use crate::registry::{self, CapabilitySet, stmt};
use crate::unwrap::Unwrap;

hooks! {
    /// Interceptors for [`Stmt`] and its optional capabilities.
    pub struct StmtHooks {
        close: StmtCloseFn, StmtCloseHook = Fn() -> DriverResult<()>;
        num_input: StmtNumInputFn, StmtNumInputHook = Fn() -> Option<usize>;
        exec: StmtExecFn, StmtExecHook = Fn(&[Value]) -> DriverResult<Arc<dyn ExecResult>>;
        query: StmtQueryFn, StmtQueryHook = Fn(&[Value]) -> DriverResult<Arc<dyn Rows>>;
        column_converter: StmtColumnConverterFn, StmtColumnConverterHook =
            Fn(usize) -> Arc<dyn ValueConverter>;
        check_named_value: StmtCheckNamedValueFn, StmtCheckNamedValueHook =
            Fn(&mut NamedValue) -> DriverResult<()>;
        exec_context: StmtExecContextFn, StmtExecContextHook =
            Fn(&Context, &[NamedValue]) -> DriverResult<Arc<dyn ExecResult>>;
        query_context: StmtQueryContextFn, StmtQueryContextHook =
            Fn(&Context, &[NamedValue]) -> DriverResult<Arc<dyn Rows>>;
    }
}

/// Forwarding wrapper around a prepared statement.
pub struct StmtProxy {
    wrapped: Arc<dyn Stmt>,
    hooks: StmtHooks,
    capabilities: CapabilitySet,
}

impl StmtProxy {
    pub fn new(wrapped: Arc<dyn Stmt>, hooks: StmtHooks) -> Self {
        let capabilities = registry::detect(&*wrapped, &registry::STMT);
        tracing::debug!(
            variant = registry::STMT.name,
            capabilities = ?registry::STMT.describe(capabilities),
            hooks = ?hooks.installed(),
            "wrapping statement"
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

impl fmt::Debug for StmtProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StmtProxy")
            .field("capabilities", &registry::STMT.describe(self.capabilities))
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

pub fn wrap_stmt(wrapped: Arc<dyn Stmt>, hooks: StmtHooks) -> Arc<dyn Stmt> {
    Arc::new(StmtProxy::new(wrapped, hooks))
}

impl Unwrap<dyn Stmt> for StmtProxy {
    fn unwrap_inner(&self) -> Arc<dyn Stmt> {
        Arc::clone(&self.wrapped)
    }
}

impl Stmt for StmtProxy {
    fn close(&self) -> DriverResult<()> {
        forward!(self.hooks.close, &*self.wrapped => close())
    }

    fn num_input(&self) -> Option<usize> {
        forward!(self.hooks.num_input, &*self.wrapped => num_input())
    }

    fn exec(&self, args: &[Value]) -> DriverResult<Arc<dyn ExecResult>> {
        forward!(self.hooks.exec, &*self.wrapped => exec(args: &[Value]))
    }

    fn query(&self, args: &[Value]) -> DriverResult<Arc<dyn Rows>> {
        forward!(self.hooks.query, &*self.wrapped => query(args: &[Value]))
    }

    fn as_column_converter(&self) -> Option<&dyn ColumnConverter> {
        exposed(self.capabilities, stmt::COLUMN_CONVERTER, self as &dyn ColumnConverter)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        exposed(self.capabilities, stmt::NAMED_VALUE_CHECKER, self as &dyn NamedValueChecker)
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        exposed(self.capabilities, stmt::EXEC_CONTEXT, self as &dyn StmtExecContext)
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        exposed(self.capabilities, stmt::QUERY_CONTEXT, self as &dyn StmtQueryContext)
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Stmt>> {
        Some(self)
    }
}

impl ColumnConverter for StmtProxy {
    fn column_converter(&self, index: usize) -> Arc<dyn ValueConverter> {
        let converter = required(
            self.wrapped.as_column_converter(),
            "statement",
            "ColumnConverter",
        );
        forward!(self.hooks.column_converter, converter => column_converter(index: usize))
    }
}

impl NamedValueChecker for StmtProxy {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()> {
        let checker = required(
            self.wrapped.as_named_value_checker(),
            "statement",
            "NamedValueChecker",
        );
        forward!(
            self.hooks.check_named_value,
            checker => check_named_value(value: &mut NamedValue)
        )
    }
}

impl StmtExecContext for StmtProxy {
    fn exec_context(
        &self,
        ctx: &Context,
        args: &[NamedValue],
    ) -> DriverResult<Arc<dyn ExecResult>> {
        let execer = required(self.wrapped.as_exec_context(), "statement", "StmtExecContext");
        forward!(
            self.hooks.exec_context,
            execer => exec_context(ctx: &Context, args: &[NamedValue])
        )
    }
}

impl StmtQueryContext for StmtProxy {
    fn query_context(&self, ctx: &Context, args: &[NamedValue]) -> DriverResult<Arc<dyn Rows>> {
        let queryer = required(
            self.wrapped.as_query_context(),
            "statement",
            "StmtQueryContext",
        );
        forward!(
            self.hooks.query_context,
            queryer => query_context(ctx: &Context, args: &[NamedValue])
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DriverError;
    use crate::testing::FakeStmt;
    use crate::unwrap::unwrap_stmt;

    #[test]
    fn test_capability_parity_for_every_subset() {
        for bits in 0..=registry::STMT.full().bits() {
            let expected = CapabilitySet::from_bits(bits);
            let proxy = wrap_stmt(Arc::new(FakeStmt::new(expected)), StmtHooks::new());
            assert_eq!(registry::detect(&*proxy, &registry::STMT), expected);
        }
    }

    #[test]
    fn test_num_input_unknown_is_preserved() {
        let proxy = wrap_stmt(
            Arc::new(FakeStmt::new(CapabilitySet::EMPTY).with_num_input(None)),
            StmtHooks::new(),
        );
        assert_eq!(proxy.num_input(), None);

        let proxy = wrap_stmt(
            Arc::new(FakeStmt::new(CapabilitySet::EMPTY).with_num_input(Some(2))),
            StmtHooks::new(),
        );
        assert_eq!(proxy.num_input(), Some(2));
    }

    #[test]
    fn test_exec_hook_counts_rows() {
        let inner = Arc::new(FakeStmt::new(registry::STMT.full()));
        let hooks = StmtHooks::new().with_exec(|original| {
            Box::new(move |args: &[Value]| -> DriverResult<Arc<dyn ExecResult>> {
                let result = original(args)?;
                assert_eq!(result.rows_affected()?, 1);
                Ok(result)
            })
        });
        let proxy = wrap_stmt(inner.clone(), hooks);

        proxy.exec(&[Value::Int(3)]).unwrap();
        assert_eq!(inner.calls().count("exec"), 1);
    }

    #[test]
    fn test_context_methods_forward_errors() {
        let inner = Arc::new(
            FakeStmt::new(registry::STMT.full())
                .fail("exec_context", DriverError::deadline_exceeded()),
        );
        let proxy = wrap_stmt(inner.clone(), StmtHooks::new());
        let ctx = Context::background();

        let err = proxy
            .as_exec_context()
            .unwrap()
            .exec_context(&ctx, &[])
            .err()
            .unwrap();
        assert!(err.is_deadline_exceeded());
        assert!(err.is_context_done());

        proxy
            .as_query_context()
            .unwrap()
            .query_context(&ctx, &[NamedValue::named("id", 1, 9_i64)])
            .unwrap();
        assert_eq!(inner.calls().count("query_context"), 1);
    }

    #[test]
    fn test_skip_from_checker_passes_through() {
        let inner = Arc::new(
            FakeStmt::new(CapabilitySet::EMPTY.with(stmt::NAMED_VALUE_CHECKER))
                .fail("check_named_value", DriverError::skip()),
        );
        let proxy = wrap_stmt(inner, StmtHooks::new());
        let mut value = NamedValue::positional(1, true);
        let err = proxy
            .as_named_value_checker()
            .unwrap()
            .check_named_value(&mut value)
            .unwrap_err();
        assert!(err.is_skip());
    }

    #[test]
    fn test_column_converter_forwarded() {
        let inner = Arc::new(FakeStmt::new(
            CapabilitySet::EMPTY.with(stmt::COLUMN_CONVERTER),
        ));
        let proxy = wrap_stmt(inner.clone(), StmtHooks::new());
        let converter = proxy.as_column_converter().unwrap().column_converter(0);
        assert_eq!(
            converter.convert_value(Value::Int(5)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(inner.calls().count("column_converter"), 1);
        assert!(proxy.as_exec_context().is_none());
    }

    #[test]
    fn test_unwrap_identity() {
        let original: Arc<dyn Stmt> = Arc::new(FakeStmt::new(CapabilitySet::EMPTY));
        let proxy = wrap_stmt(Arc::clone(&original), StmtHooks::new());
        assert!(Arc::ptr_eq(&unwrap_stmt(&proxy), &original));
    }
}
