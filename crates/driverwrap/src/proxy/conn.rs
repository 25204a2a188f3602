//! Connection proxy

use std::fmt;
use std::sync::Arc;

use super::{exposed, required};
use crate::driver::{
    Conn, ConnBeginTx, ConnPrepareContext, Context, ExecResult, Execer, ExecerContext, NamedValue,
    NamedValueChecker, Pinger, Queryer, QueryerContext, Rows, SessionResetter, Stmt, Tx,
    TxOptions, Validator, Value,
};
use crate::error::DriverResult;
use crate::registry::{self, CapabilitySet, conn};
use crate::unwrap::Unwrap;

hooks! {
    /// Interceptors for [`Conn`] and all of its optional capabilities.
    pub struct ConnHooks {
        prepare: ConnPrepareFn, ConnPrepareHook = Fn(&str) -> DriverResult<Arc<dyn Stmt>>;
        close: ConnCloseFn, ConnCloseHook = Fn() -> DriverResult<()>;
        begin: ConnBeginFn, ConnBeginHook = Fn() -> DriverResult<Arc<dyn Tx>>;
        ping: ConnPingFn, ConnPingHook = Fn(&Context) -> DriverResult<()>;
        exec: ConnExecFn, ConnExecHook = Fn(&str, &[Value]) -> DriverResult<Arc<dyn ExecResult>>;
        exec_context: ConnExecContextFn, ConnExecContextHook =
            Fn(&Context, &str, &[NamedValue]) -> DriverResult<Arc<dyn ExecResult>>;
        query: ConnQueryFn, ConnQueryHook = Fn(&str, &[Value]) -> DriverResult<Arc<dyn Rows>>;
        query_context: ConnQueryContextFn, ConnQueryContextHook =
            Fn(&Context, &str, &[NamedValue]) -> DriverResult<Arc<dyn Rows>>;
        prepare_context: ConnPrepareContextFn, ConnPrepareContextHook =
            Fn(&Context, &str) -> DriverResult<Arc<dyn Stmt>>;
        begin_tx: ConnBeginTxFn, ConnBeginTxHook = Fn(&Context, TxOptions) -> DriverResult<Arc<dyn Tx>>;
        reset_session: ConnResetSessionFn, ConnResetSessionHook = Fn(&Context) -> DriverResult<()>;
        is_valid: ConnIsValidFn, ConnIsValidHook = Fn() -> bool;
        check_named_value: ConnCheckNamedValueFn, ConnCheckNamedValueHook =
            Fn(&mut NamedValue) -> DriverResult<()>;
    }
}

/// Forwarding wrapper around a connection.
pub struct ConnProxy {
    wrapped: Arc<dyn Conn>,
    hooks: ConnHooks,
    capabilities: CapabilitySet,
}

impl ConnProxy {
    pub fn new(wrapped: Arc<dyn Conn>, hooks: ConnHooks) -> Self {
        let capabilities = registry::detect(&*wrapped, &registry::CONN);
        tracing::debug!(
            variant = registry::CONN.name,
            capabilities = ?registry::CONN.describe(capabilities),
            hooks = ?hooks.installed(),
            "wrapping connection"
        );
        Self {
            wrapped,
            hooks,
            capabilities,
        }
    }

    /// Capabilities detected on the wrapped connection.
    #[must_use]
    pub const fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }
}

impl fmt::Debug for ConnProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnProxy")
            .field("capabilities", &registry::CONN.describe(self.capabilities))
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Wraps `wrapped` so that every call passes through `hooks`.
pub fn wrap_conn(wrapped: Arc<dyn Conn>, hooks: ConnHooks) -> Arc<dyn Conn> {
    Arc::new(ConnProxy::new(wrapped, hooks))
}

impl Unwrap<dyn Conn> for ConnProxy {
    fn unwrap_inner(&self) -> Arc<dyn Conn> {
        Arc::clone(&self.wrapped)
    }
}

impl Conn for ConnProxy {
    fn prepare(&self, query: &str) -> DriverResult<Arc<dyn Stmt>> {
        forward!(self.hooks.prepare, &*self.wrapped => prepare(query: &str))
    }

    fn close(&self) -> DriverResult<()> {
        forward!(self.hooks.close, &*self.wrapped => close())
    }

    fn begin(&self) -> DriverResult<Arc<dyn Tx>> {
        forward!(self.hooks.begin, &*self.wrapped => begin())
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        exposed(self.capabilities, conn::PINGER, self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        exposed(self.capabilities, conn::EXECER, self as &dyn Execer)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        exposed(self.capabilities, conn::EXECER_CONTEXT, self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        exposed(self.capabilities, conn::QUERYER, self as &dyn Queryer)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        exposed(self.capabilities, conn::QUERYER_CONTEXT, self as &dyn QueryerContext)
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        exposed(self.capabilities, conn::PREPARE_CONTEXT, self as &dyn ConnPrepareContext)
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        exposed(self.capabilities, conn::BEGIN_TX, self as &dyn ConnBeginTx)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        exposed(self.capabilities, conn::SESSION_RESETTER, self as &dyn SessionResetter)
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        exposed(self.capabilities, conn::VALIDATOR, self as &dyn Validator)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        exposed(self.capabilities, conn::NAMED_VALUE_CHECKER, self as &dyn NamedValueChecker)
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Conn>> {
        Some(self)
    }
}

impl Pinger for ConnProxy {
    fn ping(&self, ctx: &Context) -> DriverResult<()> {
        let pinger = required(self.wrapped.as_pinger(), "connection", "Pinger");
        forward!(self.hooks.ping, pinger => ping(ctx: &Context))
    }
}

impl Execer for ConnProxy {
    fn exec(&self, query: &str, args: &[Value]) -> DriverResult<Arc<dyn ExecResult>> {
        let execer = required(self.wrapped.as_execer(), "connection", "Execer");
        forward!(self.hooks.exec, execer => exec(query: &str, args: &[Value]))
    }
}

impl ExecerContext for ConnProxy {
    fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Arc<dyn ExecResult>> {
        let execer = required(
            self.wrapped.as_execer_context(),
            "connection",
            "ExecerContext",
        );
        forward!(
            self.hooks.exec_context,
            execer => exec_context(ctx: &Context, query: &str, args: &[NamedValue])
        )
    }
}

impl Queryer for ConnProxy {
    fn query(&self, query: &str, args: &[Value]) -> DriverResult<Arc<dyn Rows>> {
        let queryer = required(self.wrapped.as_queryer(), "connection", "Queryer");
        forward!(self.hooks.query, queryer => query(query: &str, args: &[Value]))
    }
}

impl QueryerContext for ConnProxy {
    fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DriverResult<Arc<dyn Rows>> {
        let queryer = required(
            self.wrapped.as_queryer_context(),
            "connection",
            "QueryerContext",
        );
        forward!(
            self.hooks.query_context,
            queryer => query_context(ctx: &Context, query: &str, args: &[NamedValue])
        )
    }
}

impl ConnPrepareContext for ConnProxy {
    fn prepare_context(&self, ctx: &Context, query: &str) -> DriverResult<Arc<dyn Stmt>> {
        let preparer = required(
            self.wrapped.as_prepare_context(),
            "connection",
            "ConnPrepareContext",
        );
        forward!(
            self.hooks.prepare_context,
            preparer => prepare_context(ctx: &Context, query: &str)
        )
    }
}

impl ConnBeginTx for ConnProxy {
    fn begin_tx(&self, ctx: &Context, opts: TxOptions) -> DriverResult<Arc<dyn Tx>> {
        let beginner = required(self.wrapped.as_begin_tx(), "connection", "ConnBeginTx");
        forward!(self.hooks.begin_tx, beginner => begin_tx(ctx: &Context, opts: TxOptions))
    }
}

impl SessionResetter for ConnProxy {
    fn reset_session(&self, ctx: &Context) -> DriverResult<()> {
        let resetter = required(
            self.wrapped.as_session_resetter(),
            "connection",
            "SessionResetter",
        );
        forward!(self.hooks.reset_session, resetter => reset_session(ctx: &Context))
    }
}

impl Validator for ConnProxy {
    fn is_valid(&self) -> bool {
        let validator = required(self.wrapped.as_validator(), "connection", "Validator");
        forward!(self.hooks.is_valid, validator => is_valid())
    }
}

impl NamedValueChecker for ConnProxy {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()> {
        let checker = required(
            self.wrapped.as_named_value_checker(),
            "connection",
            "NamedValueChecker",
        );
        forward!(
            self.hooks.check_named_value,
            checker => check_named_value(value: &mut NamedValue)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::DriverError;
    use crate::testing::FakeConn;
    use crate::unwrap::{unwrap_all, unwrap_conn};

    fn fake(capabilities: CapabilitySet) -> Arc<FakeConn> {
        Arc::new(FakeConn::new(capabilities))
    }

    #[test]
    fn test_capability_parity_for_every_subset() {
        for bits in 0..=registry::CONN.full().bits() {
            let expected = CapabilitySet::from_bits(bits);
            let proxy = wrap_conn(fake(expected), ConnHooks::new());

            assert_eq!(registry::detect(&*proxy, &registry::CONN), expected);
            assert!(proxy.as_unwrap().is_some());
        }
    }

    #[test]
    fn test_detection_probes_each_capability_once() {
        let inner = fake(registry::CONN.full());
        let _proxy = wrap_conn(inner.clone(), ConnHooks::new());
        assert_eq!(inner.calls().count("probe"), registry::CONN.len());
    }

    #[test]
    fn test_forwarded_call_resolves_view_without_redetecting() {
        let inner = fake(registry::CONN.full());
        let proxy = wrap_conn(inner.clone(), ConnHooks::new());
        let ctx = Context::background();

        let pinger = proxy.as_pinger().unwrap();
        pinger.ping(&ctx).unwrap();
        pinger.ping(&ctx).unwrap();

        // One view lookup per forwarded call on top of the wrap-time probes.
        assert_eq!(inner.calls().count("probe"), registry::CONN.len() + 2);
        assert_eq!(inner.calls().count("ping"), 2);
    }

    #[test]
    fn test_scenario_ping_and_query_only() {
        let caps = CapabilitySet::EMPTY
            .with(conn::PINGER)
            .with(conn::QUERYER);
        let inner = Arc::new(FakeConn::new(caps).fail("ping", DriverError::bad_conn()));

        let pings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pings);
        let hooks = ConnHooks::new().with_ping(move |original| {
            let counter = Arc::clone(&counter);
            Box::new(move |ctx: &Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                original(ctx)
            })
        });
        let proxy = wrap_conn(inner.clone(), hooks);

        assert!(proxy.as_pinger().is_some());
        assert!(proxy.as_queryer().is_some());
        assert!(proxy.as_begin_tx().is_none());
        assert!(proxy.as_execer().is_none());

        let err = proxy
            .as_pinger()
            .unwrap()
            .ping(&Context::background())
            .unwrap_err();
        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert!(err.is_bad_conn());
        assert_eq!(inner.calls().count("ping"), 1);
    }

    #[test]
    fn test_forwarding_without_hooks_calls_once() {
        let inner = fake(registry::CONN.full());
        let proxy = wrap_conn(inner.clone(), ConnHooks::new());
        let ctx = Context::background();

        proxy.as_pinger().unwrap().ping(&ctx).unwrap();
        let result = proxy
            .as_execer()
            .unwrap()
            .exec("DELETE FROM t", &[Value::Int(1)])
            .unwrap();
        assert_eq!(result.rows_affected().unwrap(), 1);
        assert!(proxy.as_validator().unwrap().is_valid());
        proxy.close().unwrap();

        assert_eq!(inner.calls().count("ping"), 1);
        assert_eq!(inner.calls().count("exec"), 1);
        assert_eq!(inner.calls().count("is_valid"), 1);
        assert_eq!(inner.calls().count("close"), 1);
    }

    #[test]
    fn test_errors_propagate_unchanged() {
        let inner = Arc::new(
            FakeConn::new(registry::CONN.full())
                .fail("prepare", DriverError::message("syntax error at or near \"SELEC\""))
                .fail("begin_tx", DriverError::canceled()),
        );
        let proxy = wrap_conn(inner, ConnHooks::new());

        let err = proxy.prepare("SELEC 1").err().unwrap();
        assert_eq!(err.to_string(), "syntax error at or near \"SELEC\"");

        let err = proxy
            .as_begin_tx()
            .unwrap()
            .begin_tx(&Context::background(), TxOptions::default())
            .err()
            .unwrap();
        assert!(err.is_canceled());
    }

    #[test]
    fn test_error_cause_survives_forwarding() {
        use std::error::Error as _;

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let inner = Arc::new(
            FakeConn::new(CapabilitySet::EMPTY.with(conn::PINGER))
                .fail("ping", DriverError::other("ping failed", reset)),
        );
        let hooks = ConnHooks::new().with_ping(|original| original);
        let proxy = wrap_conn(inner, hooks);

        let err = proxy
            .as_pinger()
            .unwrap()
            .ping(&Context::background())
            .unwrap_err();
        assert_eq!(err.to_string(), "ping failed");
        let cause = err.source().map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("reset by peer"));
    }

    #[test]
    fn test_no_result_caching() {
        let inner = fake(registry::CONN.full());
        let proxy = wrap_conn(inner.clone(), ConnHooks::new());
        let queryer = proxy.as_queryer().unwrap();

        let first = queryer.query("SELECT 1", &[]).unwrap();
        let second = queryer.query("SELECT 1", &[]).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(inner.calls().count("query"), 2);
    }

    #[test]
    fn test_hook_may_substitute_result() {
        let inner = fake(registry::CONN.full());
        let hooks = ConnHooks::new()
            .with_is_valid(|_original| Box::new(|| false))
            .with_reset_session(|original| {
                Box::new(move |ctx: &Context| {
                    original(ctx)?;
                    original(ctx)
                })
            });
        let proxy = wrap_conn(inner.clone(), hooks);

        assert!(!proxy.as_validator().unwrap().is_valid());
        assert_eq!(inner.calls().count("is_valid"), 0);

        proxy
            .as_session_resetter()
            .unwrap()
            .reset_session(&Context::background())
            .unwrap();
        assert_eq!(inner.calls().count("reset_session"), 2);
    }

    #[test]
    fn test_hook_sees_arguments_verbatim() {
        let inner = fake(registry::CONN.full());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let hooks = ConnHooks::new().with_query_context(move |original| {
            let log = Arc::clone(&log);
            Box::new(move |ctx: &Context, query: &str, args: &[NamedValue]| {
                log.lock().push((query.to_owned(), args.len(), ctx.is_done()));
                original(ctx, query, args)
            })
        });
        let proxy = wrap_conn(inner, hooks);

        let ctx = Context::background();
        ctx.cancel();
        let args = [NamedValue::positional(1, 7_i64)];
        proxy
            .as_queryer_context()
            .unwrap()
            .query_context(&ctx, "SELECT $1", &args)
            .unwrap();

        assert_eq!(
            seen.lock().as_slice(),
            &[("SELECT $1".to_owned(), 1, true)]
        );
    }

    #[test]
    fn test_named_value_checker_mutation_reaches_caller() {
        let inner = fake(registry::CONN.full());
        let proxy = wrap_conn(inner, ConnHooks::new());
        let mut value = NamedValue::positional(1, "abc");

        proxy
            .as_named_value_checker()
            .unwrap()
            .check_named_value(&mut value)
            .unwrap();
        assert_eq!(value.value, Value::Text("ABC".to_owned()));
    }

    #[test]
    fn test_unwrap_identity() {
        let inner = fake(CapabilitySet::EMPTY.with(conn::VALIDATOR));
        let original: Arc<dyn Conn> = inner;
        let hooks = ConnHooks::new().with_close(|original| original);
        let proxy = wrap_conn(Arc::clone(&original), hooks);
        let twice = wrap_conn(Arc::clone(&proxy), ConnHooks::new());

        assert!(Arc::ptr_eq(&unwrap_conn(&proxy), &original));
        assert!(Arc::ptr_eq(&unwrap_conn(&twice), &proxy));
        assert!(Arc::ptr_eq(&unwrap_all(twice), &original));
        assert!(Arc::ptr_eq(&unwrap_conn(&original), &original));
    }

    #[test]
    fn test_nested_wrap_keeps_parity() {
        let caps = CapabilitySet::EMPTY
            .with(conn::EXECER_CONTEXT)
            .with(conn::SESSION_RESETTER);
        let proxy = wrap_conn(fake(caps), ConnHooks::new());
        let twice = wrap_conn(proxy, ConnHooks::new());
        assert_eq!(registry::detect(&*twice, &registry::CONN), caps);
    }

    #[test]
    #[should_panic(expected = "stopped exposing Pinger")]
    fn test_capability_lost_after_wrap_panics() {
        let inner = fake(CapabilitySet::EMPTY.with(conn::PINGER));
        let proxy = ConnProxy::new(inner.clone(), ConnHooks::new());
        inner.set_capabilities(CapabilitySet::EMPTY);
        let _ = proxy.ping(&Context::background());
    }

    #[test]
    fn test_debug_lists_capabilities_and_hooks() {
        let hooks = ConnHooks::new().with_ping(|original| original);
        let proxy = ConnProxy::new(fake(CapabilitySet::EMPTY.with(conn::PINGER)), hooks);
        let debug = format!("{proxy:?}");
        assert!(debug.contains("Pinger"));
        assert!(debug.contains("ping"));
        assert_eq!(proxy.capabilities(), CapabilitySet::EMPTY.with(conn::PINGER));
    }
}
