//! Hook tables that time driver calls and keep wrapping what they return.
//!
//! Wrapping a driver with [`Instrumentation::wrap_driver`] is enough to
//! instrument everything it produces: connections opened through it are
//! wrapped, statements and transactions begun on those connections are
//! wrapped, and so on down to rows. Every proxy keeps the exact capability
//! set of the object it wraps.

use std::sync::Arc;
use std::time::Instant;

use driverwrap::driver::{
    Conn, Connector, Context, Driver, NamedValue, Rows, Stmt, Tx, TxOptions, Value,
};
use driverwrap::proxy::{
    ConnHooks, ConnectorHooks, DriverHooks, RowsHooks, StmtHooks, TxHooks, wrap_conn,
    wrap_connector, wrap_driver, wrap_rows, wrap_stmt, wrap_tx,
};
use driverwrap::{DriverError, DriverResult};
use tracing::field;

use crate::config::InstrumentationConfig;
use crate::connector::DsnConnector;
use crate::metrics::{self, Labels, operation};

/// Builds instrumented proxies for one database pool.
///
/// Cheap to clone; hooks hold a clone so they can wrap the objects their
/// originals return.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    labels: Labels,
    idle_max: u32,
}

impl Instrumentation {
    pub fn new(config: &InstrumentationConfig) -> Self {
        metrics::describe_metrics();
        tracing::debug!(
            db.system.name = config.system.as_str(),
            db.client.connection.pool.name = %config.pool_name,
            record_query_text = config.record_query_text,
            "database instrumentation created"
        );
        Self {
            shared: Arc::new(Shared {
                labels: Labels::from_config(config),
                idle_max: config.idle_max,
            }),
        }
    }

    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.shared.labels
    }

    /// Publish the pool limit gauges; `max_open` comes from the pool.
    pub fn record_pool_limits(&self, max_open: u32) {
        metrics::record_pool_limits(self.labels(), self.shared.idle_max, max_open);
    }

    /// A connector for `dsn` whose connections are instrumented.
    ///
    /// Uses the driver's own connector when it has one, otherwise opens
    /// connections through [`Driver::open`] on every connect.
    pub fn connector(
        &self,
        driver: Arc<dyn Driver>,
        dsn: &str,
    ) -> DriverResult<Arc<dyn Connector>> {
        let driver = self.wrap_driver(driver);
        if let Some(opener) = driver.as_open_connector() {
            return opener.open_connector(dsn);
        }
        Ok(Arc::new(DsnConnector::new(driver, dsn)))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Wrapping
    // ═══════════════════════════════════════════════════════════════════════

    pub fn wrap_driver(&self, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        wrap_driver(driver, self.driver_hooks())
    }

    pub fn wrap_connector(&self, connector: Arc<dyn Connector>) -> Arc<dyn Connector> {
        wrap_connector(connector, self.connector_hooks())
    }

    /// Starts the connection's use-time clock.
    pub fn wrap_conn(&self, conn: Arc<dyn Conn>) -> Arc<dyn Conn> {
        wrap_conn(conn, self.conn_hooks())
    }

    /// `query` is the text the statement was prepared from.
    pub fn wrap_stmt(&self, stmt: Arc<dyn Stmt>, query: &str) -> Arc<dyn Stmt> {
        wrap_stmt(stmt, self.stmt_hooks(query))
    }

    pub fn wrap_tx(&self, tx: Arc<dyn Tx>) -> Arc<dyn Tx> {
        wrap_tx(tx, self.tx_hooks())
    }

    pub fn wrap_rows(&self, rows: Arc<dyn Rows>) -> Arc<dyn Rows> {
        wrap_rows(rows, RowsHooks::new())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Hook tables
    // ═══════════════════════════════════════════════════════════════════════

    pub fn driver_hooks(&self) -> DriverHooks {
        let open = self.clone();
        let open_connector = self.clone();

        DriverHooks::new()
            .with_open(move |original| {
                let this = open.clone();
                Box::new(move |name: &str| this.create_conn(|| original(name)))
            })
            .with_open_connector(move |original| {
                let this = open_connector.clone();
                Box::new(move |name: &str| -> DriverResult<Arc<dyn Connector>> {
                    Ok(this.wrap_connector(original(name)?))
                })
            })
    }

    pub fn connector_hooks(&self) -> ConnectorHooks {
        let connect = self.clone();
        let driver = self.clone();

        ConnectorHooks::new()
            .with_connect(move |original| {
                let this = connect.clone();
                Box::new(move |ctx: &Context| this.create_conn(|| original(ctx)))
            })
            .with_driver(move |original| {
                let this = driver.clone();
                Box::new(move || this.wrap_driver(original()))
            })
    }

    pub fn conn_hooks(&self) -> ConnHooks {
        let opened = Instant::now();
        let close = self.clone();
        let begin = self.clone();
        let begin_tx = self.clone();
        let prepare = self.clone();
        let prepare_context = self.clone();
        let exec = self.clone();
        let exec_context = self.clone();
        let queryer = self.clone();
        let queryer_context = self.clone();

        ConnHooks::new()
            .with_close(move |original| {
                let this = close.clone();
                Box::new(move || {
                    let result = original();
                    metrics::record_connection_use_time(this.labels(), opened.elapsed());
                    result
                })
            })
            .with_begin(move |original| {
                let this = begin.clone();
                Box::new(move || -> DriverResult<Arc<dyn Tx>> {
                    let tx = this.observe(operation::BEGIN, operation::BEGIN, || original())?;
                    Ok(this.wrap_tx(tx))
                })
            })
            .with_begin_tx(move |original| {
                let this = begin_tx.clone();
                Box::new(move |ctx: &Context, opts: TxOptions| -> DriverResult<Arc<dyn Tx>> {
                    let tx =
                        this.observe(operation::BEGIN, operation::BEGIN, || original(ctx, opts))?;
                    Ok(this.wrap_tx(tx))
                })
            })
            .with_prepare(move |original| {
                let this = prepare.clone();
                Box::new(move |query: &str| -> DriverResult<Arc<dyn Stmt>> {
                    let stmt = this.observe(operation::PREPARE, query, || original(query))?;
                    Ok(this.wrap_stmt(stmt, query))
                })
            })
            .with_prepare_context(move |original| {
                let this = prepare_context.clone();
                Box::new(move |ctx: &Context, query: &str| -> DriverResult<Arc<dyn Stmt>> {
                    let stmt =
                        this.observe(operation::PREPARE, query, || original(ctx, query))?;
                    Ok(this.wrap_stmt(stmt, query))
                })
            })
            .with_exec(move |original| {
                let this = exec.clone();
                Box::new(move |query: &str, args: &[Value]| {
                    this.observe(operation::EXEC, query, || original(query, args))
                })
            })
            .with_exec_context(move |original| {
                let this = exec_context.clone();
                Box::new(move |ctx: &Context, query: &str, args: &[NamedValue]| {
                    this.observe(operation::EXEC, query, || original(ctx, query, args))
                })
            })
            .with_query(move |original| {
                let this = queryer.clone();
                Box::new(move |query: &str, args: &[Value]| -> DriverResult<Arc<dyn Rows>> {
                    let rows = this.observe(operation::QUERY, query, || original(query, args))?;
                    Ok(this.wrap_rows(rows))
                })
            })
            .with_query_context(move |original| {
                let this = queryer_context.clone();
                Box::new(
                    move |ctx: &Context, query: &str, args: &[NamedValue]| -> DriverResult<Arc<dyn Rows>> {
                        let rows = this
                            .observe(operation::QUERY, query, || original(ctx, query, args))?;
                        Ok(this.wrap_rows(rows))
                    },
                )
            })
    }

    pub fn stmt_hooks(&self, query: &str) -> StmtHooks {
        let text: Arc<str> = Arc::from(query);
        let exec = (self.clone(), Arc::clone(&text));
        let exec_context = (self.clone(), Arc::clone(&text));
        let queryer = (self.clone(), Arc::clone(&text));
        let queryer_context = (self.clone(), text);

        StmtHooks::new()
            .with_exec(move |original| {
                let (this, text) = exec.clone();
                Box::new(move |args: &[Value]| {
                    this.observe(operation::EXEC, &text, || original(args))
                })
            })
            .with_exec_context(move |original| {
                let (this, text) = exec_context.clone();
                Box::new(move |ctx: &Context, args: &[NamedValue]| {
                    this.observe(operation::EXEC, &text, || original(ctx, args))
                })
            })
            .with_query(move |original| {
                let (this, text) = queryer.clone();
                Box::new(move |args: &[Value]| -> DriverResult<Arc<dyn Rows>> {
                    let rows = this.observe(operation::QUERY, &text, || original(args))?;
                    Ok(this.wrap_rows(rows))
                })
            })
            .with_query_context(move |original| {
                let (this, text) = queryer_context.clone();
                Box::new(move |ctx: &Context, args: &[NamedValue]| -> DriverResult<Arc<dyn Rows>> {
                    let rows = this.observe(operation::QUERY, &text, || original(ctx, args))?;
                    Ok(this.wrap_rows(rows))
                })
            })
    }

    pub fn tx_hooks(&self) -> TxHooks {
        let commit = self.clone();
        let rollback = self.clone();

        TxHooks::new()
            .with_commit(move |original| {
                let this = commit.clone();
                Box::new(move || this.observe(operation::COMMIT, operation::COMMIT, || original()))
            })
            .with_rollback(move |original| {
                let this = rollback.clone();
                Box::new(move || {
                    this.observe(operation::ROLLBACK, operation::ROLLBACK, || original())
                })
            })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Recording
    // ═══════════════════════════════════════════════════════════════════════

    /// Runs `call` inside a span and records its duration, success or not.
    fn observe<T>(
        &self,
        operation: &'static str,
        query: &str,
        call: impl FnOnce() -> DriverResult<T>,
    ) -> DriverResult<T> {
        let labels = self.labels();
        let span = tracing::debug_span!(
            "db.operation",
            db.system.name = labels.system().as_str(),
            db.operation.name = operation,
            db.query.text = field::Empty,
            otel.name = operation,
        );
        if labels.records_query_text() {
            span.record("db.query.text", query);
        }
        let _entered = span.enter();

        let start = Instant::now();
        let result = call();
        metrics::record_operation_duration(labels, operation, query, start.elapsed());

        if let Err(ref e) = result {
            log_failure(operation, e);
        }
        result
    }

    /// Times connection creation and wraps the new connection.
    fn create_conn(
        &self,
        open: impl FnOnce() -> DriverResult<Arc<dyn Conn>>,
    ) -> DriverResult<Arc<dyn Conn>> {
        let span = tracing::debug_span!(
            "db.connection.create",
            db.system.name = self.labels().system().as_str(),
            db.client.connection.pool.name = self.labels().pool_name(),
            otel.name = "db.connection.create",
        );
        let _entered = span.enter();

        let start = Instant::now();
        let result = open();
        metrics::record_connection_create_time(self.labels(), start.elapsed());

        match result {
            Ok(conn) => Ok(self.wrap_conn(conn)),
            Err(e) => {
                log_failure("connect", &e);
                Err(e)
            }
        }
    }
}

fn log_failure(operation: &str, error: &DriverError) {
    tracing::warn!(
        db.operation.name = operation,
        bad_conn = error.is_bad_conn(),
        error = %error,
        "database operation failed"
    );
}

#[cfg(test)]
mod tests {
    use driverwrap::registry::{self, conn, driver};
    use driverwrap::testing::{FakeConn, FakeConnector, FakeDriver};
    use driverwrap::{CapabilitySet, unwrap_all};

    use super::*;
    use crate::config::DbSystem;
    use crate::metrics::tests::{capture, sample};

    fn instrumentation() -> Instrumentation {
        Instrumentation::new(&InstrumentationConfig::new(DbSystem::Postgresql, "main"))
    }

    fn operation_count(rendered: &str, operation: &str, query: &str) -> Option<f64> {
        let op = format!(r#"db_operation_name="{operation}""#);
        let text = format!(r#"db_query_text="{query}""#);
        sample(
            rendered,
            "db_client_operation_duration_count",
            &[r#"db_system_name="postgresql""#, &op, &text],
        )
    }

    #[test]
    fn test_instrumented_conn_keeps_capabilities() {
        let caps = CapabilitySet::EMPTY.with(conn::PINGER).with(conn::QUERYER);
        let conn = instrumentation().wrap_conn(Arc::new(FakeConn::new(caps)));

        assert_eq!(registry::detect(&*conn, &registry::CONN), caps);
        assert!(conn.as_begin_tx().is_none());
        assert!(conn.as_queryer_context().is_none());
    }

    #[test]
    fn test_query_records_duration_and_wraps_rows() {
        let inner = Arc::new(FakeConn::new(registry::CONN.full()));
        let mut rows = None;
        let rendered = capture(|| {
            let conn = instrumentation().wrap_conn(inner.clone());
            rows = Some(conn.as_queryer().unwrap().query("SELECT 1", &[]).unwrap());
        });

        assert_eq!(operation_count(&rendered, "Query", "SELECT 1"), Some(1.0));
        assert_eq!(inner.calls().count("query"), 1);
        assert!(rows.unwrap().as_unwrap().is_some());
    }

    #[test]
    fn test_failed_exec_is_recorded_and_returned() {
        let inner = Arc::new(
            FakeConn::new(registry::CONN.full()).fail("exec_context", DriverError::bad_conn()),
        );
        let mut outcome = None;
        let rendered = capture(|| {
            let conn = instrumentation().wrap_conn(inner);
            outcome = Some(
                conn.as_execer_context()
                    .unwrap()
                    .exec_context(&Context::background(), "DELETE FROM t", &[])
                    .err(),
            );
        });

        assert!(outcome.flatten().unwrap().is_bad_conn());
        assert_eq!(operation_count(&rendered, "Exec", "DELETE FROM t"), Some(1.0));
    }

    #[test]
    fn test_prepared_statement_reports_prepare_text() {
        let rendered = capture(|| {
            let conn = instrumentation().wrap_conn(Arc::new(FakeConn::new(registry::CONN.full())));
            let stmt = conn
                .as_prepare_context()
                .unwrap()
                .prepare_context(&Context::background(), "UPDATE t SET a = $1")
                .unwrap();
            stmt.exec(&[Value::Int(1)]).unwrap();
            stmt.as_query_context()
                .unwrap()
                .query_context(&Context::background(), &[])
                .unwrap();
        });

        assert_eq!(
            operation_count(&rendered, "PREPARE", "UPDATE t SET a = $1"),
            Some(1.0)
        );
        assert_eq!(
            operation_count(&rendered, "Exec", "UPDATE t SET a = $1"),
            Some(1.0)
        );
        assert_eq!(
            operation_count(&rendered, "Query", "UPDATE t SET a = $1"),
            Some(1.0)
        );
    }

    #[test]
    fn test_transaction_operations() {
        let rendered = capture(|| {
            let conn = instrumentation().wrap_conn(Arc::new(FakeConn::new(registry::CONN.full())));
            let tx = conn.begin().unwrap();
            tx.commit().unwrap();
            let tx = conn
                .as_begin_tx()
                .unwrap()
                .begin_tx(&Context::background(), TxOptions::default())
                .unwrap();
            tx.rollback().unwrap();
        });

        assert_eq!(operation_count(&rendered, "BEGIN", "BEGIN"), Some(2.0));
        assert_eq!(operation_count(&rendered, "COMMIT", "COMMIT"), Some(1.0));
        assert_eq!(operation_count(&rendered, "ROLLBACK", "ROLLBACK"), Some(1.0));
    }

    #[test]
    fn test_open_records_create_and_use_time() {
        let inner = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let rendered = capture(|| {
            let driver = instrumentation().wrap_driver(inner.clone());
            let conn = driver.open("postgres://localhost/app").unwrap();
            assert!(conn.as_unwrap().is_some());
            conn.close().unwrap();
        });

        let pooled = [
            r#"db_system_name="postgresql""#,
            r#"db_client_connection_pool_name="main""#,
        ];
        assert_eq!(
            sample(&rendered, "db_client_connection_create_time_count", &pooled),
            Some(1.0)
        );
        assert_eq!(
            sample(&rendered, "db_client_connection_use_time_count", &pooled),
            Some(1.0)
        );
        assert_eq!(inner.calls().count("open"), 1);
    }

    #[test]
    fn test_failed_open_still_records_create_time() {
        let inner = Arc::new(
            FakeDriver::new(CapabilitySet::EMPTY)
                .fail("open", DriverError::message("connection refused")),
        );
        let mut err = None;
        let rendered = capture(|| {
            err = instrumentation().wrap_driver(inner).open("dsn").err();
        });

        assert_eq!(err.unwrap().to_string(), "connection refused");
        assert_eq!(
            sample(&rendered, "db_client_connection_create_time_count", &[]),
            Some(1.0)
        );
    }

    #[test]
    fn test_connector_uses_open_connector_when_present() {
        let inner = Arc::new(FakeDriver::new(
            CapabilitySet::EMPTY.with(driver::OPEN_CONNECTOR),
        ));
        let connector = instrumentation()
            .connector(inner.clone(), "postgres://db/app")
            .unwrap();

        assert!(connector.as_unwrap().is_some());
        assert_eq!(inner.calls().count("open_connector"), 1);

        let conn = connector.connect(&Context::background()).unwrap();
        assert!(conn.as_unwrap().is_some());
        assert_eq!(inner.calls().count("open"), 0);
    }

    #[test]
    fn test_connector_falls_back_to_dsn_connector() {
        let inner = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let connector = instrumentation()
            .connector(inner.clone(), "file:test.db")
            .unwrap();

        assert!(connector.as_unwrap().is_none());
        let conn = connector.connect(&Context::background()).unwrap();
        assert!(conn.as_unwrap().is_some());
        assert_eq!(inner.opened(), vec!["file:test.db".to_owned()]);

        let original: Arc<dyn Driver> = inner;
        assert!(!Arc::ptr_eq(&connector.driver(), &original));
        assert!(Arc::ptr_eq(&unwrap_all(connector.driver()), &original));
    }

    #[test]
    fn test_connector_hooks_wrap_driver() {
        let inner = Arc::new(FakeConnector::new(CapabilitySet::EMPTY));
        let connector = instrumentation().wrap_connector(inner.clone());

        assert!(connector.driver().as_unwrap().is_some());
        assert!(connector.as_closer().is_none());
        assert_eq!(inner.calls().count("driver"), 1);
    }

    #[test]
    fn test_pool_limits_use_configured_idle_max() {
        let config = InstrumentationConfig::new(DbSystem::Sqlite, "cache").with_idle_max(5);
        let rendered = capture(|| Instrumentation::new(&config).record_pool_limits(20));

        assert_eq!(
            sample(&rendered, "db_client_connection_idle_max", &[r#"db_system_name="sqlite""#]),
            Some(5.0)
        );
        assert_eq!(sample(&rendered, "db_client_connection_max", &[]), Some(20.0));
    }
}
