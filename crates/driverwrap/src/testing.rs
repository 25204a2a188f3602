//! In-memory driver fakes for tests.
//!
//! Every fake exposes exactly the optional capabilities in the
//! [`CapabilitySet`] it was built with, counts each call by method name, and
//! can be scripted to fail a method with a given [`DriverError`].
//!
//! Enabled with the `test-utils` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::{
    ColumnConverter, ColumnTypeDatabaseTypeName, ColumnTypeLength, ColumnTypeNullable,
    ColumnTypePrecisionScale, ColumnTypeScanType, Conn, ConnBeginTx, ConnPrepareContext,
    Connector, ConnectorClose, Context, Driver, ExecResult, Execer, ExecerContext, NamedValue,
    NamedValueChecker, OpenConnector, Pinger, Queryer, QueryerContext, Rows, RowsAffected,
    RowsNextResultSet, ScanType, SessionResetter, Stmt, StmtExecContext, StmtQueryContext, Tx,
    TxOptions, Validator, Value, ValueConverter,
};
use crate::error::{DriverError, DriverResult};
use crate::registry::{self, CapabilitySet};

/// Per-method call counter.
#[derive(Debug, Default)]
pub struct Calls(Mutex<HashMap<&'static str, usize>>);

impl Calls {
    pub fn record(&self, method: &'static str) {
        *self.0.lock().entry(method).or_default() += 1;
    }

    pub fn count(&self, method: &str) -> usize {
        self.0.lock().get(method).copied().unwrap_or_default()
    }

    /// Calls across all methods, probes excluded.
    pub fn total(&self) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|(method, _)| **method != "probe")
            .map(|(_, count)| count)
            .sum()
    }
}

/// State shared by every fake: exposed capabilities, counters and scripted
/// failures.
#[derive(Debug, Default)]
struct Script {
    capabilities: Mutex<CapabilitySet>,
    calls: Calls,
    failures: HashMap<&'static str, DriverError>,
}

impl Script {
    fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities: Mutex::new(capabilities),
            ..Self::default()
        }
    }

    fn expose<'a, C: ?Sized>(&self, index: usize, view: &'a C) -> Option<&'a C> {
        self.calls.record("probe");
        self.capabilities.lock().contains(index).then_some(view)
    }

    /// Records `method` and returns its scripted failure, if any.
    fn call(&self, method: &'static str) -> DriverResult<()> {
        self.calls.record(method);
        self.failures.get(method).cloned().map_or(Ok(()), Err)
    }
}

macro_rules! scripted {
    ($name:ident) => {
        impl $name {
            /// Makes every call to `method` fail with `error`.
            #[must_use]
            pub fn fail(mut self, method: &'static str, error: DriverError) -> Self {
                self.script.failures.insert(method, error);
                self
            }

            pub fn calls(&self) -> &Calls {
                &self.script.calls
            }

            /// Changes the exposed capabilities after construction.
            pub fn set_capabilities(&self, capabilities: CapabilitySet) {
                *self.script.capabilities.lock() = capabilities;
            }
        }
    };
}

// ═══════════════════════════════════════════════════════════════════════════
// Driver and connector
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct FakeDriver {
    script: Script,
    conn_capabilities: CapabilitySet,
    opened: Mutex<Vec<String>>,
}

scripted!(FakeDriver);

impl FakeDriver {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            script: Script::new(capabilities),
            conn_capabilities: registry::CONN.full(),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Capabilities of the connections this driver opens.
    #[must_use]
    pub const fn with_conn_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.conn_capabilities = capabilities;
        self
    }

    /// Names passed to `open`, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl Driver for FakeDriver {
    fn open(&self, name: &str) -> DriverResult<Arc<dyn Conn>> {
        self.script.call("open")?;
        self.opened.lock().push(name.to_owned());
        Ok(Arc::new(FakeConn::new(self.conn_capabilities)))
    }

    fn as_open_connector(&self) -> Option<&dyn OpenConnector> {
        self.script
            .expose(registry::driver::OPEN_CONNECTOR, self as &dyn OpenConnector)
    }
}

impl OpenConnector for FakeDriver {
    fn open_connector(&self, name: &str) -> DriverResult<Arc<dyn Connector>> {
        self.script.call("open_connector")?;
        self.opened.lock().push(name.to_owned());
        Ok(Arc::new(
            FakeConnector::new(CapabilitySet::EMPTY)
                .with_conn_capabilities(self.conn_capabilities),
        ))
    }
}

#[derive(Debug)]
pub struct FakeConnector {
    script: Script,
    conn_capabilities: CapabilitySet,
}

scripted!(FakeConnector);

impl FakeConnector {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            script: Script::new(capabilities),
            conn_capabilities: registry::CONN.full(),
        }
    }

    #[must_use]
    pub const fn with_conn_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.conn_capabilities = capabilities;
        self
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _ctx: &Context) -> DriverResult<Arc<dyn Conn>> {
        self.script.call("connect")?;
        Ok(Arc::new(FakeConn::new(self.conn_capabilities)))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.script.calls.record("driver");
        Arc::new(FakeDriver::new(CapabilitySet::EMPTY).with_conn_capabilities(self.conn_capabilities))
    }

    fn as_closer(&self) -> Option<&dyn ConnectorClose> {
        self.script
            .expose(registry::connector::CLOSER, self as &dyn ConnectorClose)
    }
}

impl ConnectorClose for FakeConnector {
    fn close(&self) -> DriverResult<()> {
        self.script.call("close")
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Connection
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct FakeConn {
    script: Script,
}

scripted!(FakeConn);

impl FakeConn {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            script: Script::new(capabilities),
        }
    }
}

impl Conn for FakeConn {
    fn prepare(&self, _query: &str) -> DriverResult<Arc<dyn Stmt>> {
        self.script.call("prepare")?;
        Ok(Arc::new(FakeStmt::new(registry::STMT.full())))
    }

    fn close(&self) -> DriverResult<()> {
        self.script.call("close")
    }

    fn begin(&self) -> DriverResult<Arc<dyn Tx>> {
        self.script.call("begin")?;
        Ok(Arc::new(FakeTx::new()))
    }

    fn as_pinger(&self) -> Option<&dyn Pinger> {
        self.script.expose(registry::conn::PINGER, self as &dyn Pinger)
    }

    fn as_execer(&self) -> Option<&dyn Execer> {
        self.script.expose(registry::conn::EXECER, self as &dyn Execer)
    }

    fn as_execer_context(&self) -> Option<&dyn ExecerContext> {
        self.script
            .expose(registry::conn::EXECER_CONTEXT, self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn Queryer> {
        self.script.expose(registry::conn::QUERYER, self as &dyn Queryer)
    }

    fn as_queryer_context(&self) -> Option<&dyn QueryerContext> {
        self.script
            .expose(registry::conn::QUERYER_CONTEXT, self as &dyn QueryerContext)
    }

    fn as_prepare_context(&self) -> Option<&dyn ConnPrepareContext> {
        self.script
            .expose(registry::conn::PREPARE_CONTEXT, self as &dyn ConnPrepareContext)
    }

    fn as_begin_tx(&self) -> Option<&dyn ConnBeginTx> {
        self.script
            .expose(registry::conn::BEGIN_TX, self as &dyn ConnBeginTx)
    }

    fn as_session_resetter(&self) -> Option<&dyn SessionResetter> {
        self.script
            .expose(registry::conn::SESSION_RESETTER, self as &dyn SessionResetter)
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        self.script
            .expose(registry::conn::VALIDATOR, self as &dyn Validator)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.script.expose(
            registry::conn::NAMED_VALUE_CHECKER,
            self as &dyn NamedValueChecker,
        )
    }
}

impl Pinger for FakeConn {
    fn ping(&self, _ctx: &Context) -> DriverResult<()> {
        self.script.call("ping")
    }
}

impl Execer for FakeConn {
    fn exec(&self, _query: &str, _args: &[Value]) -> DriverResult<Arc<dyn ExecResult>> {
        self.script.call("exec")?;
        Ok(Arc::new(RowsAffected(1)))
    }
}

impl ExecerContext for FakeConn {
    fn exec_context(
        &self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> DriverResult<Arc<dyn ExecResult>> {
        self.script.call("exec_context")?;
        Ok(Arc::new(RowsAffected(1)))
    }
}

impl Queryer for FakeConn {
    fn query(&self, _query: &str, _args: &[Value]) -> DriverResult<Arc<dyn Rows>> {
        self.script.call("query")?;
        Ok(Arc::new(FakeRows::single_row()))
    }
}

impl QueryerContext for FakeConn {
    fn query_context(
        &self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> DriverResult<Arc<dyn Rows>> {
        self.script.call("query_context")?;
        Ok(Arc::new(FakeRows::single_row()))
    }
}

impl ConnPrepareContext for FakeConn {
    fn prepare_context(&self, _ctx: &Context, _query: &str) -> DriverResult<Arc<dyn Stmt>> {
        self.script.call("prepare_context")?;
        Ok(Arc::new(FakeStmt::new(registry::STMT.full())))
    }
}

impl ConnBeginTx for FakeConn {
    fn begin_tx(&self, _ctx: &Context, _opts: TxOptions) -> DriverResult<Arc<dyn Tx>> {
        self.script.call("begin_tx")?;
        Ok(Arc::new(FakeTx::new()))
    }
}

impl SessionResetter for FakeConn {
    fn reset_session(&self, _ctx: &Context) -> DriverResult<()> {
        self.script.call("reset_session")
    }
}

impl Validator for FakeConn {
    fn is_valid(&self) -> bool {
        self.script.call("is_valid").is_ok()
    }
}

/// Upper-cases text arguments.
impl NamedValueChecker for FakeConn {
    fn check_named_value(&self, value: &mut NamedValue) -> DriverResult<()> {
        self.script.call("check_named_value")?;
        if let Value::Text(text) = &mut value.value {
            *text = text.to_uppercase();
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Statement, rows, transaction
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct FakeStmt {
    script: Script,
    num_input: Option<usize>,
}

scripted!(FakeStmt);

impl FakeStmt {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            script: Script::new(capabilities),
            num_input: Some(1),
        }
    }

    #[must_use]
    pub const fn with_num_input(mut self, num_input: Option<usize>) -> Self {
        self.num_input = num_input;
        self
    }
}

#[derive(Debug)]
struct Identity;

impl ValueConverter for Identity {
    fn convert_value(&self, value: Value) -> DriverResult<Value> {
        Ok(value)
    }
}

impl Stmt for FakeStmt {
    fn close(&self) -> DriverResult<()> {
        self.script.call("close")
    }

    fn num_input(&self) -> Option<usize> {
        self.script.calls.record("num_input");
        self.num_input
    }

    fn exec(&self, _args: &[Value]) -> DriverResult<Arc<dyn ExecResult>> {
        self.script.call("exec")?;
        Ok(Arc::new(RowsAffected(1)))
    }

    fn query(&self, _args: &[Value]) -> DriverResult<Arc<dyn Rows>> {
        self.script.call("query")?;
        Ok(Arc::new(FakeRows::single_row()))
    }

    fn as_column_converter(&self) -> Option<&dyn ColumnConverter> {
        self.script
            .expose(registry::stmt::COLUMN_CONVERTER, self as &dyn ColumnConverter)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.script.expose(
            registry::stmt::NAMED_VALUE_CHECKER,
            self as &dyn NamedValueChecker,
        )
    }

    fn as_exec_context(&self) -> Option<&dyn StmtExecContext> {
        self.script
            .expose(registry::stmt::EXEC_CONTEXT, self as &dyn StmtExecContext)
    }

    fn as_query_context(&self) -> Option<&dyn StmtQueryContext> {
        self.script
            .expose(registry::stmt::QUERY_CONTEXT, self as &dyn StmtQueryContext)
    }
}

impl ColumnConverter for FakeStmt {
    fn column_converter(&self, _index: usize) -> Arc<dyn ValueConverter> {
        self.script.calls.record("column_converter");
        Arc::new(Identity)
    }
}

impl NamedValueChecker for FakeStmt {
    fn check_named_value(&self, _value: &mut NamedValue) -> DriverResult<()> {
        self.script.call("check_named_value")
    }
}

impl StmtExecContext for FakeStmt {
    fn exec_context(
        &self,
        _ctx: &Context,
        _args: &[NamedValue],
    ) -> DriverResult<Arc<dyn ExecResult>> {
        self.script.call("exec_context")?;
        Ok(Arc::new(RowsAffected(1)))
    }
}

impl StmtQueryContext for FakeStmt {
    fn query_context(&self, _ctx: &Context, _args: &[NamedValue]) -> DriverResult<Arc<dyn Rows>> {
        self.script.call("query_context")?;
        Ok(Arc::new(FakeRows::single_row()))
    }
}

#[derive(Debug)]
pub struct FakeRows {
    script: Script,
    columns: Vec<String>,
    remaining: Mutex<VecDeque<Vec<Value>>>,
}

scripted!(FakeRows);

impl FakeRows {
    /// Empty result set with one `id` column.
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self {
            script: Script::new(capabilities),
            columns: vec!["id".to_owned()],
            remaining: Mutex::new(VecDeque::new()),
        }
    }

    fn single_row() -> Self {
        Self::new(registry::ROWS.full()).with_data(vec!["id".to_owned()], vec![vec![Value::Int(1)]])
    }

    #[must_use]
    pub fn with_data(mut self, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        self.columns = columns;
        self.remaining = Mutex::new(rows.into());
        self
    }
}

impl Rows for FakeRows {
    fn columns(&self) -> Vec<String> {
        self.script.calls.record("columns");
        self.columns.clone()
    }

    fn close(&self) -> DriverResult<()> {
        self.script.call("close")
    }

    fn next(&self, dest: &mut [Value]) -> DriverResult<bool> {
        self.script.call("next")?;
        let Some(row) = self.remaining.lock().pop_front() else {
            return Ok(false);
        };
        for (slot, value) in dest.iter_mut().zip(row) {
            *slot = value;
        }
        Ok(true)
    }

    fn as_column_type_database_type_name(&self) -> Option<&dyn ColumnTypeDatabaseTypeName> {
        self.script.expose(
            registry::rows::DATABASE_TYPE_NAME,
            self as &dyn ColumnTypeDatabaseTypeName,
        )
    }

    fn as_column_type_length(&self) -> Option<&dyn ColumnTypeLength> {
        self.script
            .expose(registry::rows::LENGTH, self as &dyn ColumnTypeLength)
    }

    fn as_column_type_nullable(&self) -> Option<&dyn ColumnTypeNullable> {
        self.script
            .expose(registry::rows::NULLABLE, self as &dyn ColumnTypeNullable)
    }

    fn as_column_type_precision_scale(&self) -> Option<&dyn ColumnTypePrecisionScale> {
        self.script.expose(
            registry::rows::PRECISION_SCALE,
            self as &dyn ColumnTypePrecisionScale,
        )
    }

    fn as_column_type_scan_type(&self) -> Option<&dyn ColumnTypeScanType> {
        self.script
            .expose(registry::rows::SCAN_TYPE, self as &dyn ColumnTypeScanType)
    }

    fn as_next_result_set(&self) -> Option<&dyn RowsNextResultSet> {
        self.script
            .expose(registry::rows::NEXT_RESULT_SET, self as &dyn RowsNextResultSet)
    }
}

impl ColumnTypeDatabaseTypeName for FakeRows {
    fn column_type_database_type_name(&self, _index: usize) -> String {
        self.script.calls.record("column_type_database_type_name");
        "INT8".to_owned()
    }
}

impl ColumnTypeLength for FakeRows {
    fn column_type_length(&self, _index: usize) -> Option<i64> {
        self.script.calls.record("column_type_length");
        None
    }
}

impl ColumnTypeNullable for FakeRows {
    fn column_type_nullable(&self, _index: usize) -> Option<bool> {
        self.script.calls.record("column_type_nullable");
        Some(false)
    }
}

impl ColumnTypePrecisionScale for FakeRows {
    fn column_type_precision_scale(&self, _index: usize) -> Option<(i64, i64)> {
        self.script.calls.record("column_type_precision_scale");
        None
    }
}

impl ColumnTypeScanType for FakeRows {
    fn column_type_scan_type(&self, _index: usize) -> ScanType {
        self.script.calls.record("column_type_scan_type");
        ScanType::Int
    }
}

impl RowsNextResultSet for FakeRows {
    fn has_next_result_set(&self) -> bool {
        self.script.calls.record("has_next_result_set");
        false
    }

    fn next_result_set(&self) -> DriverResult<()> {
        self.script.call("next_result_set")
    }
}

#[derive(Debug, Default)]
pub struct FakeTx {
    script: Script,
}

scripted!(FakeTx);

impl FakeTx {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tx for FakeTx {
    fn commit(&self) -> DriverResult<()> {
        self.script.call("commit")
    }

    fn rollback(&self) -> DriverResult<()> {
        self.script.call("rollback")
    }
}
