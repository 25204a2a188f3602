//! OpenTelemetry database client metrics recorded through the `metrics` facade
//!
//! Names and attribute keys follow the OpenTelemetry database semantic
//! conventions. Exporters that do not allow dots (Prometheus) rewrite them
//! to underscores.

use std::time::Duration;

use metrics::{Label, Unit, describe_gauge, describe_histogram, gauge, histogram};

use crate::config::{DbSystem, InstrumentationConfig};

// Operation metrics
pub const DB_CLIENT_OPERATION_DURATION: &str = "db.client.operation.duration";

// Connection metrics
pub const DB_CLIENT_CONNECTION_CREATE_TIME: &str = "db.client.connection.create_time";
pub const DB_CLIENT_CONNECTION_USE_TIME: &str = "db.client.connection.use_time";
pub const DB_CLIENT_CONNECTION_WAIT_TIME: &str = "db.client.connection.wait_time";
pub const DB_CLIENT_CONNECTION_COUNT: &str = "db.client.connection.count";
pub const DB_CLIENT_CONNECTION_IDLE_MAX: &str = "db.client.connection.idle.max";
pub const DB_CLIENT_CONNECTION_MAX: &str = "db.client.connection.max";

// Attribute keys
pub const ATTR_DB_SYSTEM_NAME: &str = "db.system.name";
pub const ATTR_POOL_NAME: &str = "db.client.connection.pool.name";
pub const ATTR_OPERATION_NAME: &str = "db.operation.name";
pub const ATTR_QUERY_TEXT: &str = "db.query.text";
pub const ATTR_CONNECTION_STATE: &str = "db.client.connection.state";

/// Histogram boundaries for `db.client.operation.duration`, in seconds.
pub const OPERATION_DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// Histogram boundaries for connection create, use and wait times, in seconds.
pub const CONNECTION_TIME_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Operation names reported as `db.operation.name`.
pub mod operation {
    pub const BEGIN: &str = "BEGIN";
    pub const PREPARE: &str = "PREPARE";
    pub const EXEC: &str = "Exec";
    pub const QUERY: &str = "Query";
    pub const COMMIT: &str = "COMMIT";
    pub const ROLLBACK: &str = "ROLLBACK";
}

/// Register descriptions and units for every metric.
pub fn describe_metrics() {
    describe_histogram!(
        DB_CLIENT_OPERATION_DURATION,
        Unit::Seconds,
        "Duration of database client operations."
    );
    describe_histogram!(
        DB_CLIENT_CONNECTION_CREATE_TIME,
        Unit::Seconds,
        "The time it took to create a new connection."
    );
    describe_histogram!(
        DB_CLIENT_CONNECTION_USE_TIME,
        Unit::Seconds,
        "The time between borrowing a connection and returning it to the pool."
    );
    describe_histogram!(
        DB_CLIENT_CONNECTION_WAIT_TIME,
        Unit::Seconds,
        "The time it took to obtain an open connection from the pool."
    );
    describe_gauge!(
        DB_CLIENT_CONNECTION_COUNT,
        Unit::Count,
        "The number of connections that are currently in state described by the state attribute."
    );
    describe_gauge!(
        DB_CLIENT_CONNECTION_IDLE_MAX,
        Unit::Count,
        "The maximum number of idle open connections allowed."
    );
    describe_gauge!(
        DB_CLIENT_CONNECTION_MAX,
        Unit::Count,
        "The maximum number of open connections allowed."
    );
}

/// Attribute values shared by every data point of one instrumented pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    system: DbSystem,
    pool_name: String,
    record_query_text: bool,
}

impl Labels {
    pub fn new(system: DbSystem, pool_name: impl Into<String>) -> Self {
        Self {
            system,
            pool_name: pool_name.into(),
            record_query_text: true,
        }
    }

    pub fn from_config(config: &InstrumentationConfig) -> Self {
        Self {
            system: config.system,
            pool_name: config.pool_name.clone(),
            record_query_text: config.record_query_text,
        }
    }

    #[must_use]
    pub const fn system(&self) -> DbSystem {
        self.system
    }

    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    #[must_use]
    pub const fn records_query_text(&self) -> bool {
        self.record_query_text
    }

    fn common(&self) -> Vec<Label> {
        vec![Label::new(ATTR_DB_SYSTEM_NAME, self.system.as_str())]
    }

    fn pooled(&self) -> Vec<Label> {
        let mut labels = self.common();
        labels.push(Label::new(ATTR_POOL_NAME, self.pool_name.clone()));
        labels
    }
}

/// Record one `db.client.operation.duration` data point.
///
/// `query_text` is dropped when the labels were built with query text
/// recording disabled.
pub fn record_operation_duration(
    labels: &Labels,
    operation: &'static str,
    query_text: &str,
    elapsed: Duration,
) {
    let mut point = labels.common();
    point.push(Label::new(ATTR_OPERATION_NAME, operation));
    if labels.record_query_text {
        point.push(Label::new(ATTR_QUERY_TEXT, query_text.to_owned()));
    }
    histogram!(DB_CLIENT_OPERATION_DURATION, point).record(elapsed.as_secs_f64());
}

pub fn record_connection_create_time(labels: &Labels, elapsed: Duration) {
    histogram!(DB_CLIENT_CONNECTION_CREATE_TIME, labels.pooled()).record(elapsed.as_secs_f64());
}

pub fn record_connection_use_time(labels: &Labels, elapsed: Duration) {
    histogram!(DB_CLIENT_CONNECTION_USE_TIME, labels.pooled()).record(elapsed.as_secs_f64());
}

/// For pools built on top of instrumented connectors.
pub fn record_connection_wait_time(labels: &Labels, elapsed: Duration) {
    histogram!(DB_CLIENT_CONNECTION_WAIT_TIME, labels.pooled()).record(elapsed.as_secs_f64());
}

/// Set `db.client.connection.count` for the `idle` and `used` states.
pub fn record_connection_count(labels: &Labels, idle: u64, used: u64) {
    for (state, count) in [("idle", idle), ("used", used)] {
        let mut point = labels.pooled();
        point.push(Label::new(ATTR_CONNECTION_STATE, state));
        gauge!(DB_CLIENT_CONNECTION_COUNT, point).set(count as f64);
    }
}

/// Set the `db.client.connection.idle.max` and `db.client.connection.max` gauges.
pub fn record_pool_limits(labels: &Labels, idle_max: u32, max_open: u32) {
    gauge!(DB_CLIENT_CONNECTION_IDLE_MAX, labels.pooled()).set(f64::from(idle_max));
    gauge!(DB_CLIENT_CONNECTION_MAX, labels.pooled()).set(f64::from(max_open));
}
