//! Logging and metrics exporter setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::InstrumentationConfig;
use crate::{Error, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr.
pub fn init_logging(config: &InstrumentationConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))?;

    tracing::debug!(json = config.json_logs, "logging initialized");
    Ok(())
}

#[cfg(feature = "prometheus")]
pub use prometheus::{init_metrics, render_metrics};

#[cfg(feature = "prometheus")]
mod prometheus {
    use std::sync::OnceLock;

    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

    use crate::metrics::{
        CONNECTION_TIME_BUCKETS, DB_CLIENT_OPERATION_DURATION, OPERATION_DURATION_BUCKETS,
        describe_metrics,
    };
    use crate::{Error, Result};

    static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    /// Builder with the database histogram boundaries configured.
    ///
    /// Matches on suffixes, which read the same before and after the
    /// exporter rewrites dots to underscores.
    pub(super) fn builder() -> Result<PrometheusBuilder> {
        let mut builder = PrometheusBuilder::new()
            .set_buckets_for_metric(operation_suffix(), OPERATION_DURATION_BUCKETS);
        for suffix in ["create_time", "use_time", "wait_time"] {
            builder = builder.and_then(|b| {
                b.set_buckets_for_metric(Matcher::Suffix(suffix.to_string()), CONNECTION_TIME_BUCKETS)
            });
        }
        builder.map_err(|e| Error::Config(format!("Invalid histogram buckets: {e}")))
    }

    fn operation_suffix() -> Matcher {
        let (_, suffix) = DB_CLIENT_OPERATION_DURATION
            .rsplit_once('.')
            .unwrap_or(("", DB_CLIENT_OPERATION_DURATION));
        Matcher::Suffix(suffix.to_string())
    }

    /// Install the global Prometheus recorder.
    pub fn init_metrics() -> Result<()> {
        let handle = builder()?
            .install_recorder()
            .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

        PROMETHEUS_HANDLE.set(handle).ok();
        describe_metrics();
        tracing::info!("Prometheus metrics initialized");
        Ok(())
    }

    /// Render metrics in Prometheus text format.
    #[must_use]
    pub fn render_metrics() -> String {
        PROMETHEUS_HANDLE
            .get()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }
}

#[cfg(all(test, feature = "prometheus"))]
mod tests {
    use std::time::Duration;

    use super::prometheus::builder;
    use crate::config::DbSystem;
    use crate::metrics::{Labels, operation, record_operation_duration};

    #[test]
    fn test_operation_duration_uses_configured_buckets() {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_operation_duration(
                &Labels::new(DbSystem::Postgresql, "main"),
                operation::QUERY,
                "SELECT 1",
                Duration::from_millis(2),
            );
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"le="0.001""#));
        assert!(rendered.contains(r#"le="0.005""#));
        assert!(rendered.contains("db_client_operation_duration_bucket"));
    }
}
