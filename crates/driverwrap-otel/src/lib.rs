//! OpenTelemetry database metrics for `driverwrap` proxies.
//!
//! [`Instrumentation`] builds hook tables that time every driver operation
//! and record the OpenTelemetry database client metrics through the
//! [`metrics`](::metrics) facade. Wrapping a driver once is enough: each hook
//! wraps what its original returns, so connections, statements, transactions
//! and rows produced by an instrumented driver are instrumented too.
//!
//! # Example
//!
//! ```rust,ignore
//! use driverwrap_otel::{Instrumentation, InstrumentationConfig};
//!
//! let config = InstrumentationConfig::from_env()?;
//! driverwrap_otel::observability::init_logging(&config)?;
//!
//! let instrumentation = Instrumentation::new(&config);
//! let connector = instrumentation.connector(postgres_driver, "postgres://localhost/app")?;
//! let conn = connector.connect(&driverwrap::Context::background())?;
//! ```
//!
//! # Features
//!
//! - `prometheus`: installs a Prometheus recorder with the semantic
//!   convention histogram boundaries and renders the exposition text
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod connector;
pub mod error;
pub mod instrumentation;
pub mod metrics;
pub mod observability;

pub use config::{DbSystem, InstrumentationConfig};
pub use connector::DsnConnector;
pub use error::{Error, Result};
pub use instrumentation::Instrumentation;
