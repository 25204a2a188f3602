//! Capability-preserving interception proxies for SQL driver contracts.
//!
//! A SQL driver is a set of objects (driver, connector, connection,
//! statement, rows, transaction) that each implement a base trait plus any
//! subset of optional capability traits. Callers feature-detect those
//! capabilities and take different paths depending on what is present, so a
//! wrapper that hides or invents a capability silently changes behavior.
//!
//! This crate wraps driver objects in proxies that:
//!
//! - expose **exactly** the optional capabilities of the wrapped object,
//!   detected once at wrap time against a static registry
//! - route every method through an optional per-method hook that receives the
//!   bound original and returns its replacement
//! - can always be peeled back to the wrapped object with [`unwrap`] and
//!   [`unwrap_all`]
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use driverwrap::driver::{Conn, Pinger, Stmt, Tx};
//! use driverwrap::proxy::{ConnHooks, wrap_conn};
//! use driverwrap::registry::{self, conn};
//! use driverwrap::{CapabilitySet, Context, DriverError, DriverResult};
//!
//! struct PingOnly;
//!
//! impl Conn for PingOnly {
//!     fn prepare(&self, _query: &str) -> DriverResult<Arc<dyn Stmt>> {
//!         Err(DriverError::message("not supported"))
//!     }
//!
//!     fn close(&self) -> DriverResult<()> {
//!         Ok(())
//!     }
//!
//!     fn begin(&self) -> DriverResult<Arc<dyn Tx>> {
//!         Err(DriverError::message("not supported"))
//!     }
//!
//!     fn as_pinger(&self) -> Option<&dyn Pinger> {
//!         Some(self)
//!     }
//! }
//!
//! impl Pinger for PingOnly {
//!     fn ping(&self, _ctx: &Context) -> DriverResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let proxy = wrap_conn(Arc::new(PingOnly), ConnHooks::new());
//!
//! assert!(proxy.as_pinger().is_some());
//! assert!(proxy.as_begin_tx().is_none());
//! assert_eq!(
//!     registry::detect(&*proxy, &registry::CONN),
//!     CapabilitySet::EMPTY.with(conn::PINGER)
//! );
//! # proxy.as_pinger().unwrap().ping(&Context::background()).unwrap();
//! ```
//!
//! In-memory fakes for every contract live in `testing`, behind the
//! `test-utils` feature.
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod driver;
pub mod error;
pub mod proxy;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod unwrap;

// Re-export main types for convenience
pub use driver::Context;
pub use error::{DriverError, DriverResult};
pub use proxy::{
    ConnHooks, ConnectorHooks, DriverHooks, RowsHooks, StmtHooks, TxHooks, wrap_conn,
    wrap_connector, wrap_driver, wrap_rows, wrap_stmt, wrap_tx,
};
pub use registry::{CapabilitySet, Variant, detect};
pub use unwrap::{MAX_UNWRAP_DEPTH, Unwrap, unwrap, unwrap_all};
