//! Driver and connector contracts: the entry points that produce connections

use std::sync::Arc;

use super::conn::Conn;
use super::context::Context;
use crate::error::DriverResult;
use crate::unwrap::Unwrap;

/// Connection factory keyed by a data source name.
pub trait Driver: Send + Sync {
    fn open(&self, name: &str) -> DriverResult<Arc<dyn Conn>>;

    fn as_open_connector(&self) -> Option<&dyn OpenConnector> {
        None
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Driver>> {
        None
    }
}

/// Lets a driver parse the name once and hand out a reusable connector.
pub trait OpenConnector {
    fn open_connector(&self, name: &str) -> DriverResult<Arc<dyn Connector>>;
}

/// Connection factory with fixed configuration.
pub trait Connector: Send + Sync {
    fn connect(&self, ctx: &Context) -> DriverResult<Arc<dyn Conn>>;

    fn driver(&self) -> Arc<dyn Driver>;

    fn as_closer(&self) -> Option<&dyn ConnectorClose> {
        None
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Connector>> {
        None
    }
}

/// Releases resources held by a connector.
pub trait ConnectorClose {
    fn close(&self) -> DriverResult<()>;
}
