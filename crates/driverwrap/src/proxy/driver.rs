//! Driver and connector proxies

use std::fmt;
use std::sync::Arc;

use super::{exposed, required};
use crate::driver::{Conn, Connector, ConnectorClose, Context, Driver, OpenConnector};
use crate::error::DriverResult;
use crate::registry::{self, CapabilitySet, connector, driver};
use crate::unwrap::Unwrap;

hooks! {
    /// Interceptors for [`Driver`].
    pub struct DriverHooks {
        open: DriverOpenFn, DriverOpenHook = Fn(&str) -> DriverResult<Arc<dyn Conn>>;
        open_connector: DriverOpenConnectorFn, DriverOpenConnectorHook =
            Fn(&str) -> DriverResult<Arc<dyn Connector>>;
    }
}

hooks! {
    /// Interceptors for [`Connector`].
    pub struct ConnectorHooks {
        connect: ConnectorConnectFn, ConnectorConnectHook = Fn(&Context) -> DriverResult<Arc<dyn Conn>>;
        driver: ConnectorDriverFn, ConnectorDriverHook = Fn() -> Arc<dyn Driver>;
        close: ConnectorCloseFn, ConnectorCloseHook = Fn() -> DriverResult<()>;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Driver
// ═══════════════════════════════════════════════════════════════════════════

/// Forwarding wrapper around a driver.
pub struct DriverProxy {
    wrapped: Arc<dyn Driver>,
    hooks: DriverHooks,
    capabilities: CapabilitySet,
}

impl DriverProxy {
    pub fn new(wrapped: Arc<dyn Driver>, hooks: DriverHooks) -> Self {
        let capabilities = registry::detect(&*wrapped, &registry::DRIVER);
        tracing::debug!(
            variant = registry::DRIVER.name,
            capabilities = ?registry::DRIVER.describe(capabilities),
            hooks = ?hooks.installed(),
            "wrapping driver"
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

impl fmt::Debug for DriverProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverProxy")
            .field("capabilities", &registry::DRIVER.describe(self.capabilities))
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

pub fn wrap_driver(wrapped: Arc<dyn Driver>, hooks: DriverHooks) -> Arc<dyn Driver> {
    Arc::new(DriverProxy::new(wrapped, hooks))
}

impl Unwrap<dyn Driver> for DriverProxy {
    fn unwrap_inner(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.wrapped)
    }
}

impl Driver for DriverProxy {
    fn open(&self, name: &str) -> DriverResult<Arc<dyn Conn>> {
        forward!(self.hooks.open, &*self.wrapped => open(name: &str))
    }

    fn as_open_connector(&self) -> Option<&dyn OpenConnector> {
        exposed(self.capabilities, driver::OPEN_CONNECTOR, self as &dyn OpenConnector)
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Driver>> {
        Some(self)
    }
}

impl OpenConnector for DriverProxy {
    fn open_connector(&self, name: &str) -> DriverResult<Arc<dyn Connector>> {
        let opener = required(self.wrapped.as_open_connector(), "driver", "OpenConnector");
        forward!(self.hooks.open_connector, opener => open_connector(name: &str))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Connector
// ═══════════════════════════════════════════════════════════════════════════

/// Forwarding wrapper around a connector.
pub struct ConnectorProxy {
    wrapped: Arc<dyn Connector>,
    hooks: ConnectorHooks,
    capabilities: CapabilitySet,
}

impl ConnectorProxy {
    pub fn new(wrapped: Arc<dyn Connector>, hooks: ConnectorHooks) -> Self {
        let capabilities = registry::detect(&*wrapped, &registry::CONNECTOR);
        tracing::debug!(
            variant = registry::CONNECTOR.name,
            capabilities = ?registry::CONNECTOR.describe(capabilities),
            hooks = ?hooks.installed(),
            "wrapping connector"
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

impl fmt::Debug for ConnectorProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorProxy")
            .field(
                "capabilities",
                &registry::CONNECTOR.describe(self.capabilities),
            )
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

pub fn wrap_connector(wrapped: Arc<dyn Connector>, hooks: ConnectorHooks) -> Arc<dyn Connector> {
    Arc::new(ConnectorProxy::new(wrapped, hooks))
}

impl Unwrap<dyn Connector> for ConnectorProxy {
    fn unwrap_inner(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.wrapped)
    }
}

impl Connector for ConnectorProxy {
    fn connect(&self, ctx: &Context) -> DriverResult<Arc<dyn Conn>> {
        forward!(self.hooks.connect, &*self.wrapped => connect(ctx: &Context))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        forward!(self.hooks.driver, &*self.wrapped => driver())
    }

    fn as_closer(&self) -> Option<&dyn ConnectorClose> {
        exposed(self.capabilities, connector::CLOSER, self as &dyn ConnectorClose)
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Connector>> {
        Some(self)
    }
}

impl ConnectorClose for ConnectorProxy {
    fn close(&self) -> DriverResult<()> {
        let closer = required(self.wrapped.as_closer(), "connector", "ConnectorClose");
        forward!(self.hooks.close, closer => close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DriverError;
    use crate::proxy::{ConnHooks, wrap_conn};
    use crate::testing::{FakeConnector, FakeDriver};
    use crate::unwrap::{unwrap_all, unwrap_connector, unwrap_driver};

    #[test]
    fn test_driver_capability_parity() {
        for bits in 0..=registry::DRIVER.full().bits() {
            let expected = CapabilitySet::from_bits(bits);
            let proxy = wrap_driver(Arc::new(FakeDriver::new(expected)), DriverHooks::new());
            assert_eq!(registry::detect(&*proxy, &registry::DRIVER), expected);
        }
    }

    #[test]
    fn test_connector_capability_parity() {
        for bits in 0..=registry::CONNECTOR.full().bits() {
            let expected = CapabilitySet::from_bits(bits);
            let proxy = wrap_connector(
                Arc::new(FakeConnector::new(expected)),
                ConnectorHooks::new(),
            );
            assert_eq!(registry::detect(&*proxy, &registry::CONNECTOR), expected);
        }
    }

    #[test]
    fn test_open_hook_wraps_returned_connection() {
        let inner = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let hooks = DriverHooks::new().with_open(|original| {
            Box::new(move |name: &str| -> DriverResult<Arc<dyn Conn>> {
                let conn = original(name)?;
                Ok(wrap_conn(conn, ConnHooks::new()))
            })
        });
        let proxy = wrap_driver(inner.clone(), hooks);

        let conn = proxy.open("postgres://localhost/app").unwrap();
        assert!(conn.as_unwrap().is_some());
        assert_eq!(inner.calls().count("open"), 1);
        assert_eq!(
            inner.opened().as_slice(),
            &["postgres://localhost/app".to_owned()]
        );
    }

    #[test]
    fn test_open_error_propagates() {
        let inner = Arc::new(
            FakeDriver::new(CapabilitySet::EMPTY).fail("open", DriverError::message("no such host")),
        );
        let proxy = wrap_driver(inner, DriverHooks::new());
        let err = proxy.open("bad").err().unwrap();
        assert_eq!(err.to_string(), "no such host");
    }

    #[test]
    fn test_open_connector_forwarded() {
        let inner = Arc::new(FakeDriver::new(
            CapabilitySet::EMPTY.with(driver::OPEN_CONNECTOR),
        ));
        let proxy = wrap_driver(inner.clone(), DriverHooks::new());

        let connector = proxy
            .as_open_connector()
            .unwrap()
            .open_connector("dsn")
            .unwrap();
        connector.connect(&Context::background()).unwrap();
        assert_eq!(inner.calls().count("open_connector"), 1);
    }

    #[test]
    fn test_connector_close_and_driver() {
        let inner = Arc::new(FakeConnector::new(
            CapabilitySet::EMPTY.with(connector::CLOSER),
        ));
        let proxy = wrap_connector(inner.clone(), ConnectorHooks::new());

        proxy.as_closer().unwrap().close().unwrap();
        let _ = proxy.driver();
        proxy.connect(&Context::background()).unwrap();

        assert_eq!(inner.calls().count("close"), 1);
        assert_eq!(inner.calls().count("driver"), 1);
        assert_eq!(inner.calls().count("connect"), 1);
    }

    #[test]
    fn test_connector_without_closer_hides_it() {
        let proxy = wrap_connector(
            Arc::new(FakeConnector::new(CapabilitySet::EMPTY)),
            ConnectorHooks::new().with_close(|original| original),
        );
        assert!(proxy.as_closer().is_none());
    }

    #[test]
    fn test_unwrap_identity() {
        let driver: Arc<dyn Driver> = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let proxy = wrap_driver(Arc::clone(&driver), DriverHooks::new());
        assert!(Arc::ptr_eq(&unwrap_driver(&proxy), &driver));

        let connector: Arc<dyn Connector> = Arc::new(FakeConnector::new(CapabilitySet::EMPTY));
        let once = wrap_connector(Arc::clone(&connector), ConnectorHooks::new());
        let twice = wrap_connector(Arc::clone(&once), ConnectorHooks::new());
        assert!(Arc::ptr_eq(&unwrap_connector(&twice), &once));
        assert!(Arc::ptr_eq(&unwrap_all(twice), &connector));
    }
}
