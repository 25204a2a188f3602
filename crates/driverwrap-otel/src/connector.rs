use std::fmt;
use std::sync::Arc;

use driverwrap::driver::{Conn, Connector, Context, Driver};
use driverwrap::DriverResult;

/// Connector for drivers without their own: every connect opens `dsn`
/// through [`Driver::open`]. The context is not consulted.
pub struct DsnConnector {
    driver: Arc<dyn Driver>,
    dsn: String,
}

impl DsnConnector {
    pub fn new(driver: Arc<dyn Driver>, dsn: impl Into<String>) -> Self {
        Self {
            driver,
            dsn: dsn.into(),
        }
    }
}

// The DSN may carry credentials.
impl fmt::Debug for DsnConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsnConnector").finish_non_exhaustive()
    }
}

impl Connector for DsnConnector {
    fn connect(&self, _ctx: &Context) -> DriverResult<Arc<dyn Conn>> {
        self.driver.open(&self.dsn)
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }
}

#[cfg(test)]
mod tests {
    use driverwrap::testing::FakeDriver;
    use driverwrap::{CapabilitySet, DriverError};

    use super::*;

    #[test]
    fn test_connect_opens_dsn_each_time() {
        let driver = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let connector = DsnConnector::new(driver.clone(), "postgres://u:secret@db/app");
        let ctx = Context::background();
        ctx.cancel();

        connector.connect(&ctx).unwrap();
        connector.connect(&ctx).unwrap();
        assert_eq!(driver.calls().count("open"), 2);
        assert_eq!(
            driver.opened(),
            vec!["postgres://u:secret@db/app".to_owned(); 2]
        );
    }

    #[test]
    fn test_driver_returns_same_instance() {
        let driver: Arc<dyn Driver> = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let connector = DsnConnector::new(Arc::clone(&driver), "dsn");
        assert!(Arc::ptr_eq(&connector.driver(), &driver));
        assert!(connector.as_closer().is_none());
    }

    #[test]
    fn test_open_error_returned() {
        let driver = Arc::new(
            FakeDriver::new(CapabilitySet::EMPTY).fail("open", DriverError::bad_conn()),
        );
        let connector = DsnConnector::new(driver, "dsn");
        let err = connector.connect(&Context::background()).err().unwrap();
        assert!(err.is_bad_conn());
    }

    #[test]
    fn test_debug_hides_dsn() {
        let driver = Arc::new(FakeDriver::new(CapabilitySet::EMPTY));
        let connector = DsnConnector::new(driver, "postgres://u:secret@db/app");
        assert!(!format!("{connector:?}").contains("secret"));
    }
}
