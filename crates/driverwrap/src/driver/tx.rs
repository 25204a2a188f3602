use crate::error::DriverResult;
use crate::unwrap::Unwrap;

/// An open transaction. Has no optional capabilities.
pub trait Tx: Send + Sync {
    fn commit(&self) -> DriverResult<()>;

    fn rollback(&self) -> DriverResult<()>;

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Tx>> {
        None
    }
}
