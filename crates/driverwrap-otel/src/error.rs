use driverwrap::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl Error {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("unknown database system: mysql".into());
        assert!(err.is_config());
        assert!(!err.is_driver());
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown database system: mysql"
        );
    }

    #[test]
    fn test_driver_error_conversion() {
        let err: Error = DriverError::bad_conn().into();
        assert!(err.is_driver());
        assert_eq!(err.to_string(), "Driver error: driver: bad connection");
    }
}
