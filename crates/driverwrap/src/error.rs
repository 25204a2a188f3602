//! Error type shared by every driver contract.
//!
//! Follows the "canonical error struct" pattern: the classification enum is
//! private and callers use the `is_xxx()` predicates. Proxies never construct
//! these errors themselves; they only carry what a driver or hook returned.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Error returned by driver contract methods.
///
/// Cheap to clone so that hooks can observe an error and still hand the
/// same value back to the caller.
///
/// # Example
///
/// ```rust
/// use driverwrap::DriverError;
///
/// let err = DriverError::bad_conn();
/// assert!(err.is_bad_conn());
/// assert!(!err.is_skip());
/// ```
#[derive(Error, Debug, Clone)]
#[error(transparent)]
pub struct DriverError {
    kind: ErrorKind,
}

#[derive(Error, Debug, Clone)]
pub(crate) enum ErrorKind {
    /// The connection is unusable and should be discarded.
    #[error("driver: bad connection")]
    BadConn,

    /// An optional fast path declined; the caller should fall back.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// A named value checker consumed the argument.
    #[error("driver: remove argument from query")]
    RemoveArgument,

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Message(String),

    #[error("{message}")]
    Other {
        message: String,
        #[source]
        cause: Arc<dyn StdError + Send + Sync>,
    },
}

impl DriverError {
    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    /// Connection is broken and must not be reused.
    #[must_use]
    pub const fn bad_conn() -> Self {
        Self {
            kind: ErrorKind::BadConn,
        }
    }

    /// Optional fast path not taken.
    #[must_use]
    pub const fn skip() -> Self {
        Self {
            kind: ErrorKind::Skip,
        }
    }

    /// Argument was consumed by a named value checker.
    #[must_use]
    pub const fn remove_argument() -> Self {
        Self {
            kind: ErrorKind::RemoveArgument,
        }
    }

    /// The operation's context was cancelled.
    #[must_use]
    pub const fn canceled() -> Self {
        Self {
            kind: ErrorKind::Canceled,
        }
    }

    /// The operation's context deadline passed.
    #[must_use]
    pub const fn deadline_exceeded() -> Self {
        Self {
            kind: ErrorKind::DeadlineExceeded,
        }
    }

    /// Free-form driver failure.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Message(message.into()),
        }
    }

    /// Driver failure caused by another error.
    #[must_use]
    pub fn other(
        message: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: ErrorKind::Other {
                message: message.into(),
                cause: Arc::new(cause),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicate Methods (is_xxx)
    // ═══════════════════════════════════════════════════════════════════════

    #[must_use]
    pub const fn is_bad_conn(&self) -> bool {
        matches!(self.kind, ErrorKind::BadConn)
    }

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self.kind, ErrorKind::Skip)
    }

    #[must_use]
    pub const fn is_remove_argument(&self) -> bool {
        matches!(self.kind, ErrorKind::RemoveArgument)
    }

    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled)
    }

    #[must_use]
    pub const fn is_deadline_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::DeadlineExceeded)
    }

    /// Returns true for either cancellation or deadline expiry.
    #[must_use]
    pub const fn is_context_done(&self) -> bool {
        self.is_canceled() || self.is_deadline_exceeded()
    }
}

/// Result type alias for driver contract methods.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_sentinel_predicates() {
        assert!(DriverError::bad_conn().is_bad_conn());
        assert!(DriverError::skip().is_skip());
        assert!(DriverError::remove_argument().is_remove_argument());
        assert!(!DriverError::skip().is_bad_conn());
    }

    #[test]
    fn test_context_done() {
        assert!(DriverError::canceled().is_context_done());
        assert!(DriverError::deadline_exceeded().is_context_done());
        assert!(!DriverError::message("boom").is_context_done());
    }

    #[test]
    fn test_error_display() {
        let err = DriverError::message("relation \"users\" does not exist");
        assert_eq!(err.to_string(), "relation \"users\" does not exist");
        assert_eq!(DriverError::bad_conn().to_string(), "driver: bad connection");
    }

    #[test]
    fn test_other_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = DriverError::other("write failed", io);
        assert_eq!(err.to_string(), "write failed");
        let source = err.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("reset by peer"));
    }

    #[test]
    fn test_clone_preserves_kind() {
        let err = DriverError::other("x", std::fmt::Error);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(cloned.source().is_some());
    }
}
