//! Per-call cancellation context.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::DriverError;

/// Cancellation and deadline carried by context-aware driver methods.
///
/// Proxies pass the same reference through untouched; only drivers and
/// hooks ever look at it.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context cancelled together with this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context is done, if it is.
    #[must_use]
    pub fn err(&self) -> Option<DriverError> {
        if self.token.is_cancelled() {
            Some(DriverError::canceled())
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(DriverError::deadline_exceeded())
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}
