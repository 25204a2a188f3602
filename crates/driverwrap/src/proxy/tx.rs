use std::fmt;
use std::sync::Arc;

use crate::driver::Tx;
use crate::error::DriverResult;
use crate::registry;
use crate::unwrap::Unwrap;

hooks! {
    /// Interceptors for [`Tx`].
    pub struct TxHooks {
        commit: TxCommitFn, TxCommitHook = Fn() -> DriverResult<()>;
        rollback: TxRollbackFn, TxRollbackHook = Fn() -> DriverResult<()>;
    }
}

/// Forwarding wrapper around a transaction.
pub struct TxProxy {
    wrapped: Arc<dyn Tx>,
    hooks: TxHooks,
}

impl TxProxy {
    pub fn new(wrapped: Arc<dyn Tx>, hooks: TxHooks) -> Self {
        tracing::debug!(
            variant = registry::TX.name,
            hooks = ?hooks.installed(),
            "wrapping transaction"
        );
        Self { wrapped, hooks }
    }
}

impl fmt::Debug for TxProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxProxy")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

pub fn wrap_tx(wrapped: Arc<dyn Tx>, hooks: TxHooks) -> Arc<dyn Tx> {
    Arc::new(TxProxy::new(wrapped, hooks))
}

impl Unwrap<dyn Tx> for TxProxy {
    fn unwrap_inner(&self) -> Arc<dyn Tx> {
        Arc::clone(&self.wrapped)
    }
}

impl Tx for TxProxy {
    fn commit(&self) -> DriverResult<()> {
        forward!(self.hooks.commit, &*self.wrapped => commit())
    }

    fn rollback(&self) -> DriverResult<()> {
        forward!(self.hooks.rollback, &*self.wrapped => rollback())
    }

    fn as_unwrap(&self) -> Option<&dyn Unwrap<dyn Tx>> {
        Some(self)
    }
}
