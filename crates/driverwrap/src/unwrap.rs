//! Recovering the driver object behind one or more proxies.

use std::sync::Arc;

use crate::driver::{Conn, Connector, Driver, Rows, Stmt, Tx};

/// Upper bound on the number of layers [`unwrap_all`] peels off.
///
/// Well-formed chains are a handful of layers deep; the bound only keeps a
/// cyclic chain from spinning forever.
pub const MAX_UNWRAP_DEPTH: usize = 64;

/// Capability of a wrapper to hand back what it wraps.
pub trait Unwrap<T: ?Sized> {
    /// The instance passed at wrap time, by reference.
    fn unwrap_inner(&self) -> Arc<T>;
}

/// Base contracts whose instances may carry [`Unwrap`].
pub trait Unwrappable {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>>;
}

impl Unwrappable for dyn Driver {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>> {
        self.as_unwrap()
    }
}

impl Unwrappable for dyn Connector {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>> {
        self.as_unwrap()
    }
}

impl Unwrappable for dyn Conn {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>> {
        self.as_unwrap()
    }
}

impl Unwrappable for dyn Stmt {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>> {
        self.as_unwrap()
    }
}

impl Unwrappable for dyn Rows {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>> {
        self.as_unwrap()
    }
}

impl Unwrappable for dyn Tx {
    fn unwrapper(&self) -> Option<&dyn Unwrap<Self>> {
        self.as_unwrap()
    }
}

/// Peels one layer; returns `value` itself when it is not a wrapper.
pub fn unwrap<T: ?Sized + Unwrappable>(value: &Arc<T>) -> Arc<T> {
    value
        .unwrapper()
        .map_or_else(|| Arc::clone(value), |inner| inner.unwrap_inner())
}

/// Peels layers until reaching a value that is not a wrapper.
///
/// Stops after [`MAX_UNWRAP_DEPTH`] layers and returns whatever it reached.
pub fn unwrap_all<T: ?Sized + Unwrappable>(value: Arc<T>) -> Arc<T> {
    let mut current = value;
    for _ in 0..MAX_UNWRAP_DEPTH {
        let Some(inner) = current.unwrapper().map(|u| u.unwrap_inner()) else {
            return current;
        };
        current = inner;
    }
    tracing::warn!(
        max_depth = MAX_UNWRAP_DEPTH,
        "unwrap chain did not terminate, stopping at depth limit"
    );
    current
}

pub fn unwrap_driver(value: &Arc<dyn Driver>) -> Arc<dyn Driver> {
    unwrap(value)
}

pub fn unwrap_connector(value: &Arc<dyn Connector>) -> Arc<dyn Connector> {
    unwrap(value)
}

pub fn unwrap_conn(value: &Arc<dyn Conn>) -> Arc<dyn Conn> {
    unwrap(value)
}

pub fn unwrap_stmt(value: &Arc<dyn Stmt>) -> Arc<dyn Stmt> {
    unwrap(value)
}

pub fn unwrap_rows(value: &Arc<dyn Rows>) -> Arc<dyn Rows> {
    unwrap(value)
}

pub fn unwrap_tx(value: &Arc<dyn Tx>) -> Arc<dyn Tx> {
    unwrap(value)
}
