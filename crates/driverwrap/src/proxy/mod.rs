//! Forwarding proxies, one per contract family.
//!
//! A proxy implements its family's base trait and every optional capability
//! trait, forwarding each call to the wrapped instance through an optional
//! per-method hook. Which capabilities callers can *see* is decided once, at
//! wrap time, by [`detect`](crate::registry::detect): the proxy's `as_*`
//! accessors consult the stored [`CapabilitySet`](crate::CapabilitySet), so
//! the proxy reports exactly the capabilities of the wrapped instance.
//!
//! # Hook shape
//!
//! A hook receives the bound original method and returns its replacement:
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use driverwrap::Context;
//! use driverwrap::proxy::ConnHooks;
//!
//! let pings = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&pings);
//! let hooks = ConnHooks::new().with_ping(move |original| {
//!     let counter = Arc::clone(&counter);
//!     Box::new(move |ctx: &Context| {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!         original(ctx)
//!     })
//! });
//! assert_eq!(hooks.installed(), vec!["ping"]);
//! ```
//!
//! The replacement may call the original once, several times, or not at all.

pub use conn::{
    ConnBeginFn, ConnBeginHook, ConnBeginTxFn, ConnBeginTxHook, ConnCheckNamedValueFn,
    ConnCheckNamedValueHook, ConnCloseFn, ConnCloseHook, ConnExecContextFn, ConnExecContextHook,
    ConnExecFn, ConnExecHook, ConnHooks, ConnIsValidFn, ConnIsValidHook, ConnPingFn, ConnPingHook,
    ConnPrepareContextFn, ConnPrepareContextHook, ConnPrepareFn, ConnPrepareHook, ConnProxy,
    ConnQueryContextFn, ConnQueryContextHook, ConnQueryFn, ConnQueryHook, ConnResetSessionFn,
    ConnResetSessionHook, wrap_conn,
};
pub use driver::{
    ConnectorCloseFn, ConnectorCloseHook, ConnectorConnectFn, ConnectorConnectHook,
    ConnectorDriverFn, ConnectorDriverHook, ConnectorHooks, ConnectorProxy, DriverHooks,
    DriverOpenConnectorFn, DriverOpenConnectorHook, DriverOpenFn, DriverOpenHook, DriverProxy,
    wrap_connector, wrap_driver,
};
pub use rows::{
    RowsCloseFn, RowsCloseHook, RowsColumnTypeDatabaseTypeNameFn,
    RowsColumnTypeDatabaseTypeNameHook, RowsColumnTypeLengthFn, RowsColumnTypeLengthHook,
    RowsColumnTypeNullableFn, RowsColumnTypeNullableHook, RowsColumnTypePrecisionScaleFn,
    RowsColumnTypePrecisionScaleHook, RowsColumnTypeScanTypeFn, RowsColumnTypeScanTypeHook,
    RowsColumnsFn, RowsColumnsHook, RowsHasNextResultSetFn, RowsHasNextResultSetHook, RowsHooks,
    RowsNextFn, RowsNextHook, RowsNextResultSetFn, RowsNextResultSetHook, RowsProxy, wrap_rows,
};
pub use stmt::{
    StmtCheckNamedValueFn, StmtCheckNamedValueHook, StmtCloseFn, StmtCloseHook,
    StmtColumnConverterFn, StmtColumnConverterHook, StmtExecContextFn, StmtExecContextHook,
    StmtExecFn, StmtExecHook, StmtHooks, StmtNumInputFn, StmtNumInputHook, StmtProxy,
    StmtQueryContextFn, StmtQueryContextHook, StmtQueryFn, StmtQueryHook, wrap_stmt,
};
pub use tx::{TxCommitFn, TxCommitHook, TxHooks, TxProxy, TxRollbackFn, TxRollbackHook, wrap_tx};

/// Declares a hook table: for every method, a boxed "original" alias, a
/// hook alias, an optional field, and a `with_<method>` builder.
macro_rules! hooks {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $field:ident: $fn_alias:ident, $hook_alias:ident = Fn($($arg:ty),*) -> $ret:ty;
            )*
        }
    ) => {
        $(
            #[doc = concat!("The bound original `", stringify!($field), "` handed to a hook.")]
            pub type $fn_alias<'a> = Box<dyn Fn($($arg),*) -> $ret + 'a>;

            #[doc = concat!("Interceptor for `", stringify!($field), "`.")]
            pub type $hook_alias =
                std::sync::Arc<dyn for<'a> Fn($fn_alias<'a>) -> $fn_alias<'a> + Send + Sync>;
        )*

        $(#[$meta])*
        #[derive(Clone, Default)]
        pub struct $name {
            $(pub $field: Option<$hook_alias>,)*
        }

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Methods that currently have a hook installed.
            #[must_use]
            pub fn installed(&self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(
                    if self.$field.is_some() {
                        names.push(stringify!($field));
                    }
                )*
                names
            }

            $(
                paste::paste! {
                    #[doc = concat!("Installs the hook for `", stringify!($field), "`.")]
                    #[must_use]
                    pub fn [<with_ $field>]<F>(mut self, hook: F) -> Self
                    where
                        F: for<'a> Fn($fn_alias<'a>) -> $fn_alias<'a> + Send + Sync + 'static,
                    {
                        self.$field = Some(std::sync::Arc::new(hook));
                        self
                    }
                }
            )*
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("installed", &self.installed())
                    .finish()
            }
        }
    };
}

/// Calls `target.method(args)` directly, or through the hook when one is set.
macro_rules! forward {
    ($hook:expr, $target:expr => $method:ident($($arg:ident: $ty:ty),*)) => {{
        let target = $target;
        match &$hook {
            None => target.$method($($arg),*),
            Some(hook) => hook(Box::new(|$($arg: $ty),*| target.$method($($arg),*)))($($arg),*),
        }
    }};
}

use crate::registry::CapabilitySet;

mod conn;
mod driver;
mod rows;
mod stmt;
mod tx;

/// Returns `view` when the capability at `index` was detected at wrap time.
pub(crate) fn exposed<C: ?Sized>(
    capabilities: CapabilitySet,
    index: usize,
    view: &C,
) -> Option<&C> {
    capabilities.contains(index).then_some(view)
}

/// Resolves a capability the instance exposed at wrap time.
///
/// Each forwarded call asks the wrapped instance for its capability view
/// again, the way a checked downcast happens at every call site. Detection
/// itself runs once, in the proxy constructor.
///
/// The capability set is fixed at wrap time; an instance that later stops
/// exposing a capability breaks the registry contract, which is a bug in the
/// driver and not a recoverable condition.
#[track_caller]
pub(crate) fn required<'a, C: ?Sized>(
    capability: Option<&'a C>,
    variant: &str,
    name: &str,
) -> &'a C {
    match capability {
        Some(capability) => capability,
        None => panic!("wrapped {variant} stopped exposing {name} after it was wrapped"),
    }
}
