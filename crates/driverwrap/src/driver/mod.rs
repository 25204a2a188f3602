//! SQL driver contracts.
//!
//! Each family ("variant") has a base trait every implementation satisfies
//! plus a fixed list of optional capability traits. Capabilities are
//! detected through `as_*` accessors on the base trait, never by probing the
//! concrete type, which is what lets a proxy report exactly the capabilities
//! of the object it wraps.

mod conn;
mod context;
mod factory;
mod rows;
mod stmt;
mod tx;
mod value;

pub use conn::{
    Conn, ConnBeginTx, ConnPrepareContext, Execer, ExecerContext, NamedValueChecker, Pinger,
    Queryer, QueryerContext, SessionResetter, Validator,
};
pub use context::Context;
pub use factory::{Connector, ConnectorClose, Driver, OpenConnector};
pub use rows::{
    ColumnTypeDatabaseTypeName, ColumnTypeLength, ColumnTypeNullable, ColumnTypePrecisionScale,
    ColumnTypeScanType, Rows, RowsNextResultSet,
};
pub use stmt::{ColumnConverter, Stmt, StmtExecContext, StmtQueryContext};
pub use tx::Tx;
pub use value::{
    ExecResult, IsolationLevel, NamedValue, RowsAffected, ScanType, TxOptions, Value,
    ValueConverter,
};
