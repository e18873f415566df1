//! Database client side of the workflow.
//!
//! Driver discovery, the connectivity probe, the backup restore and result
//! rendering. Sessions are opened through the [`SqlConnector`] seam; the
//! production implementation is [`TdsConnector`].

mod connection;
mod drivers;
mod probe;
mod render;
mod restore;
mod tds;
mod types;


pub use connection::{ConnectFuture, ConnectionParams, QueryFuture, SqlConnector, SqlSession};
pub use drivers::{
    DRIVER_PREFERENCE, DriverCatalog, OdbcInstCatalog, parse_odbcinst, rank_drivers,
    select_driver,
};
pub use probe::{PROBE_STATEMENT, probe_server};
pub use render::{UNNAMED_COLUMN, format_thousands, render_table};
pub use restore::{RestorePlan, TransientErrorClassifier, quote_identifier, restore_database};
pub use tds::{CONNECT_TIMEOUT, TdsConnector, encryption_for, value_from_column};
pub use types::{ColumnInfo, QueryResult, Row, Value};

#[cfg(test)]
pub use drivers::MockDriverCatalog;
