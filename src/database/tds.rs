//! SQL Server sessions over TDS.
//!
//! [`TdsConnector`] opens [`SqlSession`]s with `tiberius`. The selected
//! driver name picks the encryption profile: the newest driver insists on an
//! encrypted channel, older ones only encrypt the login exchange.

use std::borrow::Cow;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::{
    ColumnInfo, ConnectFuture, ConnectionParams, QueryFuture, QueryResult, SqlConnector,
    SqlSession, Value,
};
use crate::error::DatabaseError;

/// Default time allowed for the TCP connect and login handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Label used for connections made without a named driver.
const DEFAULT_PROFILE: &str = "default";

/// Encryption level for a driver profile.
#[must_use]
pub fn encryption_for(driver: Option<&str>) -> EncryptionLevel {
    match driver {
        Some(name) if name.contains("Driver 18") => EncryptionLevel::Required,
        _ => EncryptionLevel::Off,
    }
}

/// Opens sessions with `tiberius`.
#[derive(Debug, Clone, Copy)]
pub struct TdsConnector {
    connect_timeout: Duration,
}

impl TdsConnector {
    /// Connector using [`CONNECT_TIMEOUT`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    fn client_config(params: &ConnectionParams) -> Config {
        let mut config = Config::new();
        config.host(params.host());
        config.port(params.port());
        config.authentication(AuthMethod::sql_server(params.user(), params.password()));
        config.database(params.database());
        config.encryption(encryption_for(params.driver()));
        if params.trust_cert() {
            config.trust_cert();
        }
        config
    }

    async fn open(&self, params: ConnectionParams) -> Result<Box<dyn SqlSession>, DatabaseError> {
        let driver = String::from(params.driver().unwrap_or(DEFAULT_PROFILE));
        let connect_failed = |message: String| DatabaseError::ConnectFailed {
            driver: driver.clone(),
            message,
        };

        let config = Self::client_config(&params);
        let handshake = async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| connect_failed(e.to_string()))?;
            tcp.set_nodelay(true)
                .map_err(|e| connect_failed(e.to_string()))?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| connect_failed(e.to_string()))
        };

        let client = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                connect_failed(format!(
                    "timed out after {} seconds",
                    self.connect_timeout.as_secs()
                ))
            })??;

        debug!(%params, "session opened");
        Ok(Box::new(TdsSession { client }))
    }
}

impl Default for TdsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlConnector for TdsConnector {
    fn connect(&self, params: &ConnectionParams) -> ConnectFuture<'_> {
        let owned = params.clone();
        Box::pin(self.open(owned))
    }
}

/// An open `tiberius` client.
struct TdsSession {
    client: Client<Compat<TcpStream>>,
}

impl SqlSession for TdsSession {
    fn query(&mut self, sql: &str) -> QueryFuture<'_> {
        let statement = String::from(sql);
        Box::pin(async move {
            let stream = self
                .client
                .simple_query(statement)
                .await
                .map_err(query_error)?;
            let mut stream = std::pin::pin!(stream);

            let mut result = QueryResult::default();
            while let Some(item) = stream.try_next().await.map_err(query_error)? {
                match item {
                    QueryItem::Metadata(meta) if meta.result_index() == 0 => {
                        result.columns = meta
                            .columns()
                            .iter()
                            .map(|c| ColumnInfo::new(c.name(), format!("{:?}", c.column_type())))
                            .collect();
                    }
                    QueryItem::Row(row) if row.result_index() == 0 => {
                        result.rows.push(row.into_iter().map(value_from_column).collect());
                    }
                    QueryItem::Metadata(_) | QueryItem::Row(_) => {}
                }
            }
            Ok(result)
        })
    }
}

/// Map a driver error, keeping the server error number when there is one.
fn query_error(error: tiberius::error::Error) -> DatabaseError {
    match error {
        tiberius::error::Error::Server(token) => {
            DatabaseError::query(Some(token.code()), token.message())
        }
        other => DatabaseError::query(None, other.to_string()),
    }
}

/// Convert a wire value into a [`Value`].
#[must_use]
pub fn value_from_column(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map_or(Value::Null, |n| Value::Int(i64::from(n))),
        ColumnData::I16(v) => v.map_or(Value::Null, |n| Value::Int(i64::from(n))),
        ColumnData::I32(v) => v.map_or(Value::Null, |n| Value::Int(i64::from(n))),
        ColumnData::I64(v) => v.map_or(Value::Null, Value::Int),
        ColumnData::F32(v) => v.map_or(Value::Null, |n| Value::Float(f64::from(n))),
        ColumnData::F64(v) => v.map_or(Value::Null, Value::Float),
        ColumnData::Bit(v) => v.map_or(Value::Null, Value::Bool),
        ColumnData::String(v) => v.map_or(Value::Null, |s| Value::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(Value::Null, |g| Value::Text(g.to_string())),
        ColumnData::Binary(v) => v.map_or(Value::Null, |b| Value::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map_or(Value::Null, |n| Value::Text(n.to_string())),
        ColumnData::Xml(v) => v.map_or(Value::Null, |x| {
            Value::Text(Cow::into_owned(x).into_string())
        }),
        temporal => temporal_value(&temporal),
    }
}

fn temporal_value(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .ok()
            .flatten()
            .map_or(Value::Null, |stamp| Value::Text(stamp.to_rfc3339())),
        _ => NaiveDateTime::from_sql(data)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Timestamp),
    }
}
