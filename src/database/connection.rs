//! Connection parameters and the SQL client seam.
//!
//! The workflow never talks to a wire driver directly. It asks a
//! [`SqlConnector`] for a [`SqlSession`] and issues plain statements through
//! it, so every stage can be exercised against mocks.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use super::QueryResult;
use crate::error::DatabaseError;

/// Future returned by [`SqlConnector::connect`].
pub type ConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn SqlSession>, DatabaseError>> + Send + 'a>>;

/// Future returned by [`SqlSession::query`].
pub type QueryFuture<'a> =
    Pin<Box<dyn Future<Output = Result<QueryResult, DatabaseError>> + Send + 'a>>;

/// An open autocommit session.
pub trait SqlSession: Send {
    /// Execute `sql` and return its first result set.
    fn query(&mut self, sql: &str) -> QueryFuture<'_>;
}

/// Opens sessions against a server.
pub trait SqlConnector: Send + Sync {
    /// Connect with `params`.
    fn connect(&self, params: &ConnectionParams) -> ConnectFuture<'_>;
}

/// Everything needed to open a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    driver: Option<String>,
    trust_cert: bool,
}

impl ConnectionParams {
    /// Parameters for `host:port` with `sa` credentials and the `master`
    /// database.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: String::from("sa"),
            password: String::new(),
            database: String::from("master"),
            driver: None,
            trust_cert: true,
        }
    }

    /// Set the login.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Set the initial database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the client driver profile.
    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set whether the server certificate is trusted without validation.
    #[must_use]
    pub const fn with_trust_cert(mut self, trust_cert: bool) -> Self {
        self.trust_cert = trust_cert;
        self
    }

    /// Server host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Login name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Login password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Initial database.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Client driver profile, if one was chosen.
    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    /// Whether the server certificate is trusted without validation.
    #[must_use]
    pub const fn trust_cert(&self) -> bool {
        self.trust_cert
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("driver", &self.driver)
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
}

/// ODBC-style connection string with the password masked.
impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(driver) = &self.driver {
            write!(f, "DRIVER={{{driver}}};")?;
        }
        write!(
            f,
            "SERVER={},{};DATABASE={};UID={};PWD=***",
            self.host, self.port, self.database, self.user
        )?;
        if self.trust_cert {
            f.write_str(";TrustServerCertificate=yes")?;
        }
        Ok(())
    }
}
