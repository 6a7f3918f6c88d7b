//! Resolved, immutable export settings.

use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

/// Host used when neither `-H` nor `DB_HOST` is given
pub const DEFAULT_HOST: &str = "localhost";
/// PostgreSQL's standard port
pub const DEFAULT_PORT: &str = "5432";
/// Use TLS when the server offers it, plain text otherwise
pub const DEFAULT_SSL_MODE: &str = "prefer";
/// Connection timeout, in seconds, when `-timeout` is not given
pub const DEFAULT_TIMEOUT_SECS: &str = "180";

/// Individual connection parameters.
///
/// The password is wiped from memory when the parts are dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParts {
    pub user: String,
    pub password: Zeroizing<String>,
    pub host: String,
    pub port: String,
    pub database: String,
    /// One of disable, allow, prefer, require, verify-ca, verify-full
    pub ssl_mode: String,
}

impl ConnectionParts {
    /// Builds a `postgres://` descriptor with the password percent-encoded.
    ///
    /// # Example
    /// ```rust
    /// use pgporter_core::config::ConnectionParts;
    ///
    /// let parts = ConnectionParts {
    ///     user: "app".to_string(),
    ///     password: "p@ss".to_string().into(),
    ///     host: "db".to_string(),
    ///     port: "5432".to_string(),
    ///     database: "sales".to_string(),
    ///     ssl_mode: "require".to_string(),
    /// };
    /// assert_eq!(
    ///     parts.to_url().as_str(),
    ///     "postgres://app:p%40ss@db:5432/sales?sslmode=require"
    /// );
    /// ```
    pub fn to_url(&self) -> Zeroizing<String> {
        let password = encode_password(&self.password);
        Zeroizing::new(format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user,
            password.as_str(),
            self.host,
            self.port,
            self.database,
            self.ssl_mode
        ))
    }
}

impl std::fmt::Debug for ConnectionParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParts")
            .field("user", &self.user)
            .field("password", &"****")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Where to connect: a complete descriptor, or parts to build one from.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// Explicit `-dsn`, used verbatim
    Descriptor(Zeroizing<String>),
    /// Descriptor assembled from user, host, port and friends
    Parts(ConnectionParts),
}

impl std::fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Descriptor(url) => f
                .debug_tuple("Descriptor")
                .field(&crate::error::redact_database_url(url))
                .finish(),
            Self::Parts(parts) => f.debug_tuple("Parts").field(parts).finish(),
        }
    }
}

/// Everything one export needs. Built once, never modified.
#[derive(Debug, Clone)]
pub struct Settings {
    query: String,
    output: PathBuf,
    connect_timeout: Duration,
    target: ConnectionTarget,
}

impl Settings {
    pub(crate) const fn new(
        query: String,
        output: PathBuf,
        connect_timeout: Duration,
        target: ConnectionTarget,
    ) -> Self {
        Self {
            query,
            output,
            connect_timeout,
            target,
        }
    }

    /// Query text embedded in the COPY statement
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Destination file
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Deadline for establishing the connection
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Connection target as resolved
    pub const fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Connection descriptor: the explicit one verbatim, or one built from parts.
    pub fn connection_url(&self) -> Zeroizing<String> {
        match &self.target {
            ConnectionTarget::Descriptor(url) => url.clone(),
            ConnectionTarget::Parts(parts) => parts.to_url(),
        }
    }
}

/// Percent-encodes a password for the userinfo section of a URL.
///
/// Form encoding turns spaces into `+`, which URL parsers keep literally in
/// userinfo, so spaces are emitted as `%20` instead.
fn encode_password(password: &str) -> Zeroizing<String> {
    let encoded: String = url::form_urlencoded::byte_serialize(password.as_bytes()).collect();
    Zeroizing::new(encoded.replace('+', "%20"))
}
