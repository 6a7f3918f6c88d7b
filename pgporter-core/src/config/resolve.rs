//! Flag > environment > default resolution of export settings.

use super::environment::{DB_HOST, DB_NAME, DB_PASS, DB_PORT, DB_SSLMODE, DB_USER, Environment};
use super::settings::{
    ConnectionParts, ConnectionTarget, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SSL_MODE,
    DEFAULT_TIMEOUT_SECS, Settings,
};
use crate::{PgPorterError, Result};
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

/// Raw flag values as typed on the command line.
///
/// An empty value means the flag was not given.
#[derive(Clone)]
pub struct ConfigInputs {
    pub sql: String,
    /// Used as given, including non-UTF-8 names
    pub out: PathBuf,
    pub dsn: String,
    pub user: String,
    pub dbname: String,
    pub host: String,
    pub port: String,
    pub password: Zeroizing<String>,
    pub sslmode: String,
    /// Seconds, as text
    pub timeout: String,
}

impl Default for ConfigInputs {
    fn default() -> Self {
        Self {
            sql: String::new(),
            out: PathBuf::new(),
            dsn: String::new(),
            user: String::new(),
            dbname: String::new(),
            host: String::new(),
            port: String::new(),
            password: Zeroizing::default(),
            sslmode: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS.to_string(),
        }
    }
}

/// Picks the flag value, else the environment value, else the default.
///
/// Empty values count as absent at both levels.
pub fn flag_or_env(flag: &str, env: &Environment, key: &str, default: &str) -> String {
    if !flag.is_empty() {
        return flag.to_string();
    }
    env.get(key).unwrap_or(default).to_string()
}

/// Whole seconds only: no sign, no surrounding whitespace, no unit.
fn parse_timeout(raw: &str) -> Result<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|source| PgPorterError::InvalidTimeout {
            value: raw.to_string(),
            source,
        })
}

/// Produces validated settings from flag values and the environment.
///
/// Each field is resolved on its own. An explicit descriptor makes the
/// individual connection parts irrelevant, but the query and output path are
/// always required.
///
/// # Errors
/// Returns a configuration error for a non-numeric timeout or any missing
/// required field. No connection is attempted by this function.
pub fn resolve(inputs: &ConfigInputs, env: &Environment) -> Result<Settings> {
    let connect_timeout = parse_timeout(&inputs.timeout)?;

    let parts = ConnectionParts {
        user: flag_or_env(&inputs.user, env, DB_USER, ""),
        password: Zeroizing::new(flag_or_env(&inputs.password, env, DB_PASS, "")),
        host: flag_or_env(&inputs.host, env, DB_HOST, DEFAULT_HOST),
        port: flag_or_env(&inputs.port, env, DB_PORT, DEFAULT_PORT),
        database: flag_or_env(&inputs.dbname, env, DB_NAME, ""),
        ssl_mode: flag_or_env(&inputs.sslmode, env, DB_SSLMODE, DEFAULT_SSL_MODE),
    };

    let target = if inputs.dsn.is_empty() {
        if parts.user.is_empty() {
            return Err(PgPorterError::missing("user", "use -U or DB_USER, or pass -dsn"));
        }
        if parts.database.is_empty() {
            return Err(PgPorterError::missing(
                "database name",
                "use -d or DB_NAME, or pass -dsn",
            ));
        }
        ConnectionTarget::Parts(parts)
    } else {
        ConnectionTarget::Descriptor(Zeroizing::new(inputs.dsn.clone()))
    };

    if inputs.sql.is_empty() {
        return Err(PgPorterError::missing("sql", "use -sql"));
    }
    if inputs.out.as_os_str().is_empty() {
        return Err(PgPorterError::missing("output path", "use -out"));
    }

    Ok(Settings::new(
        inputs.sql.clone(),
        inputs.out.clone(),
        connect_timeout,
        target,
    ))
}
