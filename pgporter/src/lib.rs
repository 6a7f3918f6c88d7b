//! Library side of the `pg-porter` binary.
//!
//! Holds the CLI definition and the top-level export flow so both can be
//! exercised from tests. The binary itself is in main.rs.

use clap::{Args, Parser};
use pgporter_core::{
    ConfigInputs, Environment, ExportSummary, Result, config, connection, progress, spawn_export,
};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::info;
use zeroize::Zeroizing;

/// Long flags that may be written with a single dash (`-sql`, `-out=...`)
const SINGLE_DASH_LONG: [&str; 8] = [
    "sql", "out", "dsn", "sslmode", "timeout", "env-file", "verbose", "quiet",
];

/// Flags whose value follows as the next argument
const TAKES_VALUE: [&str; 11] = [
    "--sql", "--out", "--dsn", "--sslmode", "--timeout", "--env-file", "-U", "-d", "-H", "-p", "-W",
];

/// CLI argument structure
#[derive(Parser)]
#[command(name = "pg-porter")]
#[command(about = "Export a PostgreSQL query result to a CSV file")]
#[command(version)]
#[command(long_about = "
pg-porter - Stream a query result to CSV with COPY

The query runs inside COPY (...) TO STDOUT on the server, which formats the
rows as CSV with a header line; pg-porter writes them straight to the output
file.

Connection settings come from flags, then DB_HOST, DB_USER, DB_PASS, DB_PORT,
DB_NAME and DB_SSLMODE (from the environment or the settings file), then
defaults. -dsn replaces all of them.

EXAMPLES:
  pg-porter -sql 'SELECT * FROM orders' -out orders.csv -U app -d sales
  pg-porter -dsn postgres://app:secret@db:5432/sales -sql 'SELECT 1' -out one.csv
")]
pub struct Cli {
    /// Query to export
    #[arg(
        long,
        value_name = "QUERY",
        allow_hyphen_values = true,
        help = "SQL query whose result is exported"
    )]
    pub sql: Option<String>,

    /// Output file path
    #[arg(
        long,
        value_name = "FILE",
        allow_hyphen_values = true,
        help = "Output CSV file (overwritten)"
    )]
    pub out: Option<PathBuf>,

    /// Full connection descriptor
    #[arg(
        long,
        value_name = "URL",
        allow_hyphen_values = true,
        help = "Database connection string; overrides the individual connection flags"
    )]
    pub dsn: Option<String>,

    /// Database user
    #[arg(
        short = 'U',
        value_name = "USER",
        allow_hyphen_values = true,
        help = "Database user [env: DB_USER]"
    )]
    pub user: Option<String>,

    /// Database name
    #[arg(
        short = 'd',
        value_name = "DBNAME",
        allow_hyphen_values = true,
        help = "Database name [env: DB_NAME]"
    )]
    pub dbname: Option<String>,

    /// Database host
    #[arg(
        short = 'H',
        value_name = "HOST",
        allow_hyphen_values = true,
        help = "Database host [env: DB_HOST] [default: localhost]"
    )]
    pub host: Option<String>,

    /// Database port
    #[arg(
        short = 'p',
        value_name = "PORT",
        allow_hyphen_values = true,
        help = "Database port [env: DB_PORT] [default: 5432]"
    )]
    pub port: Option<String>,

    /// Database password
    #[arg(
        short = 'W',
        value_name = "PASSWORD",
        allow_hyphen_values = true,
        help = "Database password [env: DB_PASS]"
    )]
    pub password: Option<String>,

    /// SSL mode
    #[arg(
        long,
        value_name = "MODE",
        allow_hyphen_values = true,
        help = "SSL mode (disable, allow, prefer, require, verify-ca, verify-full) [env: DB_SSLMODE] [default: prefer]"
    )]
    pub sslmode: Option<String>,

    /// Connection timeout in seconds
    #[arg(
        long,
        value_name = "SECONDS",
        allow_hyphen_values = true,
        default_value = config::DEFAULT_TIMEOUT_SECS,
        help = "Connection timeout in seconds"
    )]
    pub timeout: String,

    /// Settings file
    #[arg(
        long,
        value_name = "FILE",
        allow_hyphen_values = true,
        default_value = ".env",
        help = "Optional KEY=VALUE file supplying DB_* variables not set in the environment"
    )]
    pub env_file: PathBuf,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Output control flags
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress progress and informational logs")]
    pub quiet: bool,
}

impl Cli {
    /// Raw flag values for the resolver; absent flags become empty strings.
    pub fn config_inputs(&self) -> ConfigInputs {
        ConfigInputs {
            sql: self.sql.clone().unwrap_or_default(),
            out: self.out.clone().unwrap_or_default(),
            dsn: self.dsn.clone().unwrap_or_default(),
            user: self.user.clone().unwrap_or_default(),
            dbname: self.dbname.clone().unwrap_or_default(),
            host: self.host.clone().unwrap_or_default(),
            port: self.port.clone().unwrap_or_default(),
            password: Zeroizing::new(self.password.clone().unwrap_or_default()),
            sslmode: self.sslmode.clone().unwrap_or_default(),
            timeout: self.timeout.clone(),
        }
    }
}

/// Rewrites single-dash long flags (`-sql`, `-out=x`) to their `--` form.
///
/// Values following a flag are left untouched, as is everything after `--`.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut normalized = Vec::new();
    let mut args = args.into_iter().map(Into::into);

    // Program name
    if let Some(program) = args.next() {
        normalized.push(program);
    }

    let mut expects_value = false;
    while let Some(arg) = args.next() {
        if expects_value {
            expects_value = false;
            normalized.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };

        if text == "--" {
            normalized.push(arg);
            normalized.extend(args.by_ref());
            break;
        }

        let rewritten = match text.strip_prefix('-') {
            Some(rest) if !rest.starts_with('-') => {
                let name = rest.split_once('=').map_or(rest, |(name, _)| name);
                if SINGLE_DASH_LONG.contains(&name) {
                    format!("-{}", text)
                } else {
                    text.to_string()
                }
            }
            _ => text.to_string(),
        };

        expects_value = !rewritten.contains('=') && TAKES_VALUE.contains(&rewritten.as_str());
        normalized.push(OsString::from(rewritten));
    }

    normalized
}

/// Renders an error followed by its chain of causes.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Resolves settings, connects, runs the export and waits for it.
///
/// # Errors
/// Returns configuration errors before any connection is attempted, then
/// connection and export errors as they occur.
pub async fn run(cli: &Cli) -> Result<ExportSummary> {
    let env = Environment::load(&cli.env_file)?;
    let settings = config::resolve(&cli.config_inputs(), &env)?;

    info!("Output: {}", settings.output().display());
    let conn = connection::connect(&settings).await?;

    info!("Starting export...");
    let handle = spawn_export(
        conn,
        settings.query().to_string(),
        settings.output().to_path_buf(),
    );

    let spinner = progress::create_spinner(cli.global.quiet);
    let rows = progress::watch(handle.done, &spinner).await?;

    Ok(ExportSummary {
        query: settings.query().to_string(),
        output: settings.output().to_path_buf(),
        rows,
        elapsed: handle.started.elapsed(),
    })
}
