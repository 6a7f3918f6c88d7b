//! Core of pg-porter: stream a PostgreSQL query result into a CSV file.
//!
//! The crate resolves settings from flags, environment and an optional
//! settings file, opens one connection under a deadline, runs
//! `COPY (query) TO STDOUT` on a background task and reports progress until
//! the task signals completion.
//!
//! # Security Guarantees
//! - Passwords are zeroed on drop and never appear in `Debug` output
//! - Connection descriptors are redacted before they reach the logs
//! - Error messages never carry credentials

pub mod config;
pub mod connection;
pub mod error;
pub mod export;
pub mod logging;
pub mod progress;
pub mod summary;

// Re-export commonly used types
pub use config::{ConfigInputs, ConnectionParts, ConnectionTarget, Environment, Settings};
pub use error::{PgPorterError, Result};
pub use export::{ExportHandle, ExportResult, copy_statement, spawn_export};
pub use logging::init_logging;
pub use summary::ExportSummary;
