//! Environment lookup layered over an optional settings file.
//!
//! Values from the process environment shadow entries read from the settings
//! file. The process environment itself is never modified.

use crate::{PgPorterError, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Database host variable
pub const DB_HOST: &str = "DB_HOST";
/// Database user variable
pub const DB_USER: &str = "DB_USER";
/// Database password variable
pub const DB_PASS: &str = "DB_PASS";
/// Database port variable
pub const DB_PORT: &str = "DB_PORT";
/// Database name variable
pub const DB_NAME: &str = "DB_NAME";
/// SSL mode variable
pub const DB_SSLMODE: &str = "DB_SSLMODE";

/// Every variable the resolver consults.
pub const ENV_KEYS: [&str; 6] = [DB_HOST, DB_USER, DB_PASS, DB_PORT, DB_NAME, DB_SSLMODE];

/// Snapshot of the variables the resolver reads.
#[derive(Clone, Default)]
pub struct Environment {
    process: HashMap<String, String>,
    file: HashMap<String, String>,
}

// Values may hold DB_PASS, so only the names are shown.
impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("process", &self.process.keys().collect::<Vec<_>>())
            .field("file", &self.file.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Environment {
    /// Captures the process environment and, if it exists, the settings file.
    ///
    /// A missing settings file is not an error. A file that cannot be parsed is.
    ///
    /// # Errors
    /// Returns a configuration error if the settings file is malformed or unreadable
    pub fn load(settings_file: &Path) -> Result<Self> {
        let process = ENV_KEYS
            .iter()
            .filter_map(|key| {
                std::env::var_os(key).map(|v| ((*key).to_string(), v.to_string_lossy().into_owned()))
            })
            .collect();

        let file = read_settings_file(settings_file)?;

        Ok(Self { process, file })
    }

    /// Builds an environment from explicit process-level pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            process: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            file: HashMap::new(),
        }
    }

    /// Adds settings-file entries underneath the process values.
    #[must_use]
    pub fn with_file_entries<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.file
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns the value for `key` if it is set and non-empty.
    ///
    /// A variable present in the process environment shadows the settings
    /// file even when it is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.process
            .get(key)
            .or_else(|| self.file.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

fn read_settings_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            debug!("No settings file at {}", path.display());
            return Ok(HashMap::new());
        }
        Err(e) => {
            return Err(PgPorterError::configuration(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            )));
        }
    };

    let mut entries = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            PgPorterError::configuration(format!(
                "Invalid settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        entries.insert(key, value);
    }

    debug!(
        "Loaded {} entries from settings file {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}
