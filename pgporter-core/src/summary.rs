//! Completion summary printed after a successful export.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// What was exported, where, how many rows and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub query: String,
    pub output: PathBuf,
    /// Data rows in the output file.
    ///
    /// The driver drops the server's `COPY n` completion tag, so this is
    /// counted from the CSV stream as it is written (records outside quoted
    /// fields, minus the header) rather than read from the command result.
    pub rows: u64,
    pub elapsed: Duration,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sql\t: {}", self.query)?;
        writeln!(f, "output\t: {}", self.output.display())?;
        writeln!(f, "rows\t: {}", self.rows)?;
        write!(f, "elapsed\t: {:.2} seconds", self.elapsed.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_format() {
        let summary = ExportSummary {
            query: "SELECT 1".to_string(),
            output: PathBuf::from("test.csv"),
            rows: 1,
            elapsed: Duration::from_millis(1234),
        };

        assert_eq!(
            summary.to_string(),
            "sql\t: SELECT 1\noutput\t: test.csv\nrows\t: 1\nelapsed\t: 1.23 seconds"
        );
    }

    #[test]
    fn test_elapsed_rounds_to_two_decimals() {
        let summary = ExportSummary {
            query: "SELECT 1".to_string(),
            output: PathBuf::from("out.csv"),
            rows: 0,
            elapsed: Duration::from_micros(5_678),
        };
        assert!(summary.to_string().ends_with("elapsed\t: 0.01 seconds"));
    }
}
