//! COPY-based export of a query result to a CSV file.
//!
//! The server formats and streams the rows; chunks are written to the file as
//! they arrive. The export runs on a background task that reports its outcome
//! once through a oneshot channel.

use crate::{PgPorterError, Result};
use futures::{Stream, StreamExt};
use sqlx::Connection;
use sqlx::postgres::PgConnection;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Outcome delivered by the export task: rows written, or the failure
pub type ExportResult = Result<u64>;

/// Wraps `query` in the COPY statement used for every export.
///
/// The query is embedded as-is; it is neither escaped nor validated.
///
/// # Example
/// ```rust
/// use pgporter_core::export::copy_statement;
///
/// assert_eq!(
///     copy_statement("SELECT 1"),
///     "COPY (SELECT 1) TO STDOUT WITH (FORMAT csv, HEADER, DELIMITER ',')"
/// );
/// ```
pub fn copy_statement(query: &str) -> String {
    format!("COPY ({}) TO STDOUT WITH (FORMAT csv, HEADER, DELIMITER ',')", query)
}

/// Counts CSV records in a byte stream split at arbitrary points.
///
/// A record ends at a newline outside a quoted field. Doubled quotes inside a
/// quoted field toggle the state twice and cancel out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordCounter {
    records: u64,
    in_quotes: bool,
}

impl RecordCounter {
    /// Feeds the next chunk of output.
    pub fn observe(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            match byte {
                b'"' => self.in_quotes = !self.in_quotes,
                b'\n' if !self.in_quotes => self.records = self.records.saturating_add(1),
                _ => {}
            }
        }
    }

    /// Complete records seen so far, header included
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Data rows seen so far, i.e. records minus the header
    pub const fn rows(&self) -> u64 {
        self.records.saturating_sub(1)
    }
}

/// Writes every chunk of `stream` to `sink` and returns the data row count.
///
/// Stops at the first stream or write error. The sink is not flushed.
///
/// # Errors
/// Returns `Export` for a stream error and `Io` for a write error
pub async fn pump<S, B, W>(mut stream: S, sink: &mut W) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, sqlx::Error>> + Unpin,
    B: AsRef<[u8]>,
    W: AsyncWrite + Unpin,
{
    let mut counter = RecordCounter::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PgPorterError::export_failed("COPY stream failed", e))?;
        let bytes = chunk.as_ref();
        counter.observe(bytes);
        sink.write_all(bytes)
            .await
            .map_err(|e| PgPorterError::io("Failed to write export data", e))?;
    }
    Ok(counter.rows())
}

/// Runs the COPY for `query` on `conn` and streams it into a new file at `output`.
///
/// The file is created (or truncated) first, and flushed and closed before
/// this returns, whatever the outcome of the copy.
///
/// # Errors
/// Returns `Io` if the file cannot be created, written or flushed, and
/// `Export` if the server rejects or aborts the COPY.
pub async fn export_to_file(conn: &mut PgConnection, query: &str, output: &Path) -> Result<u64> {
    let mut writer = create_output(output).await?;

    let statement = copy_statement(query);
    debug!("Running {}", statement);
    let copied = match conn.copy_out_raw(&statement).await {
        Ok(stream) => pump(stream, &mut writer).await,
        Err(e) => Err(PgPorterError::export_failed("Server rejected COPY", e)),
    };

    close_output(writer, output, copied).await
}

async fn create_output(output: &Path) -> Result<BufWriter<File>> {
    let file = File::create(output).await.map_err(|e| {
        PgPorterError::io(format!("Failed to create {}", output.display()), e)
    })?;
    Ok(BufWriter::new(file))
}

/// Shuts `writer` down, then reports the copy outcome ahead of any flush error.
async fn close_output(mut writer: BufWriter<File>, output: &Path, copied: Result<u64>) -> Result<u64> {
    let closed = writer.shutdown().await.map_err(|e| {
        PgPorterError::io(format!("Failed to flush {}", output.display()), e)
    });

    let rows = copied?;
    closed?;
    Ok(rows)
}

/// Handle on an export running in the background.
#[derive(Debug)]
pub struct ExportHandle {
    /// Fires once with the export outcome
    pub done: oneshot::Receiver<ExportResult>,
    /// When the export was started
    pub started: Instant,
}

/// Moves `conn` onto a background task that exports `query` into `output`.
///
/// The connection is closed once the export finishes. The outcome is sent on
/// the returned handle after the output file has been closed.
pub fn spawn_export(mut conn: PgConnection, query: String, output: PathBuf) -> ExportHandle {
    let (tx, done) = oneshot::channel();
    let started = Instant::now();

    tokio::spawn(async move {
        let outcome = export_to_file(&mut conn, &query, &output).await;
        match &outcome {
            Ok(rows) => info!("Exported {} rows to {}", rows, output.display()),
            Err(e) => debug!("Export failed: {}", e),
        }

        if let Err(e) = conn.close().await {
            warn!("Failed to close database connection cleanly: {}", e);
        }

        // The receiver only disappears if the process is already exiting
        let _ = tx.send(outcome);
    });

    ExportHandle { done, started }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::stream;

    fn counted(chunks: &[&[u8]]) -> RecordCounter {
        let mut counter = RecordCounter::default();
        for chunk in chunks {
            counter.observe(chunk);
        }
        counter
    }

    #[test]
    fn test_copy_statement_embeds_query_verbatim() {
        let statement = copy_statement("SELECT a, b FROM t WHERE c = 'x'");
        assert_eq!(
            statement,
            "COPY (SELECT a, b FROM t WHERE c = 'x') TO STDOUT WITH (FORMAT csv, HEADER, DELIMITER ',')"
        );
    }

    #[test]
    fn test_counter_header_only() {
        let counter = counted(&[b"?column?\n"]);
        assert_eq!(counter.records(), 1);
        assert_eq!(counter.rows(), 0);
    }

    #[test]
    fn test_counter_empty_stream() {
        assert_eq!(counted(&[]).rows(), 0);
    }

    #[test]
    fn test_counter_quoted_newlines_and_quotes() {
        let csv = b"id,note\n1,\"line one\nline two\"\n2,\"she said \"\"hi\"\"\n\"\n3,plain\n";
        let counter = counted(&[csv]);
        assert_eq!(counter.rows(), 3);
    }

    #[test]
    fn test_counter_chunk_boundaries() {
        let csv: &[u8] = b"id,note\n1,\"a\nb\"\n2,\"\"\"\"\n";
        let whole = counted(&[csv]);

        for split in 0..=csv.len() {
            let (left, right) = csv.split_at(split);
            assert_eq!(counted(&[left, right]), whole, "split at {}", split);
        }
        assert_eq!(whole.rows(), 2);
    }

    #[tokio::test]
    async fn test_pump_writes_everything_and_counts() {
        let chunks: Vec<std::result::Result<Vec<u8>, sqlx::Error>> = vec![
            Ok(b"?column?\n".to_vec()),
            Ok(b"1\n2".to_vec()),
            Ok(b"\n".to_vec()),
        ];
        let mut sink: Vec<u8> = Vec::new();

        let rows = pump(stream::iter(chunks), &mut sink).await.unwrap();

        assert_eq!(rows, 2);
        assert_eq!(sink, b"?column?\n1\n2\n");
    }

    #[tokio::test]
    async fn test_pump_stops_at_stream_error() {
        let chunks: Vec<std::result::Result<Vec<u8>, sqlx::Error>> = vec![
            Ok(b"h\n1\n".to_vec()),
            Err(sqlx::Error::Protocol("connection reset mid-copy".to_string())),
            Ok(b"2\n".to_vec()),
        ];
        let mut sink: Vec<u8> = Vec::new();

        let err = pump(stream::iter(chunks), &mut sink).await.unwrap_err();

        assert!(matches!(err, PgPorterError::Export { .. }));
        assert_eq!(sink, b"h\n1\n");
    }

    #[tokio::test]
    async fn test_create_output_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("out.csv");

        let err = create_output(&path).await.unwrap_err();

        assert!(matches!(err, PgPorterError::Io { .. }));
        assert!(err.to_string().contains("no-such-dir"));
    }

    #[tokio::test]
    async fn test_partial_output_is_closed_after_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        let mut writer = create_output(&path).await.unwrap();

        let chunks: Vec<std::result::Result<Vec<u8>, sqlx::Error>> = vec![
            Ok(b"h\n1\n".to_vec()),
            Err(sqlx::Error::Protocol("boom".to_string())),
        ];
        let copied = pump(stream::iter(chunks), &mut writer).await;
        let err = close_output(writer, &path, copied).await.unwrap_err();

        assert!(matches!(err, PgPorterError::Export { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"h\n1\n");
    }

    #[tokio::test]
    async fn test_close_output_returns_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("done.csv");
        let mut writer = create_output(&path).await.unwrap();

        let chunks: Vec<std::result::Result<Vec<u8>, sqlx::Error>> =
            vec![Ok(b"?column?\n1\n".to_vec())];
        let copied = pump(stream::iter(chunks), &mut writer).await;

        assert_eq!(close_output(writer, &path, copied).await.unwrap(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), b"?column?\n1\n");
    }
}
