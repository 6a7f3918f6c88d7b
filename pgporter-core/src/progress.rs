//! Spinner shown while the export runs.
//!
//! The foreground never blocks on the export: it checks the completion signal,
//! redraws the spinner line and sleeps briefly, until the signal fires.

use crate::export::ExportResult;
use crate::{PgPorterError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Glyphs cycled on the progress line
pub const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

/// Pause between completion checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Creates the single-line progress display.
///
/// Hidden when `quiet` is set. indicatif also hides it when stderr is not a
/// terminal.
pub fn create_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb
}

/// Polls `done` until the export reports, redrawing `display` in between.
///
/// The display is cleared before returning.
///
/// # Errors
/// Returns the export's own error, or `ExportInterrupted` if the task ended
/// without sending an outcome.
pub async fn watch(mut done: oneshot::Receiver<ExportResult>, display: &ProgressBar) -> Result<u64> {
    for glyph in SPINNER_FRAMES.iter().cycle() {
        match done.try_recv() {
            Ok(outcome) => {
                display.finish_and_clear();
                return outcome;
            }
            Err(TryRecvError::Closed) => {
                display.finish_and_clear();
                return Err(PgPorterError::ExportInterrupted);
            }
            Err(TryRecvError::Empty) => {
                display.set_message(format!("Processing... {} ", glyph));
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
    // cycle() over a non-empty array never ends
    Err(PgPorterError::ExportInterrupted)
}
