//! Console delegate and the JSON summary printed after a session.

use anyhow::{bail, Result};
use fload_core::{FailureReason, FinishedTransfer, Outcome, SessionSummary, TransferDelegate};

/// Logs session callbacks; progress goes to stderr.
pub(crate) struct ConsoleDelegate;

impl TransferDelegate for ConsoleDelegate {
    fn on_finished(&self, transfer: &FinishedTransfer) {
        eprintln!();
        tracing::info!(path = %transfer.path.display(), "finished");
    }

    fn on_failed(&self, reason: &FailureReason) {
        eprintln!();
        tracing::warn!(%reason, "failed");
    }

    fn on_progress(&self, fraction: f32) {
        eprint!("\r{:>5.1}%", fraction * 100.0);
    }
}

/// Print the summary as JSON; a failed outcome becomes an error.
pub(crate) fn print_summary(summary: &SessionSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    match &summary.outcome {
        Some(Outcome::Finished { .. }) => Ok(()),
        Some(Outcome::Failed { reason }) => bail!("transfer failed: {}", reason),
        None => bail!("session ended without an outcome"),
    }
}
