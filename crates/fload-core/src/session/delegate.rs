use std::path::PathBuf;

use crate::decode::DecodedImage;
use crate::error::FailureReason;

/// A finished transfer as handed to `TransferDelegate::on_finished`.
#[derive(Debug, Clone)]
pub struct FinishedTransfer {
    /// Where the bytes are: normally the final path, the temp path when the
    /// rename failed.
    pub path: PathBuf,
    /// Present when the location needed decoding and a decoder was configured.
    pub image: Option<DecodedImage>,
}

/// Caller-side observer of one session. Exactly one of `on_finished` or
/// `on_failed` is called, after every `on_progress`.
pub trait TransferDelegate: Send + Sync + 'static {
    fn on_finished(&self, transfer: &FinishedTransfer);

    fn on_failed(&self, reason: &FailureReason);

    /// Fraction in `0.0..=1.0`, non-decreasing. Only called when the total
    /// size is known.
    fn on_progress(&self, _fraction: f32) {}
}
