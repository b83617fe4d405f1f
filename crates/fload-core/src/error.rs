//! Terminal failure reasons reported through the delegate.
//!
//! Every failed session reports exactly one `FailureReason`. Migration is not
//! here: it is handled inside the session and never surfaces to the caller.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// No location at all, or a cache-only object that is not cached.
    #[error("object not available")]
    Unavailable,
    /// RPC or HTTP failure that is not a recognized signal. Not retried.
    #[error("transport error: {0}")]
    Transport(String),
    /// Local and remote progress disagree; the partial file is untrustworthy.
    #[error("protocol divergence at committed offset {committed}")]
    ProtocolDivergence { committed: u64 },
    /// Temp/IV/final file could not be opened, written or read.
    #[error("local I/O failure: {0}")]
    LocalIo(String),
    /// Payload could not be decrypted (bad length).
    #[error("cipher failure: {0}")]
    Cipher(String),
    /// Bytes were transferred but the decode collaborator produced nothing.
    #[error("decode failure: {0}")]
    Decode(String),
    /// The session was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,
}

impl FailureReason {
    /// Map an internal storage error chain to a local I/O failure.
    pub(crate) fn local_io(e: &anyhow::Error) -> Self {
        FailureReason::LocalIo(format!("{:#}", e))
    }
}
