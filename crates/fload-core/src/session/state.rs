use serde::Serialize;

use crate::error::FailureReason;

/// Lifecycle of a session. `Cancelled` also covers sessions that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Started,
    Cancelled,
    Finished,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Cancelled | SessionState::Finished)
    }
}

/// Terminal outcome as reported to the delegate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Finished { path: std::path::PathBuf, decoded: bool },
    Failed { reason: FailureReason },
}

/// What a session did, returned from `SessionHandle::join`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub state: SessionState,
    pub committed: u64,
    pub total_size: u64,
    /// Node the session ended on, for remote objects.
    pub node: Option<i32>,
    pub migrations: u32,
    pub outcome: Option<Outcome>,
}
