//! The request transport seam.
//!
//! The engine never talks to the network itself for range fetches. It hands
//! a `RangeRequest` plus a one-shot `Completion` to a `RequestTransport`,
//! which may finish the request on any thread; the completion posts the
//! outcome back onto the owning session's channel.

mod abort;
mod classify;
mod http_range;

pub use abort::AbortRegistry;
pub use classify::{classify_rpc_error, FILE_MIGRATE_PREFIX, OFFSET_INVALID};
pub use http_range::{HttpRangeTransport, MIGRATE_HEADER};
pub(crate) use http_range::{header_value, status_code};

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::location::{NodeId, RemoteFile};
use crate::scheduler::RequestId;
use crate::session::SessionEvent;

/// Opaque handle a transport returns for a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(pub u64);

/// One range fetch.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub file: Arc<RemoteFile>,
    pub encrypted: bool,
    pub object_key: Arc<str>,
    pub offset: u64,
    pub limit: u32,
    /// Node to route to; differs from `file.node` after a migration.
    pub node: NodeId,
    /// Hint that no further request follows soon (lets the transport flush).
    pub is_last: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The object now lives on another node.
    #[error("object migrated to node {0}")]
    Migrate(NodeId),
    /// The requested offset is past what the server has.
    #[error("offset invalid")]
    InvalidOffset,
    #[error("{0}")]
    Other(String),
}

pub type TransportResult = Result<Vec<u8>, TransportError>;

pub trait RequestTransport: Send + Sync + 'static {
    /// Start a request. The transport must eventually call
    /// `completion.complete(..)` exactly once unless the request is aborted.
    fn submit(&self, request: RangeRequest, completion: Completion) -> RequestToken;

    /// Best-effort abort. A completion may still arrive afterwards.
    fn abort(&self, token: RequestToken);
}

/// One-shot route from a transport back into the session that issued the
/// request.
#[derive(Debug)]
pub struct Completion {
    tx: mpsc::UnboundedSender<SessionEvent>,
    id: RequestId,
    offset: u64,
}

impl Completion {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>, id: RequestId, offset: u64) -> Self {
        Self { tx, id, offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Deliver the outcome. If the session has already ended this is a no-op.
    pub fn complete(self, result: TransportResult) {
        let _ = self.tx.send(SessionEvent::ChunkDone {
            id: self.id,
            offset: self.offset,
            result,
        });
    }
}
