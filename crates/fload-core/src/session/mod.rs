//! Transfer sessions.
//!
//! A session fetches exactly one object. All of its mutable state lives in a
//! single actor task; commands from the `SessionHandle`, transport
//! completions, HTTP blocks and decode results all arrive as `SessionEvent`s
//! on one unbounded channel and are handled strictly one at a time.

mod actor;
mod commit;
mod delegate;
mod http;
mod state;

pub use delegate::{FinishedTransfer, TransferDelegate};
pub use state::{Outcome, SessionState, SessionSummary};

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::config::HttpConfig;
use crate::decode::{DecodeError, DecodePacer, DecodedImage, Decoder, SizeFilter};
use crate::location::Location;
use crate::scheduler::RequestId;
use crate::transport::{RequestTransport, TransportResult};
use actor::SessionActor;

#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// Carries the sender the running transfer posts back on.
    Start(mpsc::UnboundedSender<SessionEvent>),
    Cancel,
    ChunkDone {
        id: RequestId,
        offset: u64,
        result: TransportResult,
    },
    HttpLength(u64),
    HttpBlock(Vec<u8>),
    HttpEnd(Result<(), String>),
    Decoded {
        path: PathBuf,
        result: Result<DecodedImage, DecodeError>,
    },
}

/// Configures and spawns a session.
pub struct SessionBuilder {
    location: Option<Location>,
    cache_dir: PathBuf,
    filter: Option<SizeFilter>,
    total_size: u64,
    ignore_cache: Option<bool>,
    delegate: Option<Arc<dyn TransferDelegate>>,
    decoder: Option<Arc<dyn Decoder>>,
    pacer: Option<Arc<DecodePacer>>,
    transport: Option<Arc<dyn RequestTransport>>,
    http: HttpConfig,
}

impl SessionBuilder {
    /// `None` builds a session that fails with `Unavailable` on start.
    pub fn new(location: Option<Location>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            location,
            cache_dir: cache_dir.into(),
            filter: None,
            total_size: 0,
            ignore_cache: None,
            delegate: None,
            decoder: None,
            pacer: None,
            transport: None,
            http: HttpConfig::default(),
        }
    }

    pub fn filter(mut self, filter: SizeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Expected size in bytes; 0 (the default) means unknown.
    pub fn total_size(mut self, total_size: u64) -> Self {
        self.total_size = total_size;
        self
    }

    /// Override the location's own cache policy.
    pub fn ignore_cache(mut self, ignore: bool) -> Self {
        self.ignore_cache = Some(ignore);
        self
    }

    pub fn delegate(mut self, delegate: Arc<dyn TransferDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn pacer(mut self, pacer: Arc<DecodePacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// Required for remote locations.
    pub fn transport(mut self, transport: Arc<dyn RequestTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Spawn the session actor on `runtime`. Nothing happens until `start`.
    pub fn spawn(self, runtime: &Handle) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = SessionActor::new(self, runtime.clone());
        let task = runtime.spawn(actor.run(rx));
        SessionHandle { tx, task }
    }
}

/// Caller's handle on a spawned session.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// Begin the transfer. No-op unless the session is idle.
    pub fn start(&self) {
        let _ = self.tx.send(SessionEvent::Start(self.tx.clone()));
    }

    /// Cancel a running transfer. Idempotent; no-op unless started.
    pub fn cancel(&self) {
        let _ = self.tx.send(SessionEvent::Cancel);
    }

    /// Wait for the session to end. A session that was never started ends
    /// as soon as the handle is given up here.
    pub async fn join(self) -> Result<SessionSummary, JoinError> {
        let SessionHandle { tx, task } = self;
        drop(tx);
        task.await
    }
}
