//! The session actor: owns all state, handles one event at a time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::delegate::{FinishedTransfer, TransferDelegate};
use super::state::{Outcome, SessionState, SessionSummary};
use super::{SessionBuilder, SessionEvent};
use crate::cipher::IgeCipher;
use crate::config::HttpConfig;
use crate::decode::{DecodeError, DecodePacer, DecodeRequest, DecodedImage, Decoder, SizeFilter};
use crate::error::FailureReason;
use crate::location::{CachePolicy, Location, NodeId, RemoteFile};
use crate::reassembly::ReassemblyBuffer;
use crate::scheduler::ChunkScheduler;
use crate::storage::{self, CacheLayout, OpenedStorage};
use crate::transport::RequestTransport;

pub(super) struct SessionActor {
    pub(super) location: Option<Location>,
    pub(super) layout: Option<CacheLayout>,
    pub(super) policy: CachePolicy,
    ignore_cache: Option<bool>,
    pub(super) remote: Option<Arc<RemoteFile>>,
    pub(super) object_key: Arc<str>,

    pub(super) state: SessionState,
    /// Node requests are routed to; starts at the descriptor's node.
    pub(super) node: Option<NodeId>,
    pub(super) migrations: u32,
    filter: Option<SizeFilter>,
    pub(super) total_size: u64,

    delegate: Option<Arc<dyn TransferDelegate>>,
    decoder: Option<Arc<dyn Decoder>>,
    pacer: Option<Arc<DecodePacer>>,
    pub(super) transport: Option<Arc<dyn RequestTransport>>,
    pub(super) http: HttpConfig,
    pub(super) runtime: Handle,

    /// Strong sender held while started so in-flight work can always post back.
    pub(super) live_tx: Option<UnboundedSender<SessionEvent>>,

    pub(super) scheduler: ChunkScheduler,
    pub(super) deferred: ReassemblyBuffer,
    pub(super) storage: Option<OpenedStorage>,
    pub(super) cipher: Option<IgeCipher>,
    pub(super) committed: u64,
    last_progress: f32,
    pub(super) http_abort: Option<Arc<AtomicBool>>,
    outcome: Option<Outcome>,
}

impl SessionActor {
    pub(super) fn new(
        builder: SessionBuilder,
        runtime: Handle,
    ) -> Self {
        let layout = builder
            .location
            .as_ref()
            .map(|loc| CacheLayout::resolve(loc, &builder.cache_dir));
        let policy = builder
            .location
            .as_ref()
            .map(Location::cache_policy)
            .unwrap_or_default();
        let remote = builder
            .location
            .as_ref()
            .and_then(Location::remote)
            .map(|file| Arc::new(file.clone()));
        let object_key: Arc<str> = builder
            .location
            .as_ref()
            .map(Location::object_key)
            .unwrap_or_default()
            .into();
        let total_size = builder.total_size;

        Self {
            node: remote.as_ref().map(|r| r.node),
            location: builder.location,
            layout,
            policy,
            ignore_cache: builder.ignore_cache,
            remote,
            object_key,
            state: SessionState::Idle,
            migrations: 0,
            filter: builder.filter,
            total_size,
            delegate: builder.delegate,
            decoder: builder.decoder,
            pacer: builder.pacer,
            transport: builder.transport,
            http: builder.http,
            runtime,
            live_tx: None,
            scheduler: ChunkScheduler::new(total_size, 0),
            deferred: ReassemblyBuffer::new(),
            storage: None,
            cipher: None,
            committed: 0,
            last_progress: 0.0,
            http_abort: None,
            outcome: None,
        }
    }

    pub(super) async fn run(mut self, mut rx: UnboundedReceiver<SessionEvent>) -> SessionSummary {
        while self.outcome.is_none() {
            let Some(event) = rx.recv().await else {
                tracing::debug!(state = ?self.state, "session channel closed");
                break;
            };
            self.handle(event);
        }
        self.live_tx = None;
        self.summary()
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Start(tx) => self.start(tx),
            SessionEvent::Cancel => self.cancel(),
            SessionEvent::ChunkDone { id, offset, result } => self.on_chunk_done(id, offset, result),
            SessionEvent::HttpLength(len) => self.on_http_length(len),
            SessionEvent::HttpBlock(block) => self.on_http_block(block),
            SessionEvent::HttpEnd(result) => self.on_http_end(result),
            SessionEvent::Decoded { path, result } => self.on_decoded(path, result),
        }
    }

    pub(super) fn summary(&self) -> SessionSummary {
        SessionSummary {
            state: self.state,
            committed: self.committed,
            total_size: self.total_size,
            node: self.node.map(|n| n.0),
            migrations: self.migrations,
            outcome: self.outcome.clone(),
        }
    }

    fn start(&mut self, tx: UnboundedSender<SessionEvent>) {
        if self.state != SessionState::Idle {
            tracing::debug!(state = ?self.state, "start ignored");
            return;
        }
        self.state = SessionState::Started;
        self.live_tx = Some(tx);

        let Some(layout) = self.layout.clone() else {
            tracing::debug!("session has no location");
            return self.fail(FailureReason::Unavailable);
        };
        let ignore_cache = self.ignore_cache.unwrap_or(self.policy.ignore_cache);
        let mut cached = layout.final_path.exists();
        if cached && ignore_cache && !self.policy.caller_owned {
            tracing::debug!(path = %layout.final_path.display(), "dropping stale cached file");
            if let Err(e) = storage::remove_if_exists(&layout.final_path) {
                return self.fail(FailureReason::local_io(&e));
            }
            cached = false;
        }
        if cached {
            tracing::debug!(key = %self.object_key, "cache hit");
            return self.complete(layout.final_path);
        }
        if self.policy.only_cache {
            tracing::debug!(key = %self.object_key, "cache-only object not cached");
            return self.fail(FailureReason::Unavailable);
        }

        let http_url = match &self.location {
            Some(Location::HttpUrl(url)) => Some(url.clone()),
            _ => None,
        };
        match http_url {
            Some(url) => self.start_http(url),
            None => self.start_chunks(),
        }
    }

    fn cancel(&mut self) {
        if self.state != SessionState::Started {
            tracing::debug!(state = ?self.state, "cancel ignored");
            return;
        }
        tracing::info!(key = %self.object_key, committed = self.committed, "transfer cancelled");
        self.state = SessionState::Cancelled;
        self.release();
        self.report_failed(FailureReason::Cancelled);
    }

    /// Terminal failure of a running transfer.
    pub(super) fn fail(&mut self, reason: FailureReason) {
        if self.state != SessionState::Started {
            return;
        }
        tracing::warn!(key = %self.object_key, committed = self.committed, %reason, "transfer failed");
        self.state = SessionState::Cancelled;
        self.release();
        self.report_failed(reason);
    }

    /// Successful end of a fetch: drop the checkpoint, move temp to final
    /// and hand the result on.
    pub(super) fn finish(&mut self) {
        if self.state != SessionState::Started {
            return;
        }
        if self.total_size > 0 && self.committed >= self.total_size {
            self.emit_progress(1.0);
        }
        self.release();
        let Some(layout) = self.layout.clone() else {
            return self.fail(FailureReason::Unavailable);
        };
        if let Some(iv_path) = &layout.iv_path {
            if let Err(e) = storage::remove_if_exists(iv_path) {
                tracing::warn!(error = %format!("{:#}", e), "could not remove iv file");
            }
        }
        let path = match &layout.temp_path {
            Some(temp) => match storage::finalize(temp, &layout.final_path) {
                Ok(()) => layout.final_path.clone(),
                Err(e) => {
                    tracing::warn!(error = %format!("{:#}", e), "rename failed, keeping temp file");
                    if temp.exists() {
                        temp.clone()
                    } else {
                        layout.final_path.clone()
                    }
                }
            },
            None => layout.final_path.clone(),
        };
        tracing::info!(
            key = %self.object_key,
            committed = self.committed,
            path = %path.display(),
            "transfer finished"
        );
        self.complete(path);
    }

    /// Release everything the running transfer holds. Safe to call twice.
    fn release(&mut self) {
        let tokens = self.scheduler.drain_tokens();
        if let Some(transport) = &self.transport {
            for token in tokens {
                transport.abort(token);
            }
        }
        let dropped = self.deferred.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "released deferred chunks");
        }
        self.storage = None;
        if let Some(flag) = self.http_abort.take() {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Bytes are in place at `path`; decode them or report straight away.
    /// The session stays started until the decode result is in, so a cancel
    /// can still end it.
    fn complete(&mut self, path: PathBuf) {
        let decoder = if self.policy.needs_decode {
            self.decoder.clone()
        } else {
            None
        };
        match decoder {
            Some(decoder) => self.spawn_decode(decoder, path),
            None => self.report_finished(path, None),
        }
    }

    fn spawn_decode(&mut self, decoder: Arc<dyn Decoder>, path: PathBuf) {
        let Some(tx) = self.live_tx.clone() else {
            return self.report_finished(path, None);
        };
        let request = DecodeRequest {
            path: path.clone(),
            filter: self.filter.clone(),
            media_id: self.location.as_ref().and_then(Location::media_id),
        };
        let pacer = self.pacer.clone();
        tracing::debug!(path = %path.display(), "handing off to decoder");
        self.runtime.spawn(async move {
            if request.media_id.is_none() {
                if let Some(pacer) = pacer {
                    pacer.pace().await;
                }
            }
            let result = match tokio::task::spawn_blocking(move || decoder.decode(&request)).await {
                Ok(result) => result,
                Err(e) => Err(DecodeError::Other(format!("decoder task failed: {}", e))),
            };
            let _ = tx.send(SessionEvent::Decoded { path, result });
        });
    }

    fn on_decoded(&mut self, path: PathBuf, result: Result<DecodedImage, DecodeError>) {
        if self.state != SessionState::Started || self.outcome.is_some() {
            tracing::debug!(state = ?self.state, "decode result dropped");
            return;
        }
        match result {
            Ok(image) => self.report_finished(path, Some(image)),
            Err(e) => {
                if !self.policy.caller_owned {
                    let empty = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(false);
                    if empty || self.filter.is_none() {
                        if let Err(err) = storage::remove_if_exists(&path) {
                            tracing::warn!(error = %format!("{:#}", err), "could not remove undecodable file");
                        }
                    }
                }
                self.report_failed(FailureReason::Decode(e.to_string()));
            }
        }
    }

    pub(super) fn emit_progress(&mut self, fraction: f32) {
        if fraction <= self.last_progress {
            return;
        }
        self.last_progress = fraction;
        if let Some(delegate) = &self.delegate {
            delegate.on_progress(fraction);
        }
    }

    /// Progress from committed bytes, when the total is known.
    pub(super) fn report_progress(&mut self) {
        if self.total_size == 0 {
            return;
        }
        let fraction = (self.committed as f64 / self.total_size as f64).min(1.0) as f32;
        self.emit_progress(fraction);
    }

    fn report_finished(&mut self, path: PathBuf, image: Option<DecodedImage>) {
        self.state = SessionState::Finished;
        self.outcome = Some(Outcome::Finished {
            path: path.clone(),
            decoded: image.is_some(),
        });
        self.live_tx = None;
        if let Some(delegate) = &self.delegate {
            delegate.on_finished(&FinishedTransfer { path, image });
        }
    }

    fn report_failed(&mut self, reason: FailureReason) {
        self.state = SessionState::Cancelled;
        self.outcome = Some(Outcome::Failed {
            reason: reason.clone(),
        });
        self.live_tx = None;
        if let Some(delegate) = &self.delegate {
            delegate.on_failed(&reason);
        }
    }
}
