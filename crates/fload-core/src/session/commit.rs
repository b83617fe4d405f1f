//! Chunked fetch: scheduling, completion handling and the ordered write path.

use std::sync::Arc;

use super::actor::SessionActor;
use super::state::SessionState;
use crate::cipher::IgeCipher;
use crate::error::FailureReason;
use crate::scheduler::{ChunkScheduler, RequestId, CHUNK_SIZE};
use crate::storage::open_for_transfer;
use crate::transport::{Completion, RangeRequest, TransportError, TransportResult};

impl SessionActor {
    /// Open (or resume) storage and issue the first window.
    pub(super) fn start_chunks(&mut self) {
        if self.transport.is_none() || self.remote.is_none() {
            tracing::warn!(key = %self.object_key, "no request transport for remote object");
            return self.fail(FailureReason::Unavailable);
        }
        let Some(layout) = self.layout.clone() else {
            return self.fail(FailureReason::Unavailable);
        };
        let material = self.location.as_ref().and_then(|l| l.cipher()).cloned();

        let opened = match open_for_transfer(&layout, CHUNK_SIZE, material.as_ref()) {
            Ok(opened) => opened,
            Err(e) => return self.fail(FailureReason::local_io(&e)),
        };
        self.committed = opened.committed();
        self.cipher = material.map(|m| {
            let mut cipher = IgeCipher::from_material(&m);
            if let Some(iv) = opened.resume_iv {
                cipher.set_iv(iv);
            }
            cipher
        });
        self.storage = Some(opened);
        self.scheduler = ChunkScheduler::new(self.total_size, self.committed);

        tracing::debug!(
            key = %self.object_key,
            node = ?self.node,
            committed = self.committed,
            total = self.total_size,
            encrypted = self.cipher.is_some(),
            "starting chunked transfer"
        );

        if self.total_size > 0 && self.committed >= self.total_size {
            if self.committed == self.total_size {
                return self.finish();
            }
            return self.fail(FailureReason::ProtocolDivergence {
                committed: self.committed,
            });
        }
        self.schedule();
    }

    /// Fill the window.
    pub(super) fn schedule(&mut self) {
        if self.state != SessionState::Started {
            return;
        }
        let (Some(transport), Some(remote), Some(tx)) =
            (self.transport.clone(), self.remote.clone(), self.live_tx.clone())
        else {
            return;
        };
        let node = self.node.unwrap_or(remote.node);
        let encrypted = self.cipher.is_some();

        for planned in self.scheduler.plan(&self.deferred) {
            let request = RangeRequest {
                file: Arc::clone(&remote),
                encrypted,
                object_key: Arc::clone(&self.object_key),
                offset: planned.offset,
                limit: planned.limit,
                node,
                is_last: planned.is_last,
            };
            tracing::trace!(offset = planned.offset, %node, is_last = planned.is_last, "submit");
            let completion = Completion::new(tx.clone(), planned.id, planned.offset);
            let token = transport.submit(request, completion);
            self.scheduler.set_token(planned.offset, planned.id, token);
        }
        tracing::trace!(outstanding = self.scheduler.outstanding(), held = self.deferred.len(), "window filled");
    }

    pub(super) fn on_chunk_done(&mut self, id: RequestId, offset: u64, result: TransportResult) {
        if self.state != SessionState::Started {
            tracing::trace!(offset, "late completion dropped");
            return;
        }
        if !self.scheduler.resolve(offset, id) {
            tracing::debug!(offset, "completion for unknown request dropped");
            return;
        }
        match result {
            Ok(payload) => self.on_payload(offset, payload),
            Err(TransportError::Migrate(node)) => {
                tracing::info!(
                    key = %self.object_key,
                    from = ?self.node,
                    to = %node,
                    committed = self.committed,
                    "object migrated, retargeting session"
                );
                tracing::debug!(in_flight = ?self.scheduler.in_flight_offsets(), "requests kept across migration");
                self.node = Some(node);
                self.migrations += 1;
                self.scheduler.rewind(self.committed);
                self.schedule();
            }
            Err(TransportError::InvalidOffset) => {
                // A short commit ends the transfer before more completions are
                // handled, so `committed` is normally on a boundary here.
                if self.committed % CHUNK_SIZE == 0 {
                    tracing::debug!(offset, committed = self.committed, "offset past end, finishing");
                    self.finish();
                } else {
                    self.fail(FailureReason::ProtocolDivergence {
                        committed: self.committed,
                    });
                }
            }
            Err(TransportError::Other(msg)) => self.fail(FailureReason::Transport(msg)),
        }
    }

    fn on_payload(&mut self, offset: u64, payload: Vec<u8>) {
        if offset < self.committed {
            tracing::debug!(offset, committed = self.committed, "stale chunk dropped");
            return self.schedule();
        }
        if offset > self.committed {
            tracing::trace!(offset, committed = self.committed, "holding out-of-order chunk");
            self.deferred.hold(offset, payload);
            return;
        }

        let mut next = Some(payload);
        while let Some(mut chunk) = next.take() {
            if chunk.is_empty() {
                tracing::debug!(committed = self.committed, "empty chunk, end of stream");
                return self.finish();
            }
            if chunk.len() as u64 > CHUNK_SIZE {
                tracing::warn!(len = chunk.len(), "chunk longer than requested");
                return self.fail(FailureReason::ProtocolDivergence {
                    committed: self.committed,
                });
            }
            if let Err(reason) = self.commit_chunk(&mut chunk) {
                return self.fail(reason);
            }
            self.report_progress();
            if self.committed % CHUNK_SIZE != 0 {
                break;
            }
            next = self.deferred.take(self.committed);
        }

        if self.total_size > 0 && self.committed >= self.total_size {
            self.finish();
        } else if self.committed % CHUNK_SIZE != 0 {
            // A short chunk ends the stream; with a known total it must be the tail.
            if self.total_size == 0 {
                self.finish();
            } else {
                self.fail(FailureReason::ProtocolDivergence {
                    committed: self.committed,
                });
            }
        } else {
            self.schedule();
        }
    }

    /// Decrypt, append and checkpoint one in-order chunk.
    fn commit_chunk(&mut self, chunk: &mut [u8]) -> Result<(), FailureReason> {
        let Some(storage) = self.storage.as_mut() else {
            return Err(FailureReason::LocalIo("temp file is not open".to_string()));
        };
        if let Some(cipher) = self.cipher.as_mut() {
            cipher
                .decrypt_in_place(chunk)
                .map_err(|e| FailureReason::Cipher(e.to_string()))?;
        }
        storage
            .temp
            .append(chunk)
            .map_err(|e| FailureReason::local_io(&e))?;
        self.committed += chunk.len() as u64;
        if let (Some(cipher), Some(iv_file)) = (self.cipher.as_ref(), storage.iv_file.as_mut()) {
            iv_file.store(cipher.iv()).map_err(|e| FailureReason::local_io(&e))?;
        }
        tracing::trace!(committed = self.committed, "chunk committed");
        Ok(())
    }
}
