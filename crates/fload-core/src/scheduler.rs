//! Windowed chunk scheduler.
//!
//! Tracks which offsets are in flight and decides what to request next. It
//! does no I/O: the session turns each `PlannedRequest` into a transport
//! submission and reports the resulting token back with `set_token`.

use std::collections::BTreeMap;

use crate::reassembly::ReassemblyBuffer;
use crate::transport::RequestToken;

pub const CHUNK_SIZE: u64 = 32 * 1024;
pub const WINDOW: usize = 3;

/// Session-local identity of one issued request. A completion is only
/// accepted when its id matches the pending entry for its offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedRequest {
    pub id: RequestId,
    pub offset: u64,
    pub limit: u32,
    pub is_last: bool,
}

#[derive(Debug)]
struct PendingRequest {
    id: RequestId,
    token: Option<RequestToken>,
}

#[derive(Debug)]
pub struct ChunkScheduler {
    chunk_size: u64,
    window: usize,
    /// 0 means unknown.
    total_size: u64,
    next_offset: u64,
    next_id: u64,
    in_flight: BTreeMap<u64, PendingRequest>,
}

impl ChunkScheduler {
    pub fn new(total_size: u64, start_offset: u64) -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            window: WINDOW,
            total_size,
            next_offset: start_offset,
            next_id: 0,
            in_flight: BTreeMap::new(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.in_flight.len()
    }

    /// Offsets currently in flight, ascending.
    pub fn in_flight_offsets(&self) -> Vec<u64> {
        self.in_flight.keys().copied().collect()
    }

    /// Reserve the next batch of requests. With a known total the batch fills
    /// the window (in-flight plus deferred); with an unknown total at most one
    /// request is issued per call.
    pub fn plan(&mut self, deferred: &ReassemblyBuffer) -> Vec<PlannedRequest> {
        let free = self
            .window
            .saturating_sub(self.in_flight.len() + deferred.len());
        let count = if self.total_size > 0 { free } else { free.min(1) };

        let mut planned = Vec::with_capacity(count);
        for slot in 0..count {
            while self.in_flight.contains_key(&self.next_offset) || deferred.contains(self.next_offset) {
                self.next_offset += self.chunk_size;
            }
            if self.total_size > 0 && self.next_offset >= self.total_size {
                break;
            }
            let offset = self.next_offset;
            self.next_offset += self.chunk_size;

            let id = RequestId(self.next_id);
            self.next_id += 1;
            self.in_flight.insert(offset, PendingRequest { id, token: None });

            let is_last = self.total_size == 0
                || slot == count - 1
                || offset + self.chunk_size >= self.total_size;
            planned.push(PlannedRequest {
                id,
                offset,
                limit: self.chunk_size as u32,
                is_last,
            });
        }
        planned
    }

    pub fn set_token(&mut self, offset: u64, id: RequestId, token: RequestToken) {
        if let Some(pending) = self.in_flight.get_mut(&offset) {
            if pending.id == id {
                pending.token = Some(token);
            }
        }
    }

    /// Remove the pending entry for a completion. Returns false when the
    /// completion does not belong to the current request at that offset.
    pub fn resolve(&mut self, offset: u64, id: RequestId) -> bool {
        match self.in_flight.get(&offset) {
            Some(pending) if pending.id == id => {
                self.in_flight.remove(&offset);
                true
            }
            _ => false,
        }
    }

    /// Restart planning from `committed`. Offsets still in flight or held
    /// are skipped by the next `plan`.
    pub fn rewind(&mut self, committed: u64) {
        self.next_offset = committed;
    }

    /// Forget every in-flight request and return the tokens to abort.
    pub fn drain_tokens(&mut self) -> Vec<RequestToken> {
        std::mem::take(&mut self.in_flight)
            .into_values()
            .filter_map(|p| p.token)
            .collect()
    }
}
