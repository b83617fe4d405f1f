//! In-memory `RequestTransport` whose completions the test controls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fload_core::transport::{
    Completion, RangeRequest, RequestToken, RequestTransport, TransportError, TransportResult,
};
use fload_core::NodeId;

#[derive(Debug, Clone)]
pub struct Submitted {
    pub offset: u64,
    pub limit: u32,
    pub node: NodeId,
    pub is_last: bool,
    pub encrypted: bool,
    pub token: RequestToken,
}

/// What a serving transport answers for offsets at or past the end.
#[derive(Debug, Clone, Copy)]
pub enum PastEnd {
    Empty,
    InvalidOffset,
}

enum Mode {
    /// Requests stay pending until the test completes them.
    Manual,
    /// Requests are answered at once from the body.
    Serve { body: Arc<Vec<u8>>, past_end: PastEnd },
}

struct Inner {
    mode: Mode,
    next_token: u64,
    log: Vec<Submitted>,
    pending: Vec<(RequestToken, Completion)>,
    aborted: Vec<RequestToken>,
    faults: HashMap<u64, TransportError>,
    max_pending: usize,
}

pub struct ScriptedTransport {
    inner: Mutex<Inner>,
}

impl ScriptedTransport {
    fn with_mode(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                mode,
                next_token: 1,
                log: Vec::new(),
                pending: Vec::new(),
                aborted: Vec::new(),
                faults: HashMap::new(),
                max_pending: 0,
            }),
        })
    }

    pub fn manual() -> Arc<Self> {
        Self::with_mode(Mode::Manual)
    }

    pub fn serving(body: Vec<u8>) -> Arc<Self> {
        Self::serving_with(body, PastEnd::Empty)
    }

    pub fn serving_with(body: Vec<u8>, past_end: PastEnd) -> Arc<Self> {
        Self::with_mode(Mode::Serve {
            body: Arc::new(body),
            past_end,
        })
    }

    /// Answer the next request at `offset` with `err`, whatever the mode.
    pub fn fail_once(&self, offset: u64, err: TransportError) {
        self.inner.lock().unwrap().faults.insert(offset, err);
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.submitted().iter().map(|s| s.offset).collect()
    }

    pub fn pending_offsets(&self) -> Vec<u64> {
        let inner = self.inner.lock().unwrap();
        let mut offsets: Vec<u64> = inner.pending.iter().map(|(_, c)| c.offset()).collect();
        offsets.sort_unstable();
        offsets
    }

    pub fn aborted(&self) -> Vec<RequestToken> {
        self.inner.lock().unwrap().aborted.clone()
    }

    pub fn max_pending(&self) -> usize {
        self.inner.lock().unwrap().max_pending
    }

    /// Complete the pending request at `offset`. Returns false if none.
    pub fn complete(&self, offset: u64, result: TransportResult) -> bool {
        let completion = {
            let mut inner = self.inner.lock().unwrap();
            let Some(idx) = inner.pending.iter().position(|(_, c)| c.offset() == offset) else {
                return false;
            };
            inner.pending.remove(idx).1
        };
        completion.complete(result);
        true
    }

    /// Wait until a request at `offset` is pending.
    pub async fn wait_pending(&self, offset: u64) {
        self.wait_until(|| self.pending_offsets().contains(&offset)).await;
    }

    /// Wait until at least `n` requests were submitted in total.
    pub async fn wait_submitted(&self, n: usize) {
        self.wait_until(|| self.submitted().len() >= n).await;
    }

    async fn wait_until(&self, cond: impl Fn() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out; submitted {:?}, pending {:?}",
            self.offsets(),
            self.pending_offsets()
        );
    }
}

impl RequestTransport for ScriptedTransport {
    fn submit(&self, request: RangeRequest, completion: Completion) -> RequestToken {
        let mut inner = self.inner.lock().unwrap();
        let token = RequestToken(inner.next_token);
        inner.next_token += 1;
        inner.log.push(Submitted {
            offset: request.offset,
            limit: request.limit,
            node: request.node,
            is_last: request.is_last,
            encrypted: request.encrypted,
            token,
        });

        if let Some(err) = inner.faults.remove(&request.offset) {
            drop(inner);
            completion.complete(Err(err));
            return token;
        }
        let result = match &inner.mode {
            Mode::Manual => None,
            Mode::Serve { body, past_end } => {
                let start = request.offset as usize;
                if start >= body.len() {
                    Some(match past_end {
                        PastEnd::Empty => Ok(Vec::new()),
                        PastEnd::InvalidOffset => Err(TransportError::InvalidOffset),
                    })
                } else {
                    let end = (start + request.limit as usize).min(body.len());
                    Some(Ok(body[start..end].to_vec()))
                }
            }
        };
        match result {
            Some(result) => {
                drop(inner);
                completion.complete(result);
            }
            None => {
                inner.pending.push((token, completion));
                inner.max_pending = inner.max_pending.max(inner.pending.len());
            }
        }
        token
    }

    fn abort(&self, token: RequestToken) {
        let mut inner = self.inner.lock().unwrap();
        inner.aborted.push(token);
        inner.pending.retain(|(t, _)| *t != token);
    }
}
