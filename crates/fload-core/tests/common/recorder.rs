//! Delegate and decoder doubles that record what the session did.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use fload_core::decode::{DecodeError, DecodeRequest, DecodedImage, Decoder};
use fload_core::{FailureReason, FinishedTransfer, TransferDelegate};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress(f32),
    Finished { path: PathBuf, decoded: bool },
    Failed(FailureReason),
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Terminal callbacks in order; a correct session produces exactly one,
    /// and it is the last event.
    pub fn terminals(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Progress(_)))
            .collect()
    }

    pub fn assert_single_terminal(&self) -> Event {
        let events = self.events();
        let terminals = self.terminals();
        assert_eq!(terminals.len(), 1, "events: {:?}", events);
        assert_eq!(events.last(), terminals.last(), "terminal must come last");
        terminals[0].clone()
    }
}

impl TransferDelegate for Recorder {
    fn on_finished(&self, transfer: &FinishedTransfer) {
        self.events.lock().unwrap().push(Event::Finished {
            path: transfer.path.clone(),
            decoded: transfer.image.is_some(),
        });
    }

    fn on_failed(&self, reason: &FailureReason) {
        self.events.lock().unwrap().push(Event::Failed(reason.clone()));
    }

    fn on_progress(&self, fraction: f32) {
        self.events.lock().unwrap().push(Event::Progress(fraction));
    }
}

/// Decoder that "decodes" by reporting the file length as the width.
pub struct StubDecoder {
    fail: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<DecodeRequest>>,
    /// When set, `decode` blocks until `release` is called.
    gate: Option<(Mutex<bool>, Condvar)>,
}

impl StubDecoder {
    fn build(fail: bool, gated: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: gated.then(|| (Mutex::new(false), Condvar::new())),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::build(false, false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(true, false)
    }

    pub fn gated() -> Arc<Self> {
        Self::build(false, true)
    }

    pub fn release(&self) {
        if let Some((open, cv)) = &self.gate {
            *open.lock().unwrap() = true;
            cv.notify_all();
        }
    }

    /// Poll until `decode` has been entered `n` times.
    pub async fn wait_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.calls() >= n {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("decoder entered {} times, expected {}", self.calls(), n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DecodeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Decoder for StubDecoder {
    fn decode(&self, request: &DecodeRequest) -> Result<DecodedImage, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some((open, cv)) = &self.gate {
            let mut open = open.lock().unwrap();
            while !*open {
                open = cv.wait(open).unwrap();
            }
        }
        if self.fail {
            return Err(DecodeError::Unsupported);
        }
        let bytes = std::fs::read(&request.path).map_err(|e| DecodeError::Io(e.to_string()))?;
        Ok(DecodedImage {
            width: bytes.len() as u32,
            height: 1,
            data: bytes.into(),
        })
    }
}
