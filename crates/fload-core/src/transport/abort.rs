//! Abort flags for in-flight blocking transfers.
//!
//! Blocking curl transfers cannot be interrupted from outside, so each one
//! polls a flag from its write callback and stops when it is set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct AbortRegistry {
    next: AtomicU64,
    flags: RwLock<HashMap<u64, Arc<AtomicBool>>>,
}

impl AbortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new transfer; returns its id and the flag it should poll.
    pub fn register(&self) -> (u64, Arc<AtomicBool>) {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        let flag = Arc::new(AtomicBool::new(false));
        if let Ok(mut flags) = self.flags.write() {
            flags.insert(id, Arc::clone(&flag));
        }
        (id, flag)
    }

    /// Forget a transfer once it has finished (success or failure).
    pub fn unregister(&self, id: u64) {
        if let Ok(mut flags) = self.flags.write() {
            flags.remove(&id);
        }
    }

    pub fn request_abort(&self, id: u64) {
        if let Ok(flags) = self.flags.read() {
            if let Some(flag) = flags.get(&id) {
                flag.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Transfers registered and not yet finished.
    pub fn active(&self) -> usize {
        self.flags.read().map(|f| f.len()).unwrap_or(0)
    }
}
