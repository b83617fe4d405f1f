//! Holding area for chunks that arrived ahead of the commit point.

use std::collections::BTreeMap;

/// Out-of-order responses keyed by offset. The buffer owns each payload
/// until it is taken for commit or the session tears down.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    held: BTreeMap<u64, Vec<u8>>,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a response that cannot be written yet.
    pub fn hold(&mut self, offset: u64, payload: Vec<u8>) {
        if self.held.insert(offset, payload).is_some() {
            tracing::debug!(offset, "replaced duplicate deferred chunk");
        }
    }

    /// Remove and return the payload waiting at `offset`, if any.
    pub fn take(&mut self, offset: u64) -> Option<Vec<u8>> {
        self.held.remove(&offset)
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.held.contains_key(&offset)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Release every held payload. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.held.len();
        self.held.clear();
        n
    }
}
