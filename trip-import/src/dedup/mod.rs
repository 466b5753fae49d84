use ahash::AHashSet;

use crate::types::{DuplicateKey, TripRecord};

/// Decides whether a trip has been seen before in this run.
///
/// `try_register` is a single test-and-insert: it returns `true` (and remembers
/// the trip) the first time a key is seen, and `false` without changing
/// anything on every later sighting. Implementations are owned by one run and
/// called from one task, so they need no interior locking.
pub trait DuplicateDetector: Send {
    fn try_register(&mut self, record: &TripRecord) -> bool;

    /// Number of distinct keys registered so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps every key seen in memory. Fine for a single file; a run over more
/// unique trips than fit in memory needs a store-backed detector instead.
#[derive(Debug, Default)]
pub struct InMemoryDuplicateDetector {
    seen: AHashSet<DuplicateKey>,
}

impl InMemoryDuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: AHashSet::with_capacity(capacity),
        }
    }
}

impl DuplicateDetector for InMemoryDuplicateDetector {
    fn try_register(&mut self, record: &TripRecord) -> bool {
        self.seen.insert(record.duplicate_key())
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}
