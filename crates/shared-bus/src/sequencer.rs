//! Global commit sequence assignment.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues the strictly increasing sequence numbers stamped on every
/// committed change.
///
/// Assignment is a single atomic increment; the publisher wraps it in its
/// commit section so sequence order and broadcast order agree. Never
/// acquired inside a per-user mutation lock.
#[derive(Debug, Default)]
pub struct CommitSequencer {
    next: AtomicU64,
}

impl CommitSequencer {
    /// Creates a sequencer starting at sequence 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Assigns and returns the next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The highest sequence number assigned so far (0 if none).
    #[must_use]
    pub fn head(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }
}
