//! Bounded replay backlog keyed by sequence number.
//!
//! Holds the most recent committed events so a reconnecting subscriber can
//! be replayed the range it missed before live events resume. Retention is
//! bounded; a subscriber behind the oldest retained sequence must resync
//! from a fresh index read instead.

use crate::events::ChangeEvent;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors from replay requests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// The requested range starts before the oldest retained event.
    /// The subscriber must perform a full resynchronization.
    #[error("replay after {requested_after} unavailable; oldest retained is {oldest_retained}")]
    TooFarBehind {
        /// Sequence the subscriber last acknowledged.
        requested_after: u64,
        /// Oldest sequence still in the backlog.
        oldest_retained: u64,
    },
}

/// Bounded in-memory event backlog.
///
/// Events arrive in ascending sequence order (the publisher's commit
/// section guarantees it); eviction is oldest-first.
#[derive(Debug)]
pub struct EventBacklog {
    events: VecDeque<ChangeEvent>,
    capacity: usize,
}

impl EventBacklog {
    /// Creates a backlog retaining at most `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends a committed event, evicting the oldest when full.
    pub fn push(&mut self, event: ChangeEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Sequence of the newest retained event (0 when empty).
    #[must_use]
    pub fn head_sequence(&self) -> u64 {
        self.events.back().map_or(0, |e| e.sequence)
    }

    /// Sequence of the oldest retained event, if any.
    #[must_use]
    pub fn oldest_retained(&self) -> Option<u64> {
        self.events.front().map(|e| e.sequence)
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns every retained event with sequence greater than `after`,
    /// in ascending order.
    ///
    /// # Errors
    ///
    /// `TooFarBehind` when events after `after` have already been evicted;
    /// the caller must resynchronize instead of replaying.
    pub fn replay_after(&self, after: u64) -> Result<Vec<ChangeEvent>, ReplayError> {
        let Some(oldest) = self.oldest_retained() else {
            // Nothing retained: a subscriber at `after == 0` in a fresh
            // system is caught up, not behind.
            return Ok(Vec::new());
        };

        // Everything after `after` must still be retained; the first
        // missing sequence is `after + 1`.
        if after + 1 < oldest {
            return Err(ReplayError::TooFarBehind {
                requested_after: after,
                oldest_retained: oldest,
            });
        }

        Ok(self
            .events
            .iter()
            .filter(|e| e.sequence > after)
            .cloned()
            .collect())
    }
}
