//! # Event Publisher
//!
//! Assigns commit sequence numbers and fans events out to live subscribers
//! and the replay backlog.

use crate::backlog::{EventBacklog, ReplayError};
use crate::events::{ChangeEvent, ChangeKind, EventFilter};
use crate::sequencer::CommitSequencer;
use crate::subscriber::Subscription;
use crate::{DEFAULT_BACKLOG_CAPACITY, DEFAULT_CHANNEL_CAPACITY};
use parking_lot::Mutex;
use shared_types::{SystemTimeSource, TimeSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Read side of the replay backlog.
///
/// The fanout layer consumes this when attaching a subscriber: the missed
/// range is replayed before live delivery resumes.
pub trait ReplaySource: Send + Sync {
    /// Retained events with sequence greater than `after`, ascending.
    ///
    /// # Errors
    ///
    /// `ReplayError::TooFarBehind` when part of the range was evicted.
    fn replay_after(&self, after: u64) -> Result<Vec<ChangeEvent>, ReplayError>;

    /// Highest sequence number committed so far.
    fn head_sequence(&self) -> u64;
}

/// Trait for publishing committed changes to the bus.
///
/// The interface the Score Mutator side uses to emit events for
/// consumption by the fanout layer.
pub trait EventPublisher: Send + Sync {
    /// Publish the changes of one committed mutation.
    ///
    /// All events of one call receive consecutive sequence numbers; no
    /// other publisher's events interleave between them.
    ///
    /// # Returns
    ///
    /// The assigned sequence numbers, in payload order.
    fn publish_committed(&self, kinds: Vec<ChangeKind>) -> Vec<u64>;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the change bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer delivery. Suitable for
/// single-node operation; distributed deployments would use a different
/// implementation behind the same trait.
pub struct InMemoryEventBus {
    /// Broadcast sender for live events.
    sender: broadcast::Sender<ChangeEvent>,

    /// Global commit sequencer.
    sequencer: CommitSequencer,

    /// Replay backlog. The mutex doubles as the commit section: sequence
    /// assignment, backlog append, and broadcast happen under it so
    /// subscribers always observe ascending sequences.
    backlog: Mutex<EventBacklog>,

    /// Total events published.
    events_published: AtomicU64,

    /// Live channel capacity.
    capacity: usize,

    /// Clock for `emitted_at` stamps.
    time: Arc<dyn TimeSource>,
}

impl InMemoryEventBus {
    /// Create a new in-memory bus with default capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY, DEFAULT_BACKLOG_CAPACITY)
    }

    /// Create a new in-memory bus with explicit capacities.
    #[must_use]
    pub fn with_capacity(channel_capacity: usize, backlog_capacity: usize) -> Self {
        Self::with_time_source(
            channel_capacity,
            backlog_capacity,
            Arc::new(SystemTimeSource),
        )
    }

    /// Create a bus with a custom clock (deterministic tests).
    #[must_use]
    pub fn with_time_source(
        channel_capacity: usize,
        backlog_capacity: usize,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity);
        Self {
            sender,
            sequencer: CommitSequencer::new(),
            backlog: Mutex::new(EventBacklog::new(backlog_capacity)),
            events_published: AtomicU64::new(0),
            capacity: channel_capacity,
            time,
        }
    }

    /// Subscribe to live events matching a filter.
    ///
    /// Returns a `Subscription` handle that discards duplicates and yields
    /// events in ascending sequence order.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, "New bus subscription");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Replay retained events with sequence greater than `after`.
    ///
    /// # Errors
    ///
    /// `ReplayError::TooFarBehind` when the range is no longer retained.
    pub fn replay_after(&self, after: u64) -> Result<Vec<ChangeEvent>, ReplayError> {
        self.backlog.lock().replay_after(after)
    }

    /// Highest sequence number assigned so far.
    #[must_use]
    pub fn head_sequence(&self) -> u64 {
        self.sequencer.head()
    }

    /// Get the number of active live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the live channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplaySource for InMemoryEventBus {
    fn replay_after(&self, after: u64) -> Result<Vec<ChangeEvent>, ReplayError> {
        InMemoryEventBus::replay_after(self, after)
    }

    fn head_sequence(&self) -> u64 {
        InMemoryEventBus::head_sequence(self)
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish_committed(&self, kinds: Vec<ChangeKind>) -> Vec<u64> {
        // Commit section: short, never entered while holding a per-user
        // mutation lock.
        let mut backlog = self.backlog.lock();
        let emitted_at = self.time.now();

        kinds
            .into_iter()
            .map(|kind| {
                let sequence = self.sequencer.next();
                let event = ChangeEvent {
                    sequence,
                    kind,
                    emitted_at,
                };
                backlog.push(event.clone());
                self.events_published.fetch_add(1, Ordering::Relaxed);

                match self.sender.send(event) {
                    Ok(receivers) => {
                        debug!(sequence, receivers, "Change event published");
                    }
                    Err(_) => {
                        // No live receivers; the backlog still retains the
                        // event for replay.
                        warn!(sequence, "Change event published with no live receivers");
                    }
                }
                sequence
            })
            .collect()
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
