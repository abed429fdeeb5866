//! # Shared Bus - Ordered Change Propagation
//!
//! Converts committed mutations into `ChangeEvent`s carrying a strictly
//! increasing sequence number, and feeds them to subscribers in that order.
//!
//! ## Ordering Contract
//!
//! - Sequence numbers are assigned at commit time inside one short critical
//!   section (`InMemoryEventBus::publish_committed`), giving every observer
//!   a single total order to replay against.
//! - Delivery is at-least-once: `Subscription` discards duplicate sequence
//!   numbers; a reconnecting subscriber catches up from the bounded
//!   `EventBacklog` before live events resume.
//! - The backlog has a bounded retention window. A subscriber too far
//!   behind gets `ReplayError::TooFarBehind` and must do a full
//!   resynchronization (fresh top-K / rank read) instead of replay.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod backlog;
pub mod events;
pub mod publisher;
pub mod sequencer;
pub mod subscriber;

// Re-export main types
pub use backlog::{EventBacklog, ReplayError};
pub use events::{ChangeEvent, ChangeKind, EventFilter, EventTopic};
pub use publisher::{EventPublisher, InMemoryEventBus, ReplaySource};
pub use sequencer::CommitSequencer;
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per live subscriber before lag kicks in.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default number of events retained for replay.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacities() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
        assert_eq!(DEFAULT_BACKLOG_CAPACITY, 4096);
    }
}
