//! # Event Subscriber
//!
//! Receiving side of the change bus: filtered, in-order, duplicate-free.

use crate::events::{ChangeEvent, EventFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("change bus closed")]
    Closed,
}

/// A subscription handle for receiving change events.
///
/// Enforces the per-subscriber ordering contract: events are yielded in
/// strictly ascending sequence order, and a redelivered sequence number is
/// silently discarded (at-least-once upstream, exactly-once here).
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<ChangeEvent>,

    /// Filter for this subscription.
    filter: EventFilter,

    /// Highest sequence yielded so far; duplicates at or below are dropped.
    last_delivered: u64,

    /// Events dropped by the broadcast channel while this subscriber
    /// lagged. Nonzero means the caller should replay from the backlog.
    lagged: u64,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(receiver: broadcast::Receiver<ChangeEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            last_delivered: 0,
            lagged: 0,
        }
    }

    /// Receive the next matching event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next matching event, sequence above any
    ///   previously yielded
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.lagged += count;
                    debug!(lagged = count, "Subscriber lagged, events dropped");
                    continue;
                }
            };

            if self.accept(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive the next matching event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available and matched
    /// - `Ok(None)` - No event available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<ChangeEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.lagged += count;
                    continue;
                }
            };

            if self.accept(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Filter + duplicate-discard decision for one incoming event.
    fn accept(&mut self, event: &ChangeEvent) -> bool {
        if !self.filter.matches(event) {
            return false;
        }
        if event.sequence <= self.last_delivered {
            debug!(
                sequence = event.sequence,
                last_delivered = self.last_delivered,
                "Duplicate sequence discarded"
            );
            return false;
        }
        self.last_delivered = event.sequence;
        true
    }

    /// Marks sequences at or below `sequence` as already delivered.
    ///
    /// Used after a backlog replay so the live stream does not redeliver
    /// the replayed range.
    pub fn fast_forward(&mut self, sequence: u64) {
        self.last_delivered = self.last_delivered.max(sequence);
    }

    /// Events lost to channel lag since the last check (caller should
    /// replay from the backlog when nonzero).
    #[must_use]
    pub fn take_lagged(&mut self) -> u64 {
        std::mem::take(&mut self.lagged)
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Highest sequence yielded so far.
    #[must_use]
    pub fn last_delivered(&self) -> u64 {
        self.last_delivered
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        self.subscription.filter()
    }
}

impl Stream for EventStream {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(event)) => Poll::Ready(Some(event)),
            Ok(None) => {
                // No event ready; re-arm and yield to the scheduler.
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}
