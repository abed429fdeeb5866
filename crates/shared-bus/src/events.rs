//! Change events emitted for every committed mutation.

use serde::{Deserialize, Serialize};
use shared_types::{Score, Timestamp, TokenId, UserId};

/// Topics a subscriber can follow.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Public channel: ranking changes visible to everyone.
    Leaderboard,
    /// Personal channel: score changes for one user. Requires an
    /// authenticated connection bound to that user.
    User(UserId),
}

/// Payload of a change event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A user's score changed. One per committed mutation.
    ScoreChanged {
        /// User whose score changed.
        user_id: UserId,
        /// Token consumed by the mutation (downstream idempotency key).
        token_id: TokenId,
        /// Score before the mutation.
        previous_score: Score,
        /// Score after the mutation.
        new_score: Score,
        /// Per-user mutation version that produced this score.
        version: u64,
    },
    /// The ranking moved. One per committed mutation that repositioned
    /// the user.
    LeaderboardChanged {
        /// User whose entry moved.
        user_id: UserId,
        /// Score after the mutation.
        score: Score,
        /// Rank before the mutation, if the user was ranked.
        previous_rank: Option<u64>,
        /// Rank after the mutation.
        new_rank: u64,
        /// Whether the top-K slice changed.
        top_k_changed: bool,
    },
}

/// A sequenced change event.
///
/// `sequence` is globally strictly increasing, assigned at commit time; it
/// is the basis for subscriber ordering and duplicate discard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Global commit sequence number.
    pub sequence: u64,
    /// What changed.
    pub kind: ChangeKind,
    /// When the event was emitted (ms).
    pub emitted_at: Timestamp,
}

impl ChangeEvent {
    /// The topic this event is published on.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match &self.kind {
            ChangeKind::ScoreChanged { user_id, .. } => EventTopic::User(user_id.clone()),
            ChangeKind::LeaderboardChanged { .. } => EventTopic::Leaderboard,
        }
    }
}

/// Filter for subscriptions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Topics to receive. Empty = all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// Matches only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}
