//! Outbound (driven) ports for the Score Mutator subsystem.
//!
//! Durable persistence of rows and audit history is an external
//! collaborator; this port defines the consistency contract the engine
//! requires from whatever store is plugged in.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_types::{Score, ScoreHistoryEvent, Timestamp, TokenId, UserId};
use thiserror::Error;

/// Store-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic-concurrency failure: the row's version moved between
    /// read and commit. Retried internally by the mutator, never surfaced
    /// to clients.
    #[error("optimistic concurrency conflict")]
    Conflict,

    /// The store could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The engine's view of a user row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    /// Row owner.
    pub user_id: UserId,
    /// Current score.
    pub score: Score,
    /// Monotonic per-user mutation version (CAS token).
    pub version: u64,
    /// Total accepted actions.
    pub accepted_actions: u64,
    /// Timestamp of the last committed mutation (ms).
    pub last_mutation_at: Option<Timestamp>,
}

/// One atomic commit request: score write + history append + token
/// consumption, all or nothing.
#[derive(Clone, Debug)]
pub struct CommitRecord {
    /// Row to mutate.
    pub user_id: UserId,
    /// Token this commit consumes (idempotency key).
    pub token_id: TokenId,
    /// Version observed at the read step; commit fails with `Conflict`
    /// when the row has moved past it.
    pub expected_version: u64,
    /// Score to write.
    pub new_score: Score,
    /// Audit row appended with the commit.
    pub history: ScoreHistoryEvent,
}

/// Durable Store collaborator contract.
///
/// Implementations must make `commit_mutation` atomic: either the score
/// write and the history append both happen, or neither does.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads a user row.
    async fn read_user(&self, user_id: &UserId) -> Result<Option<StoredUser>, StoreError>;

    /// Commits one mutation with version CAS semantics.
    ///
    /// # Errors
    ///
    /// `Conflict` when `expected_version` no longer matches the row.
    async fn commit_mutation(&self, record: CommitRecord) -> Result<(), StoreError>;

    /// Seeds a user row at version 0. Provisioning concern; not part of
    /// the mutation path.
    async fn insert_user(&self, user_id: &UserId, initial_score: Score)
        -> Result<(), StoreError>;

    /// Reads the append-only history for one user, oldest first.
    async fn history_for(&self, user_id: &UserId) -> Result<Vec<ScoreHistoryEvent>, StoreError>;
}
