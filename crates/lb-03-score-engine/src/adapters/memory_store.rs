//! In-memory Durable Store adapter.
//!
//! Reference implementation of the store contract for single-node
//! operation and tests. A production deployment plugs a durable engine in
//! behind the same `DurableStore` trait.

use crate::ports::outbound::{CommitRecord, DurableStore, StoreError, StoredUser};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Score, ScoreHistoryEvent, UserId};
use std::collections::HashMap;
use tracing::debug;

/// Versioned in-memory user table plus append-only history log.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, StoredUser>>,
    history: RwLock<Vec<ScoreHistoryEvent>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of user rows.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    /// Total history rows across all users.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn read_user(&self, user_id: &UserId) -> Result<Option<StoredUser>, StoreError> {
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn commit_mutation(&self, record: CommitRecord) -> Result<(), StoreError> {
        // One write lock spans the row update and the history append; the
        // unit commits or aborts as a whole.
        let mut users = self.users.write();

        let Some(user) = users.get_mut(&record.user_id) else {
            return Err(StoreError::Conflict);
        };
        if user.version != record.expected_version {
            debug!(
                user_id = %record.user_id,
                expected = record.expected_version,
                actual = user.version,
                "Commit conflict"
            );
            return Err(StoreError::Conflict);
        }

        user.score = record.new_score;
        user.version += 1;
        user.accepted_actions += 1;
        user.last_mutation_at = Some(record.history.accepted_at);

        self.history.write().push(record.history);
        Ok(())
    }

    async fn insert_user(
        &self,
        user_id: &UserId,
        initial_score: Score,
    ) -> Result<(), StoreError> {
        self.users.write().insert(
            user_id.clone(),
            StoredUser {
                user_id: user_id.clone(),
                score: initial_score,
                version: 0,
                accepted_actions: 0,
                last_mutation_at: None,
            },
        );
        Ok(())
    }

    async fn history_for(&self, user_id: &UserId) -> Result<Vec<ScoreHistoryEvent>, StoreError> {
        Ok(self
            .history
            .read()
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{AdmissionMeta, TokenId};

    fn history(user: &str, previous: Score, new: Score) -> ScoreHistoryEvent {
        ScoreHistoryEvent {
            user_id: UserId::new(user),
            token_id: TokenId::generate(),
            previous_score: previous,
            new_score: new,
            accepted_at: 1_000,
            admission: AdmissionMeta {
                attempts_in_window: 1,
                window_magnitude: 0,
                decided_at: 1_000,
            },
        }
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_appends_history() {
        let store = MemoryStore::new();
        let alice = UserId::new("alice");
        store.insert_user(&alice, 100).await.unwrap();

        store
            .commit_mutation(CommitRecord {
                user_id: alice.clone(),
                token_id: TokenId::generate(),
                expected_version: 0,
                new_score: 150,
                history: history("alice", 100, 150),
            })
            .await
            .unwrap();

        let row = store.read_user(&alice).await.unwrap().unwrap();
        assert_eq!(row.score, 150);
        assert_eq!(row.version, 1);
        assert_eq!(row.accepted_actions, 1);
        assert_eq!(row.last_mutation_at, Some(1_000));
        assert_eq!(store.history_for(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_without_side_effects() {
        let store = MemoryStore::new();
        let alice = UserId::new("alice");
        store.insert_user(&alice, 100).await.unwrap();

        let err = store
            .commit_mutation(CommitRecord {
                user_id: alice.clone(),
                token_id: TokenId::generate(),
                expected_version: 7,
                new_score: 150,
                history: history("alice", 100, 150),
            })
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Conflict);
        let row = store.read_user(&alice).await.unwrap().unwrap();
        assert_eq!(row.score, 100);
        assert_eq!(row.version, 0);
        assert_eq!(store.history_len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_reads_none() {
        let store = MemoryStore::new();
        assert!(store
            .read_user(&UserId::new("ghost"))
            .await
            .unwrap()
            .is_none());
    }
}
