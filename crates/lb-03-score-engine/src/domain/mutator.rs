//! The atomic score mutation path.

use crate::ports::outbound::{CommitRecord, DurableStore, StoreError};
use dashmap::DashMap;
use lb_01_action_tokens::TokenRegistry;
use lb_02_admission::{AdmissionDecision, AdmissionValidator};
use serde::{Deserialize, Serialize};
use shared_types::{
    EngineError, Score, ScoreDelta, ScoreHistoryEvent, TimeSource, TokenId, UserId,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Mutator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Commit retries after a store conflict before giving up.
    pub max_commit_retries: u32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 3,
        }
    }
}

/// Result of one committed mutation.
///
/// The token id doubles as the downstream idempotency key: retried
/// delivery of this outcome can never double-apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// Mutated user.
    pub user_id: UserId,
    /// Token consumed by this mutation.
    pub token_id: TokenId,
    /// Score before.
    pub previous_score: Score,
    /// Score after.
    pub new_score: Score,
    /// Per-user version the commit produced.
    pub version: u64,
}

/// Applies accepted deltas exactly once, serialized per user.
pub struct ScoreMutator {
    store: Arc<dyn DurableStore>,
    tokens: Arc<TokenRegistry>,
    admission: Arc<AdmissionValidator>,
    time: Arc<dyn TimeSource>,
    /// Per-user mutation locks. Lock handles are created on first use and
    /// shared thereafter; unrelated users never contend.
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    config: MutationConfig,
}

impl ScoreMutator {
    /// Wires the mutator to its collaborators.
    pub fn new(
        store: Arc<dyn DurableStore>,
        tokens: Arc<TokenRegistry>,
        admission: Arc<AdmissionValidator>,
        time: Arc<dyn TimeSource>,
        config: MutationConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            admission,
            time,
            locks: DashMap::new(),
            config,
        }
    }

    /// Applies one proposed delta.
    ///
    /// The whole unit commits or aborts: on any failure the score, the
    /// history, and the token are untouched (aside from a legitimate lazy
    /// `Expired` transition). Store conflicts are re-executed from the
    /// read step and never surface unless retries exhaust.
    ///
    /// # Errors
    ///
    /// `TokenInvalid` / `TokenExpired` / `TokenAlreadyConsumed`,
    /// `AdmissionRejected`, `UserNotFound`, or `MutationFailed`.
    pub async fn apply(
        &self,
        secret: &str,
        delta: &ScoreDelta,
    ) -> Result<MutationOutcome, EngineError> {
        let lock = self.user_lock(&delta.user_id);
        let _guard = lock.lock().await;

        let now = self.time.now();

        // Token gate. Read-only aside from lazy expiry; consumption is
        // committed only after the store commit succeeds.
        self.tokens
            .check(&delta.token_id, secret, &delta.user_id, now)?;

        // Admission is re-checked here, inside the serialized section,
        // not trusted from any earlier call.
        let meta = match self.admission.admit(delta, now) {
            AdmissionDecision::Accept(meta) => meta,
            AdmissionDecision::Reject(reason) => {
                return Err(EngineError::AdmissionRejected(reason));
            }
        };

        // Read-compute-commit, re-executed from the read on conflict.
        let mut conflicts = 0;
        loop {
            let stored = self
                .store
                .read_user(&delta.user_id)
                .await
                .map_err(|_| self.mutation_failed(delta.token_id, conflicts))?
                .ok_or_else(|| EngineError::UserNotFound(delta.user_id.clone()))?;

            let new_score = stored.score.saturating_add(delta.magnitude);
            let accepted_at = self.time.now();
            let record = CommitRecord {
                user_id: delta.user_id.clone(),
                token_id: delta.token_id,
                expected_version: stored.version,
                new_score,
                history: ScoreHistoryEvent {
                    user_id: delta.user_id.clone(),
                    token_id: delta.token_id,
                    previous_score: stored.score,
                    new_score,
                    accepted_at,
                    admission: meta.clone(),
                },
            };

            match self.store.commit_mutation(record).await {
                Ok(()) => {
                    // Commit succeeded: the token transition and the
                    // accepted-side admission counters belong to this
                    // commit and happen before the lock releases.
                    self.tokens.mark_consumed(&delta.token_id)?;
                    self.admission
                        .record_accepted(&delta.user_id, delta.magnitude, accepted_at);

                    info!(
                        user_id = %delta.user_id,
                        token_id = %delta.token_id,
                        previous_score = stored.score,
                        new_score,
                        version = stored.version + 1,
                        "Score mutation committed"
                    );
                    return Ok(MutationOutcome {
                        user_id: delta.user_id.clone(),
                        token_id: delta.token_id,
                        previous_score: stored.score,
                        new_score,
                        version: stored.version + 1,
                    });
                }
                Err(StoreError::Conflict) if conflicts < self.config.max_commit_retries => {
                    conflicts += 1;
                    debug!(
                        user_id = %delta.user_id,
                        conflicts,
                        "Store conflict, re-executing from read"
                    );
                }
                Err(_) => {
                    return Err(self.mutation_failed(delta.token_id, conflicts));
                }
            }
        }
    }

    fn mutation_failed(&self, token_id: TokenId, conflicts: u32) -> EngineError {
        EngineError::MutationFailed {
            token_id,
            retries: conflicts,
        }
    }

    fn user_lock(&self, user_id: &UserId) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
