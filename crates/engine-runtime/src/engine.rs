//! The assembled leaderboard engine.

use crate::config::EngineConfig;
use lb_01_action_tokens::{TokenIssuer, TokenRegistry};
use lb_02_admission::{AdmissionValidator, InMemoryReviewLog, ReviewLog};
use lb_03_score_engine::{DurableStore, MutationOutcome, ScoreMutator};
use lb_04_rank_index::RankIndex;
use lb_05_fanout::{
    run_dispatch, run_sweeper, ConnectionId, ConnectionRegistry, FanoutError, SubscriberHandle,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_bus::{ChangeKind, EventFilter, EventPublisher, EventTopic, InMemoryEventBus};
use shared_types::{
    ActionKind, Authenticator, EngineError, LeaderboardEntry, Score, ScoreDelta, TimeSource,
    Timestamp, TokenId, UserId,
};
use shared_types::errors::RankedUser;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// What a client receives from `issue_action_token`.
///
/// The secret is shown exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Token id to submit with the action.
    pub token_id: TokenId,
    /// Single-use secret.
    pub secret: String,
    /// Expiry deadline (ms).
    pub expires_at: Timestamp,
}

/// Successful outcome of `submit_action`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Always true on this type; rejections arrive as typed errors.
    pub accepted: bool,
    /// Consumed token (idempotency key).
    pub token_id: TokenId,
    /// Score before the mutation.
    pub previous_score: Score,
    /// Score after the mutation.
    pub new_score: Score,
    /// Rank after the mutation.
    pub rank: u64,
    /// Rank before the mutation; `None` for a newly ranked user.
    pub previous_rank: Option<u64>,
}

/// The engine: subsystems wired together behind the external interface.
pub struct LeaderboardEngine {
    config: EngineConfig,
    issuer: TokenIssuer,
    mutator: ScoreMutator,
    index: Arc<RankIndex>,
    bus: Arc<InMemoryEventBus>,
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn DurableStore>,
    review_log: Arc<InMemoryReviewLog>,
    /// Post-commit ordering section: index update + sequence assignment +
    /// backlog append happen as one unit so commit order, index order,
    /// and event order agree. Never held across await points and never
    /// entered while a per-user mutation lock is held.
    commit_order: Mutex<()>,
}

impl LeaderboardEngine {
    /// Wires an engine from its collaborators.
    pub fn new(
        config: EngineConfig,
        auth: Arc<dyn Authenticator>,
        store: Arc<dyn DurableStore>,
        time: Arc<dyn TimeSource>,
    ) -> Arc<Self> {
        let bus = Arc::new(InMemoryEventBus::with_time_source(
            config.bus.channel_capacity,
            config.bus.backlog_capacity,
            time.clone(),
        ));

        let token_registry = Arc::new(TokenRegistry::new());
        let review_log = Arc::new(InMemoryReviewLog::new());
        let admission = Arc::new(AdmissionValidator::new(
            config.admission.clone(),
            review_log.clone() as Arc<dyn ReviewLog>,
        ));

        let issuer = TokenIssuer::new(
            token_registry.clone(),
            auth.clone(),
            time.clone(),
            config.tokens.clone(),
        );
        let mutator = ScoreMutator::new(
            store.clone(),
            token_registry,
            admission,
            time.clone(),
            config.mutation.clone(),
        );
        let index = Arc::new(RankIndex::new(config.index.clone()));
        let registry = Arc::new(ConnectionRegistry::new(
            auth,
            bus.clone(),
            time,
            config.fanout.clone(),
        ));

        Arc::new(Self {
            config,
            issuer,
            mutator,
            index,
            bus,
            registry,
            store,
            review_log,
            commit_order: Mutex::new(()),
        })
    }

    /// Spawns the long-lived fanout tasks (dispatch loop + inactivity
    /// sweeper). Call once from an async context.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("Leaderboard engine starting background tasks");
        vec![
            tokio::spawn(run_dispatch(
                self.bus.subscribe(EventFilter::all()),
                self.registry.clone(),
            )),
            tokio::spawn(run_sweeper(
                self.registry.clone(),
                Duration::from_millis(self.config.sweep_interval_ms()),
            )),
        ]
    }

    // ----- mutation pipeline -------------------------------------------------

    /// Mints a single-use token for one pending action.
    ///
    /// # Errors
    ///
    /// `IdentityInvalid` or `TooManyPendingTokens`.
    pub fn issue_action_token(
        &self,
        user_id: &UserId,
        kind: ActionKind,
    ) -> Result<IssuedToken, EngineError> {
        let token = self.issuer.issue(user_id, kind)?;
        Ok(IssuedToken {
            token_id: token.id,
            secret: token.secret,
            expires_at: token.expires_at,
        })
    }

    /// Submits one action: admission, atomic mutation, index update, and
    /// ordered change publication.
    ///
    /// Calling twice with the same token yields exactly one accepted
    /// mutation; the second call returns `TokenAlreadyConsumed`.
    ///
    /// # Errors
    ///
    /// The full taxonomy: token failures, `AdmissionRejected`,
    /// `UserNotFound`, `MutationFailed`.
    pub async fn submit_action(
        &self,
        secret: &str,
        delta: ScoreDelta,
    ) -> Result<SubmitReceipt, EngineError> {
        let outcome = self.mutator.apply(secret, &delta).await?;
        Ok(self.publish_commit(outcome))
    }

    /// Post-commit section: runs after the mutator's per-user lock is
    /// released.
    fn publish_commit(&self, outcome: MutationOutcome) -> SubmitReceipt {
        let _order = self.commit_order.lock();

        let rank_change =
            self.index
                .update(&outcome.user_id, outcome.new_score, outcome.version);

        let mut kinds = vec![ChangeKind::ScoreChanged {
            user_id: outcome.user_id.clone(),
            token_id: outcome.token_id,
            previous_score: outcome.previous_score,
            new_score: outcome.new_score,
            version: outcome.version,
        }];
        if let Some(change) = &rank_change {
            kinds.push(ChangeKind::LeaderboardChanged {
                user_id: change.user_id.clone(),
                score: change.score,
                previous_rank: change.previous_rank,
                new_rank: change.new_rank,
                top_k_changed: change.top_k_changed,
            });
        }
        self.bus.publish_committed(kinds);

        let (rank, previous_rank) = match rank_change {
            Some(change) => (change.new_rank, change.previous_rank),
            // Stale index update: a newer version already applied; the
            // current index answer is authoritative.
            None => (
                self.index
                    .rank_of(&outcome.user_id)
                    .map_or(0, |ranked| ranked.rank),
                None,
            ),
        };

        SubmitReceipt {
            accepted: true,
            token_id: outcome.token_id,
            previous_score: outcome.previous_score,
            new_score: outcome.new_score,
            rank,
            previous_rank,
        }
    }

    // ----- index reads -------------------------------------------------------

    /// The top `k` leaderboard entries, rank order.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<LeaderboardEntry> {
        self.index.top_k(k)
    }

    /// One user's score and rank; `None` means not ranked (a normal
    /// outcome for users with no committed mutation).
    #[must_use]
    pub fn user_rank(&self, user_id: &UserId) -> Option<RankedUser> {
        self.index.rank_of(user_id)
    }

    // ----- subscription protocol ---------------------------------------------

    /// Accepts an observer connection.
    pub fn connect(&self) -> SubscriberHandle {
        self.registry.connect()
    }

    /// Binds a connection to a user identity.
    ///
    /// # Errors
    ///
    /// `UnknownConnection` or `Unauthenticated`.
    pub fn authenticate(
        &self,
        connection_id: &ConnectionId,
        credential: &str,
    ) -> Result<UserId, FanoutError> {
        self.registry.authenticate(connection_id, credential)
    }

    /// Subscribes a connection to a topic, replaying any missed range.
    ///
    /// # Errors
    ///
    /// See [`ConnectionRegistry::subscribe`].
    pub fn subscribe(
        &self,
        connection_id: &ConnectionId,
        topic: EventTopic,
    ) -> Result<usize, FanoutError> {
        self.registry.subscribe(connection_id, topic)
    }

    /// Removes a topic subscription.
    ///
    /// # Errors
    ///
    /// `UnknownConnection`.
    pub fn unsubscribe(
        &self,
        connection_id: &ConnectionId,
        topic: &EventTopic,
    ) -> Result<bool, FanoutError> {
        self.registry.unsubscribe(connection_id, topic)
    }

    /// Records a client's delivery acknowledgement.
    ///
    /// # Errors
    ///
    /// `UnknownConnection`.
    pub fn ack(&self, connection_id: &ConnectionId, sequence: u64) -> Result<(), FanoutError> {
        self.registry.ack(connection_id, sequence)
    }

    /// Transport-level close.
    pub fn disconnect(&self, connection_id: &ConnectionId) {
        self.registry.disconnect(connection_id);
    }

    // ----- maintenance / introspection ---------------------------------------

    /// Sweeps expired tokens.
    pub fn purge_expired_tokens(&self) -> usize {
        self.issuer.purge_expired()
    }

    /// Highest committed sequence number.
    #[must_use]
    pub fn head_sequence(&self) -> u64 {
        self.bus.head_sequence()
    }

    /// Submissions flagged by admission, for manual review.
    #[must_use]
    pub fn flagged_submissions(&self) -> Vec<lb_02_admission::FlaggedSubmission> {
        self.review_log.snapshot()
    }

    /// The Durable Store this engine mutates.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
