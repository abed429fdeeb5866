//! Shared engine fixture for integration tests.

use engine_runtime::{EngineConfig, IssuedToken, LeaderboardEngine, StaticAuthenticator, SubmitReceipt};
use lb_03_score_engine::{DurableStore, MemoryStore};
use shared_types::security::compute_action_proof;
use shared_types::{ActionKind, EngineError, MockTimeSource, Score, ScoreDelta, TimeSource, UserId};
use std::sync::Arc;

/// A wired engine over in-memory collaborators with a deterministic clock.
pub struct TestRig {
    pub engine: Arc<LeaderboardEngine>,
    pub auth: Arc<StaticAuthenticator>,
    pub store: Arc<MemoryStore>,
    pub time: Arc<MockTimeSource>,
    pub config: EngineConfig,
}

/// Admission thresholds loose enough that only the check under test
/// fires; individual tests tighten what they exercise.
pub fn permissive_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.admission.min_interval_ms = 0;
    config.admission.burst_cap = 100_000;
    config.admission.volume_cap = 1_000_000;
    config.admission.velocity_cap = Score::MAX / 4;
    config.admission.max_magnitude_per_action = 10_000;
    config.tokens.max_pending_per_user = 128;
    config
}

pub fn rig() -> TestRig {
    rig_with(permissive_config())
}

pub fn rig_with(config: EngineConfig) -> TestRig {
    let auth = Arc::new(StaticAuthenticator::new());
    let store = Arc::new(MemoryStore::new());
    let time = Arc::new(MockTimeSource::new(1_000_000));

    let engine = LeaderboardEngine::new(
        config.clone(),
        auth.clone(),
        store.clone(),
        time.clone() as Arc<dyn TimeSource>,
    );

    TestRig {
        engine,
        auth,
        store,
        time,
        config,
    }
}

impl TestRig {
    /// Registers a credential and seeds a store row for a user.
    pub async fn seed_user(&self, name: &str, score: Score) -> UserId {
        let user_id = UserId::new(name);
        self.auth.register(format!("cred-{name}"), user_id.clone());
        self.store
            .insert_user(&user_id, score)
            .await
            .expect("seed user");
        user_id
    }

    /// Builds a well-formed delta for an issued token.
    pub fn delta_for(&self, user_id: &UserId, token: &IssuedToken, magnitude: Score) -> ScoreDelta {
        let kind = ActionKind::new("match_win");
        let proof = compute_action_proof(
            user_id,
            &kind,
            magnitude,
            self.config.admission.proof_secret.as_bytes(),
        );
        ScoreDelta {
            user_id: user_id.clone(),
            token_id: token.token_id,
            magnitude,
            kind,
            proof,
            client_timestamp: self.time.now(),
        }
    }

    /// Issues a fresh token and submits a delta with it.
    pub async fn submit(
        &self,
        user_id: &UserId,
        magnitude: Score,
    ) -> Result<SubmitReceipt, EngineError> {
        let token = self
            .engine
            .issue_action_token(user_id, ActionKind::new("match_win"))?;
        let delta = self.delta_for(user_id, &token, magnitude);
        self.engine.submit_action(&token.secret, delta).await
    }
}
