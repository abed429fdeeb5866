//! # Leaderboard Engine Runtime
//!
//! Entry point for a single-node, in-memory deployment of the engine:
//! static authenticator, in-memory durable store, and the full mutation +
//! fanout pipeline. The physical transport (TLS, HTTP routing, connection
//! acceptance) lives outside this binary; here the engine is exercised
//! directly to verify the wiring end to end.

use anyhow::{Context, Result};
use engine_runtime::{telemetry, EngineConfig, LeaderboardEngine, StaticAuthenticator};
use lb_03_score_engine::{DurableStore, MemoryStore};
use shared_bus::EventTopic;
use shared_types::security::compute_action_proof;
use shared_types::{ActionKind, ScoreDelta, SystemTimeSource, TimeSource, UserId};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("info");

    let config = EngineConfig::default();
    config.validate().context("invalid engine configuration")?;
    if config.admission.proof_secret == lb_02_admission::AdmissionConfig::default().proof_secret {
        warn!("Running with the default admission proof secret; override it in production");
    }

    // Collaborators: static credentials, in-memory store.
    let auth = Arc::new(
        StaticAuthenticator::new()
            .with_user("cred-alice", UserId::new("alice"))
            .with_user("cred-bob", UserId::new("bob")),
    );
    let store = Arc::new(MemoryStore::new());
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);

    for user in ["alice", "bob"] {
        store.insert_user(&UserId::new(user), 0).await?;
    }

    let engine = LeaderboardEngine::new(config.clone(), auth, store, time);
    let tasks = engine.start();
    info!("Engine ready");

    // Exercise the pipeline: one observer, one accepted action.
    let mut observer = engine.connect();
    engine.subscribe(&observer.connection_id, EventTopic::Leaderboard)?;

    let alice = UserId::new("alice");
    let kind = ActionKind::new("match_win");
    let issued = engine.issue_action_token(&alice, kind.clone())?;
    let proof = compute_action_proof(&alice, &kind, 50, config.admission.proof_secret.as_bytes());

    let receipt = engine
        .submit_action(
            &issued.secret,
            ScoreDelta {
                user_id: alice.clone(),
                token_id: issued.token_id,
                magnitude: 50,
                kind,
                proof,
                client_timestamp: SystemTimeSource.now(),
            },
        )
        .await?;
    info!(
        previous_score = receipt.previous_score,
        new_score = receipt.new_score,
        rank = receipt.rank,
        "Action committed"
    );

    let event = observer
        .receiver
        .recv()
        .await
        .context("observer stream closed")?;
    engine.ack(&observer.connection_id, event.sequence)?;
    info!(sequence = event.sequence, "Ranking change observed");

    for entry in engine.top_k(10) {
        info!(rank = entry.rank, user_id = %entry.user_id, score = entry.score, "Leaderboard");
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}
