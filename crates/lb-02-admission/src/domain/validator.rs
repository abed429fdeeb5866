//! The admission decision.

use crate::domain::activity::UserActivity;
use crate::ports::outbound::{FlaggedSubmission, ReviewLog};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use shared_types::security::verify_action_proof;
use shared_types::{AdmissionMeta, RejectReason, Score, ScoreDelta, Timestamp, UserId};
use std::sync::Arc;
use tracing::debug;

/// Admission thresholds.
///
/// All windows are trailing and expire automatically. The defaults are a
/// deployment starting point, not policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum absolute magnitude a single action may carry.
    pub max_magnitude_per_action: Score,
    /// Minimum milliseconds between accepted actions for one user.
    pub min_interval_ms: u64,
    /// Trailing volume window (default one hour).
    pub volume_window_ms: u64,
    /// Maximum admission attempts inside the volume window.
    pub volume_cap: u32,
    /// Short burst window for the pattern check.
    pub burst_window_ms: u64,
    /// Maximum attempts inside the burst window.
    pub burst_cap: u32,
    /// Velocity window for the pattern check.
    pub velocity_window_ms: u64,
    /// Maximum accepted absolute magnitude (including the proposed delta)
    /// inside the velocity window.
    pub velocity_cap: Score,
    /// Shared secret for the client proof. Deployment configuration;
    /// never sent on the wire.
    pub proof_secret: String,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_magnitude_per_action: 100,
            min_interval_ms: 1_000,
            volume_window_ms: 60 * 60 * 1000,
            volume_cap: 120,
            burst_window_ms: 10_000,
            burst_cap: 8,
            velocity_window_ms: 5 * 60 * 1000,
            velocity_cap: 1_000,
            proof_secret: "insecure-default-proof-secret".to_string(),
        }
    }
}

/// Outcome of one admission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Delta may mutate score; bookkeeping captured for the audit row.
    Accept(AdmissionMeta),
    /// Delta refused. A normal value, never an exception.
    Reject(RejectReason),
}

impl AdmissionDecision {
    /// True for `Accept`.
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }
}

/// Per-user admission control.
///
/// Counters live independently of the Score Mutator so rejected attempts
/// still consume rate budget (prevents probing). Accepted-side bookkeeping
/// (`record_accepted`) is driven by the mutator after its atomic unit
/// commits.
pub struct AdmissionValidator {
    config: AdmissionConfig,
    activity: DashMap<UserId, UserActivity>,
    review_log: Arc<dyn ReviewLog>,
}

impl AdmissionValidator {
    /// Creates a validator with the given thresholds and review sink.
    pub fn new(config: AdmissionConfig, review_log: Arc<dyn ReviewLog>) -> Self {
        Self {
            config,
            activity: DashMap::new(),
            review_log,
        }
    }

    /// Decides whether `delta` may mutate score.
    ///
    /// Deterministic: identical counter state and `now` always produce the
    /// same decision. The attempt is recorded whichever way the decision
    /// goes; rejects are additionally flagged to the review log.
    pub fn admit(&self, delta: &ScoreDelta, now: Timestamp) -> AdmissionDecision {
        let mut entry = self.activity.entry(delta.user_id.clone()).or_default();
        entry.prune(
            now,
            self.config.volume_window_ms.max(self.config.burst_window_ms),
            self.config.velocity_window_ms,
        );

        let decision = self.evaluate(&entry, delta, now);
        entry.record_attempt(now);
        drop(entry);

        match &decision {
            AdmissionDecision::Accept(_) => {
                debug!(
                    user_id = %delta.user_id,
                    token_id = %delta.token_id,
                    magnitude = delta.magnitude,
                    "Delta admitted"
                );
            }
            AdmissionDecision::Reject(reason) => {
                self.review_log.record_flag(FlaggedSubmission {
                    user_id: delta.user_id.clone(),
                    token_id: delta.token_id,
                    magnitude: delta.magnitude,
                    kind: delta.kind.clone(),
                    reason: *reason,
                    client_timestamp: delta.client_timestamp,
                    flagged_at: now,
                });
            }
        }

        decision
    }

    /// The ordered checks. Pure over `(activity, delta, now)`.
    fn evaluate(
        &self,
        activity: &UserActivity,
        delta: &ScoreDelta,
        now: Timestamp,
    ) -> AdmissionDecision {
        // 1. Proof.
        if !verify_action_proof(
            &delta.user_id,
            &delta.kind,
            delta.magnitude,
            self.config.proof_secret.as_bytes(),
            &delta.proof,
        ) {
            return AdmissionDecision::Reject(RejectReason::ProofInvalid);
        }

        // 2. Magnitude bound.
        if delta.magnitude.saturating_abs() > self.config.max_magnitude_per_action {
            return AdmissionDecision::Reject(RejectReason::MagnitudeExceeded);
        }

        // 3. Minimum spacing since the last accepted action.
        if let Some(elapsed) = activity.since_last_accepted(now) {
            if elapsed < self.config.min_interval_ms {
                return AdmissionDecision::Reject(RejectReason::TooFrequent);
            }
        }

        // 4. Trailing volume. Attempts, not acceptances: rejected probes
        //    burn budget too.
        let attempts = activity.attempts_in(now, self.config.volume_window_ms);
        if attempts >= self.config.volume_cap {
            return AdmissionDecision::Reject(RejectReason::VolumeExceeded);
        }

        // 5. Pattern: burst count and score velocity.
        if activity.attempts_in(now, self.config.burst_window_ms) >= self.config.burst_cap {
            return AdmissionDecision::Reject(RejectReason::PatternSuspicious);
        }
        let window_magnitude = activity.accepted_magnitude_in(now, self.config.velocity_window_ms);
        if window_magnitude.saturating_add(delta.magnitude.saturating_abs())
            > self.config.velocity_cap
        {
            return AdmissionDecision::Reject(RejectReason::PatternSuspicious);
        }

        AdmissionDecision::Accept(AdmissionMeta {
            attempts_in_window: attempts + 1,
            window_magnitude,
            decided_at: now,
        })
    }

    /// Records a committed accepted delta (spacing + velocity state).
    ///
    /// Called by the Score Mutator after its atomic unit commits.
    pub fn record_accepted(&self, user_id: &UserId, magnitude: Score, now: Timestamp) {
        self.activity
            .entry(user_id.clone())
            .or_default()
            .record_accepted(now, magnitude);
    }

    /// The configured thresholds.
    #[must_use]
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }
}
