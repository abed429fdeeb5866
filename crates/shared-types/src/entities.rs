//! Core domain entities shared across subsystems.
//!
//! All cross-entity references are by id. Entities carry only the fields the
//! engine needs for mutation and ranking; full user rows are owned by the
//! Durable Store collaborator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// A user's score. Signed: deltas may subtract.
pub type Score = i64;

/// Opaque user identifier.
///
/// `Ord` is lexicographic on the underlying string and is the documented
/// tie-break for equal scores on the leaderboard (ascending user id).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier of a single-use action token.
///
/// The token id is the idempotency key for the whole mutation pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(Uuid);

impl TokenId {
    /// Generates a fresh random token id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of score-changing action a token authorizes (opaque to the engine).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionKind(String);

impl ActionKind {
    /// Creates an action kind from any string-like value.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// The raw kind string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an action token.
///
/// ```text
/// [Pending] ──consume──→ [Consumed]    (exactly once, inside the atomic unit)
///     │
///     └── deadline passed ──→ [Expired]  (lazy, on read)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
    /// Issued, not yet consumed, not yet past its deadline.
    Pending,
    /// Consumed by exactly one committed mutation. Terminal.
    Consumed,
    /// Deadline passed before consumption. Terminal.
    Expired,
}

/// A single-use, time-bounded token binding a user to one pending action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionToken {
    /// Token id — the pipeline-wide idempotency key.
    pub id: TokenId,
    /// Owning user.
    pub user_id: UserId,
    /// Action kind this token authorizes.
    pub kind: ActionKind,
    /// Single-use secret, hex-encoded. Unguessable (32 random bytes).
    pub secret: String,
    /// Issuance timestamp (ms).
    pub issued_at: Timestamp,
    /// Expiry deadline (ms).
    pub expires_at: Timestamp,
    /// Current lifecycle state.
    pub state: TokenState,
}

impl ActionToken {
    /// True once `now` has reached the expiry deadline.
    #[must_use]
    pub fn is_past_deadline(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// A proposed score change. Transient: exists for one admission+mutation
/// cycle only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreDelta {
    /// User the delta applies to.
    pub user_id: UserId,
    /// Token gating this delta.
    pub token_id: TokenId,
    /// Signed magnitude to add to the current score.
    pub magnitude: Score,
    /// Action kind declared by the client.
    pub kind: ActionKind,
    /// Client-supplied proof over (user id, kind, magnitude).
    pub proof: String,
    /// Client-reported timestamp (ms). Informational only.
    pub client_timestamp: Timestamp,
}

/// Admission bookkeeping captured at the moment a delta was accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionMeta {
    /// Attempts (accepted and rejected) in the trailing volume window,
    /// including this one.
    pub attempts_in_window: u32,
    /// Sum of accepted magnitudes in the velocity window before this delta.
    pub window_magnitude: Score,
    /// When the decision was made (ms).
    pub decided_at: Timestamp,
}

/// Append-only audit record, one per successful mutation. Immutable once
/// written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoreHistoryEvent {
    /// User whose score changed.
    pub user_id: UserId,
    /// Consumed token. No two history events ever share a token id.
    pub token_id: TokenId,
    /// Score before the mutation.
    pub previous_score: Score,
    /// Score after the mutation.
    pub new_score: Score,
    /// Commit timestamp (ms).
    pub accepted_at: Timestamp,
    /// Admission state at acceptance time.
    pub admission: AdmissionMeta,
}

/// One row of the ranked leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// User this entry ranks.
    pub user_id: UserId,
    /// Current score.
    pub score: Score,
    /// 1-based rank under the total order (score desc, user id asc).
    pub rank: u64,
    /// Per-user mutation version that produced this score.
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_ordering_is_lexicographic() {
        let a = UserId::new("alice");
        let b = UserId::new("bob");
        assert!(a < b);
    }

    #[test]
    fn test_token_id_uniqueness() {
        let a = TokenId::generate();
        let b = TokenId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_deadline() {
        let token = ActionToken {
            id: TokenId::generate(),
            user_id: UserId::new("alice"),
            kind: ActionKind::new("match_win"),
            secret: "ab".repeat(32),
            issued_at: 1_000,
            expires_at: 2_000,
            state: TokenState::Pending,
        };

        assert!(!token.is_past_deadline(1_999));
        assert!(token.is_past_deadline(2_000));
        assert!(token.is_past_deadline(3_000));
    }

    #[test]
    fn test_user_id_serde_transparent() {
        let id = UserId::new("alice");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice\"");
    }
}
