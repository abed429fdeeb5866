//! Engine error taxonomy.
//!
//! Every variant is a typed, client-distinguishable outcome. Admission
//! rejections and token failures are normal return values, not panics;
//! only `MutationFailed` and `IdentityInvalid` read as hard errors.

use crate::entities::{Score, TokenId, UserId};
use thiserror::Error;

/// Reason an admission check rejected a proposed delta.
///
/// Checks run in this order and short-circuit on the first failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum RejectReason {
    /// Recomputed proof did not match the supplied proof.
    #[error("proof does not match request contents")]
    ProofInvalid,

    /// Magnitude exceeds the per-action cap.
    #[error("magnitude exceeds the per-action cap")]
    MagnitudeExceeded,

    /// Submitted too soon after the user's last accepted action.
    #[error("too soon after the last accepted action")]
    TooFrequent,

    /// Trailing-window attempt count reached the volume cap.
    #[error("trailing-window volume cap reached")]
    VolumeExceeded,

    /// Burst count or score velocity over the pattern thresholds.
    #[error("activity pattern over suspicion thresholds")]
    PatternSuspicious,
}

/// All failures the engine surfaces to callers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The user id is unknown to the Authenticator.
    #[error("identity invalid: user {0} unknown to the authenticator")]
    IdentityInvalid(UserId),

    /// No such token, wrong secret, or token owned by another user.
    #[error("token {0} invalid")]
    TokenInvalid(TokenId),

    /// The token's deadline passed before consumption.
    #[error("token {0} expired")]
    TokenExpired(TokenId),

    /// The token was already consumed by a committed mutation.
    #[error("token {0} already consumed")]
    TokenAlreadyConsumed(TokenId),

    /// The Admission Validator rejected the delta.
    #[error("admission rejected: {0}")]
    AdmissionRejected(RejectReason),

    /// The user has no row in the Durable Store.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// The user already holds the maximum number of pending tokens.
    #[error("user {user_id} holds {pending} pending tokens (limit {limit})")]
    TooManyPendingTokens {
        /// Owning user.
        user_id: UserId,
        /// Pending tokens currently held.
        pending: usize,
        /// Configured cap.
        limit: usize,
    },

    /// Optimistic-concurrency retries against the Durable Store exhausted.
    #[error("mutation failed after {retries} store conflicts (token {token_id})")]
    MutationFailed {
        /// Token whose mutation could not commit.
        token_id: TokenId,
        /// Number of commit attempts made.
        retries: u32,
    },
}

impl EngineError {
    /// True for the admission-rejection family.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::AdmissionRejected(_))
    }

    /// True when the caller should mint a fresh token and retry.
    #[must_use]
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalid(_) | Self::TokenExpired(_) | Self::TokenAlreadyConsumed(_)
        )
    }
}

/// Outcome of a rank query for a user with no leaderboard entry.
///
/// Not an error: rank queries on unranked users are a valid result. Kept as
/// a dedicated type so callers cannot confuse it with failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NotRanked;

/// A ranked read result for a single user.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RankedUser {
    /// Current score.
    pub score: Score,
    /// 1-based rank.
    pub rank: u64,
}
