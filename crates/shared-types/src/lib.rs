//! # Shared Types - Domain Contracts for the Leaderboard Engine
//!
//! Single Source of Truth for the types every subsystem speaks:
//!
//! - **Entities**: users, action tokens, score deltas, history events,
//!   leaderboard entries
//! - **Errors**: the full engine error taxonomy, returned as typed values
//!   (never panics) so callers can distinguish "retry with a new token"
//!   from "you were flagged"
//! - **Security**: the HMAC-SHA256 admission proof shared between clients
//!   and the Admission Validator
//! - **Ports**: collaborator traits (`Authenticator`, `TimeSource`) that
//!   the engine consumes but does not implement
//!
//! Cross-references between entities are expressed as id lookups, never as
//! object graphs. `UserId` is opaque; its `Ord` impl doubles as the
//! deterministic tie-break for equal scores.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod entities;
pub mod errors;
pub mod ports;
pub mod security;

// Re-export main types
pub use entities::{
    ActionKind, ActionToken, AdmissionMeta, LeaderboardEntry, Score, ScoreDelta,
    ScoreHistoryEvent, Timestamp, TokenId, TokenState, UserId,
};
pub use errors::{EngineError, RejectReason};
pub use ports::{Authenticator, MockTimeSource, SystemTimeSource, TimeSource};
pub use security::{compute_action_proof, verify_action_proof, ActionProof};

/// Default token time-to-live in milliseconds (5 minutes).
pub const DEFAULT_TOKEN_TTL_MS: u64 = 5 * 60 * 1000;

/// Length of a token secret in bytes before hex encoding.
pub const TOKEN_SECRET_LEN: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_token_ttl() {
        assert_eq!(DEFAULT_TOKEN_TTL_MS, 300_000);
    }
}
