//! Outbound (driven) ports for the Admission subsystem.

use serde::{Deserialize, Serialize};
use shared_types::{ActionKind, RejectReason, Score, Timestamp, TokenId, UserId};

/// A rejected submission, recorded verbatim for manual review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedSubmission {
    /// Submitting user.
    pub user_id: UserId,
    /// Token the submission named.
    pub token_id: TokenId,
    /// Proposed magnitude.
    pub magnitude: Score,
    /// Declared action kind.
    pub kind: ActionKind,
    /// Why admission rejected it.
    pub reason: RejectReason,
    /// Client-reported timestamp from the request.
    pub client_timestamp: Timestamp,
    /// When the engine flagged it (ms).
    pub flagged_at: Timestamp,
}

/// Sink for flagged activity.
///
/// Recording is a side effect of a *normal* reject return - the reviewer
/// trail exists even though the caller sees an ordinary typed rejection.
pub trait ReviewLog: Send + Sync {
    /// Records one flagged submission.
    fn record_flag(&self, flag: FlaggedSubmission);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_serializes() {
        let flag = FlaggedSubmission {
            user_id: UserId::new("alice"),
            token_id: TokenId::generate(),
            magnitude: 9_999,
            kind: ActionKind::new("match_win"),
            reason: RejectReason::MagnitudeExceeded,
            client_timestamp: 123,
            flagged_at: 456,
        };

        let json = serde_json::to_string(&flag).unwrap();
        assert!(json.contains("alice"));
        assert!(json.contains("MagnitudeExceeded"));
    }
}
