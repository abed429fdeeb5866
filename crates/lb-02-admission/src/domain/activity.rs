//! Per-user windowed activity counters.
//!
//! Three independent windows feed the admission checks:
//!
//! - attempt timestamps (accepted and rejected) for the volume and burst
//!   checks
//! - accepted magnitudes for the score-velocity check
//! - the last accepted timestamp for the spacing check
//!
//! Entries expire by sliding window; pruning happens on access, so idle
//! users cost nothing.

use shared_types::{Score, Timestamp};
use std::collections::VecDeque;

/// One user's trailing activity.
#[derive(Debug, Default)]
pub struct UserActivity {
    /// When this user's last accepted action committed.
    last_accepted_at: Option<Timestamp>,

    /// Timestamps of all admission attempts, oldest first.
    attempts: VecDeque<Timestamp>,

    /// (timestamp, magnitude) of accepted deltas, oldest first.
    accepted: VecDeque<(Timestamp, Score)>,
}

impl UserActivity {
    /// Drops entries older than the given retention horizons.
    pub fn prune(&mut self, now: Timestamp, attempt_horizon_ms: u64, accepted_horizon_ms: u64) {
        let attempt_cutoff = now.saturating_sub(attempt_horizon_ms);
        while self.attempts.front().is_some_and(|&t| t <= attempt_cutoff) {
            self.attempts.pop_front();
        }

        let accepted_cutoff = now.saturating_sub(accepted_horizon_ms);
        while self
            .accepted
            .front()
            .is_some_and(|&(t, _)| t <= accepted_cutoff)
        {
            self.accepted.pop_front();
        }
    }

    /// Attempts within the trailing `window_ms` (assumes pruned state).
    #[must_use]
    pub fn attempts_in(&self, now: Timestamp, window_ms: u64) -> u32 {
        let cutoff = now.saturating_sub(window_ms);
        self.attempts.iter().filter(|&&t| t > cutoff).count() as u32
    }

    /// Sum of accepted magnitudes within the trailing `window_ms`
    /// (absolute values: losing score fast is as suspicious as gaining it).
    #[must_use]
    pub fn accepted_magnitude_in(&self, now: Timestamp, window_ms: u64) -> Score {
        let cutoff = now.saturating_sub(window_ms);
        self.accepted
            .iter()
            .filter(|&&(t, _)| t > cutoff)
            .map(|&(_, m)| m.saturating_abs())
            .fold(0, Score::saturating_add)
    }

    /// Milliseconds since the last accepted action, if any.
    #[must_use]
    pub fn since_last_accepted(&self, now: Timestamp) -> Option<u64> {
        self.last_accepted_at.map(|t| now.saturating_sub(t))
    }

    /// Records an admission attempt (accepted or rejected).
    pub fn record_attempt(&mut self, now: Timestamp) {
        self.attempts.push_back(now);
    }

    /// Records a committed accepted delta.
    pub fn record_accepted(&mut self, now: Timestamp, magnitude: Score) {
        self.last_accepted_at = Some(now);
        self.accepted.push_back((now, magnitude));
    }
}
