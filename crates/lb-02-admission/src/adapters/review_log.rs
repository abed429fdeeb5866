//! In-memory review log adapter.

use crate::ports::outbound::{FlaggedSubmission, ReviewLog};
use parking_lot::Mutex;
use tracing::warn;

/// Keeps flagged submissions in memory for inspection.
///
/// Production deployments would put a durable sink behind the same port;
/// the engine only requires that flags are recorded, not where.
#[derive(Debug, Default)]
pub struct InMemoryReviewLog {
    entries: Mutex<Vec<FlaggedSubmission>>,
}

impl InMemoryReviewLog {
    /// Creates an empty review log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flags recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing has been flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of all recorded flags, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FlaggedSubmission> {
        self.entries.lock().clone()
    }
}

impl ReviewLog for InMemoryReviewLog {
    fn record_flag(&self, flag: FlaggedSubmission) {
        warn!(
            user_id = %flag.user_id,
            token_id = %flag.token_id,
            magnitude = flag.magnitude,
            reason = %flag.reason,
            "Submission flagged for review"
        );
        self.entries.lock().push(flag);
    }
}
