//! The ranked index.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::errors::RankedUser;
use shared_types::{LeaderboardEntry, Score, UserId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Size of the top-K slice whose membership changes are reported to
    /// the public leaderboard channel.
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { top_k: 100 }
    }
}

/// Ordering key: score descending, then user id ascending.
///
/// The secondary key is the engine's documented tie-break policy; it makes
/// rank a total order.
#[derive(Clone, Debug, PartialEq, Eq)]
struct RankKey {
    score: Score,
    user_id: UserId,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.user_id.cmp(&other.user_id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-user entry metadata.
#[derive(Clone, Debug)]
struct EntryMeta {
    score: Score,
    version: u64,
}

#[derive(Debug, Default)]
struct IndexInner {
    /// Total order over all ranked users.
    ordered: BTreeSet<RankKey>,
    /// Score/version lookup by user id.
    entries: BTreeMap<UserId, EntryMeta>,
}

impl IndexInner {
    /// 1-based rank of a key already present in `ordered`.
    fn rank_of_key(&self, key: &RankKey) -> u64 {
        self.ordered.range(..key.clone()).count() as u64 + 1
    }
}

/// Result of repositioning one user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    /// Repositioned user.
    pub user_id: UserId,
    /// Score after the update.
    pub score: Score,
    /// Rank before the update; `None` for a user entering the index.
    pub previous_rank: Option<u64>,
    /// Rank after the update.
    pub new_rank: u64,
    /// Whether the top-K slice changed.
    pub top_k_changed: bool,
}

/// The leaderboard index.
///
/// Holds every ranked user (the tail answers "my rank" queries); the
/// top-K slice is the only part requiring global ordering guarantees on
/// the way out.
pub struct RankIndex {
    inner: RwLock<IndexInner>,
    config: IndexConfig,
}

impl RankIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new(config: IndexConfig) -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
            config,
        }
    }

    /// Repositions a user after a committed mutation.
    ///
    /// Runs logically after the mutation's atomic unit commits; `version`
    /// is the per-user version that commit produced. Returns `None` for a
    /// stale update (a newer version was already applied) - the current
    /// score stays authoritative.
    pub fn update(&self, user_id: &UserId, new_score: Score, version: u64) -> Option<RankChange> {
        let mut inner = self.inner.write();

        let previous = inner.entries.get(user_id).cloned();
        if let Some(meta) = &previous {
            if version <= meta.version {
                debug!(
                    user_id = %user_id,
                    version,
                    applied = meta.version,
                    "Stale index update ignored"
                );
                return None;
            }
        }

        let previous_rank = previous.as_ref().map(|meta| {
            let old_key = RankKey {
                score: meta.score,
                user_id: user_id.clone(),
            };
            let rank = inner.rank_of_key(&old_key);
            inner.ordered.remove(&old_key);
            rank
        });

        let new_key = RankKey {
            score: new_score,
            user_id: user_id.clone(),
        };
        inner.ordered.insert(new_key.clone());
        inner.entries.insert(
            user_id.clone(),
            EntryMeta {
                score: new_score,
                version,
            },
        );

        let new_rank = inner.rank_of_key(&new_key);
        // Only entries between the old and new position shift; ranks are
        // derived on read, so membership of the top-K slice is the only
        // thing to report.
        let k = self.config.top_k as u64;
        let top_k_changed =
            new_rank <= k || previous_rank.is_some_and(|p| p <= k);

        Some(RankChange {
            user_id: user_id.clone(),
            score: new_score,
            previous_rank,
            new_rank,
            top_k_changed,
        })
    }

    /// The first `k` entries in rank order.
    #[must_use]
    pub fn top_k(&self, k: usize) -> Vec<LeaderboardEntry> {
        let inner = self.inner.read();
        inner
            .ordered
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, key)| LeaderboardEntry {
                user_id: key.user_id.clone(),
                score: key.score,
                rank: i as u64 + 1,
                sequence: inner
                    .entries
                    .get(&key.user_id)
                    .map_or(0, |meta| meta.version),
            })
            .collect()
    }

    /// A single user's score and rank; `None` when the user is not ranked
    /// (a normal outcome, not an error).
    #[must_use]
    pub fn rank_of(&self, user_id: &UserId) -> Option<RankedUser> {
        let inner = self.inner.read();
        let meta = inner.entries.get(user_id)?;
        let key = RankKey {
            score: meta.score,
            user_id: user_id.clone(),
        };
        Some(RankedUser {
            score: meta.score,
            rank: inner.rank_of_key(&key),
        })
    }

    /// Number of ranked users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when nobody is ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Configured top-K slice size.
    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }
}
