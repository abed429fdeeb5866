//! # Leaderboard Index Subsystem
//!
//! Ordered in-memory structure over all users' scores, authoritative for
//! top-K queries and able to answer any user's rank.
//!
//! ## Ranking Order
//!
//! Descending score; ties broken by ascending user id. The tie-break is a
//! documented policy decision (the secondary key makes rank a total
//! order), implemented once in `RankKey::cmp`.
//!
//! ## Ordering Under Concurrency
//!
//! Updates carry the per-user store version. An update older than the
//! version already applied is ignored: rank is re-derived from current
//! scores, never from arrival order. Reads take a snapshot under a short
//! read lock and never block on a mutation longer than the time to
//! install that mutation's effect.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;

pub use domain::index::{IndexConfig, RankChange, RankIndex};
