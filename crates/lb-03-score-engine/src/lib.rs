//! # Score Mutator Subsystem
//!
//! The consistency-critical path: applies an accepted delta to a user's
//! score exactly once, serialized per user.
//!
//! ## Atomic Unit
//!
//! Inside one per-user critical section and one store transaction:
//! token check, admission re-check (never trusted from an earlier call),
//! read current score, write the new score with optimistic versioning,
//! append the `ScoreHistoryEvent`, mark the token `Consumed`. Any failure
//! aborts the whole unit: no partial score change, no history row, token
//! left in its pre-call state (except legitimate `Expired` transitions).
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Same-user mutations never interleave | `mutator.rs` - keyed async mutex |
//! | Token consumed exactly once | token check + `mark_consumed` inside the section |
//! | No lost updates across users | store version CAS (`commit_mutation`) |
//! | `StoreConflict` invisible to clients | bounded retry from the read step, then `MutationFailed` |
//!
//! Different users run fully in parallel; there is no global lock here.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::memory_store::MemoryStore;
pub use domain::mutator::{MutationConfig, MutationOutcome, ScoreMutator};
pub use ports::outbound::{CommitRecord, DurableStore, StoreError, StoredUser};
