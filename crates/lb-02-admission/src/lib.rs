//! # Admission Validator Subsystem
//!
//! Accepts or rejects a proposed score delta using per-user rate/velocity
//! state and a checksum proof. A `Reject` is a normal return value - it
//! never crosses the Score Mutator boundary as a panic - and every reject
//! is recorded through the `ReviewLog` port for later manual review.
//!
//! ## Check Order (short-circuit on first failure)
//!
//! | # | Check | Reject reason |
//! |---|-------|---------------|
//! | 1 | Proof over (user id, kind, magnitude, shared secret) | `ProofInvalid` |
//! | 2 | Magnitude within per-action cap | `MagnitudeExceeded` |
//! | 3 | Spacing since last *accepted* action | `TooFrequent` |
//! | 4 | Attempts in the trailing volume window | `VolumeExceeded` |
//! | 5 | Burst count + score velocity | `PatternSuspicious` |
//!
//! Counters are per-user, windowed, and expire automatically. Attempts are
//! recorded for accepted AND rejected submissions, so probing with invalid
//! requests still burns rate budget.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::review_log::InMemoryReviewLog;
pub use domain::validator::{AdmissionConfig, AdmissionDecision, AdmissionValidator};
pub use ports::outbound::{FlaggedSubmission, ReviewLog};
