//! # Action Token Issuer Subsystem
//!
//! Mints single-use, time-bounded tokens binding a user to one pending
//! score-changing action, and tracks their lifecycle.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | A token is consumed at most once | `registry.rs` - `mark_consumed()` only from `Pending` |
//! | Expiry is lazy, on read | `registry.rs` - `check()` transitions past-deadline tokens |
//! | Secrets are unguessable | `issuer.rs` - 32 bytes from the OS RNG |
//! | Registry is bounded | per-user pending cap + `purge_expired()` sweep |
//!
//! ## Token Lifecycle
//!
//! ```text
//! [Pending] ──consume (atomic with the score mutation)──→ [Consumed]
//!     │
//!     └── deadline passed (lazy, on read) ──→ [Expired]
//! ```
//!
//! Consumption is split into `check()` and `mark_consumed()` so the Score
//! Mutator can run the check inside its atomic unit and commit the
//! transition together with the mutation: `check` never mutates state
//! except the legitimate lazy `Pending → Expired` transition.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;

pub use domain::issuer::{TokenConfig, TokenIssuer};
pub use domain::registry::TokenRegistry;
