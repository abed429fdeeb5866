//! # Leaderboard Engine Runtime
//!
//! Assembles the subsystems into one engine and exposes the external
//! interface:
//!
//! - `issue_action_token` / `submit_action` - the mutation pipeline
//! - `top_k` / `user_rank` - index reads, bypassing mutation
//! - `connect` / `authenticate` / `subscribe` / `unsubscribe` / `ack` -
//!   the subscription protocol
//!
//! ## Commit Flow
//!
//! ```text
//! Issuer ──token──→ client ──submit──→ Mutator (per-user atomic unit)
//!                                         │ commit
//!                                         ▼
//!                         post-commit section (short, global):
//!                         Rank Index update + sequence assignment
//!                                         │
//!                                         ▼
//!                              Change Bus ──→ Fanout dispatch ──→ subscribers
//! ```
//!
//! The post-commit section is the engine's second critical section; it is
//! entered only after the per-user mutation lock is released, so per-user
//! contention never becomes global contention.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod engine;
pub mod telemetry;

pub use adapters::auth::StaticAuthenticator;
pub use config::{ConfigError, EngineConfig};
pub use engine::{IssuedToken, LeaderboardEngine, SubmitReceipt};
