//! # Subscription Fanout Subsystem
//!
//! Tracks live observer connections and delivers change events to the
//! relevant subscribers in commit order.
//!
//! ## Connection State Machine
//!
//! ```text
//! Connecting ──authenticate──→ Authenticated ──subscribe──→ Active ⇄ Idle
//!      │                             │                        │       │
//!      └──────── subscribe (public channel only) ──→ Active   │       │
//!                                                             ▼       ▼
//!                                  close / slow consumer → Disconnected (terminal)
//! ```
//!
//! `Active → Idle` fires after the configured inactivity period;
//! `Idle → Active` on any client traffic; `Idle → Disconnected` after the
//! longer inactivity ceiling; a transport-level close moves to
//! `Disconnected` from any state.
//!
//! ## Delivery Rules
//!
//! - One bounded outbound channel per connection, fed in ascending
//!   sequence order; duplicates (at-least-once upstream) are discarded
//!   per connection.
//! - A full channel means a persistently slow consumer: the connection is
//!   disconnected rather than allowed to backpressure the publisher.
//! - Events keep flowing while a connection is `Idle` - idleness tracks
//!   missing *inbound* traffic only and gates the disconnect ceiling.
//! - Reconnecting subscribers are replayed the backlog range they missed
//!   before live delivery resumes; too far behind means a full resync.
//!
//! The registry is explicit process-wide state with a defined lifecycle
//! (populated on connect, pruned on disconnect) - it is owned and passed
//! in, never a module-level singleton.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod dispatch;
pub mod domain;

pub use dispatch::{run_dispatch, run_sweeper};
pub use domain::connection::{ConnectionId, ConnectionState, FanoutConfig};
pub use domain::errors::FanoutError;
pub use domain::registry::{ConnectionRegistry, SubscriberHandle};
