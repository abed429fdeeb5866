//! # LiveBoard Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support.rs        # Shared engine fixture
//! └── integration/      # Cross-subsystem flows and properties
//!     ├── flows.rs      # End-to-end scenarios (issue → submit → observe)
//!     └── properties.rs # Consistency properties (idempotency,
//!                       # conservation, ordering, determinism)
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p lb-tests
//!
//! # By category
//! cargo test -p lb-tests integration::flows::
//! cargo test -p lb-tests integration::properties::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
pub mod support;
