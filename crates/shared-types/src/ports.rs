//! Collaborator ports consumed by the engine.
//!
//! Credential verification and wall-clock time are external concerns;
//! abstracting them keeps every subsystem testable with deterministic
//! implementations.

use crate::entities::{Timestamp, UserId};

/// Maps bearer credentials to user identities.
///
/// Credential issuance and verification live outside the engine; this is
/// the contract the engine consumes.
pub trait Authenticator: Send + Sync {
    /// Resolves a credential to a user id.
    ///
    /// # Returns
    ///
    /// - `Some(user_id)` for a valid credential
    /// - `None` for anything else (unauthenticated)
    fn verify(&self, credential: &str) -> Option<UserId>;

    /// Whether the identity provider knows this user id at all.
    ///
    /// Used by the token issuer to refuse minting for unknown users.
    fn knows_user(&self, user_id: &UserId) -> bool;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Deterministic time source for tests.
///
/// Not gated behind `cfg(test)`: downstream crates and the unified test
/// suite drive it too.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    time: std::sync::atomic::AtomicU64,
}

impl MockTimeSource {
    /// Creates a mock clock starting at `initial` milliseconds.
    #[must_use]
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: std::sync::atomic::AtomicU64::new(initial),
        }
    }

    /// Advances the clock by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, time: Timestamp) {
        self.time.store(time, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(std::sync::atomic::Ordering::SeqCst)
    }
}
