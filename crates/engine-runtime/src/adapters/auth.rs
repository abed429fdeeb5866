//! Static authenticator adapter.
//!
//! Credential issuance and verification are external collaborators; this
//! adapter stands in for them with a fixed credential → user map. Good
//! enough for single-node deployments and tests.

use parking_lot::RwLock;
use shared_types::{Authenticator, UserId};
use std::collections::HashMap;

/// Fixed-map authenticator.
#[derive(Debug, Default)]
pub struct StaticAuthenticator {
    credentials: RwLock<HashMap<String, UserId>>,
}

impl StaticAuthenticator {
    /// Creates an empty authenticator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a credential for a user.
    pub fn register(&self, credential: impl Into<String>, user_id: UserId) {
        self.credentials.write().insert(credential.into(), user_id);
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_user(self, credential: impl Into<String>, user_id: UserId) -> Self {
        self.register(credential, user_id);
        self
    }
}

impl Authenticator for StaticAuthenticator {
    fn verify(&self, credential: &str) -> Option<UserId> {
        self.credentials.read().get(credential).cloned()
    }

    fn knows_user(&self, user_id: &UserId) -> bool {
        self.credentials.read().values().any(|u| u == user_id)
    }
}
