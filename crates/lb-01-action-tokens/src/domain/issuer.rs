//! Token issuance.

use crate::domain::registry::TokenRegistry;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared_types::security::hex_encode;
use shared_types::{
    ActionKind, ActionToken, Authenticator, EngineError, TimeSource, TokenId, TokenState, UserId,
    DEFAULT_TOKEN_TTL_MS, TOKEN_SECRET_LEN,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Issuer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token time-to-live in milliseconds.
    pub ttl_ms: u64,
    /// Maximum pending tokens one user may hold.
    pub max_pending_per_user: usize,
    /// How long consumed/expired tokens stay queryable past their
    /// deadline, in milliseconds.
    pub retention_ms: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TOKEN_TTL_MS,
            max_pending_per_user: 32,
            retention_ms: 10 * 60 * 1000,
        }
    }
}

/// Mints single-use action tokens.
pub struct TokenIssuer {
    registry: Arc<TokenRegistry>,
    auth: Arc<dyn Authenticator>,
    time: Arc<dyn TimeSource>,
    config: TokenConfig,
}

impl TokenIssuer {
    /// Creates an issuer over a shared registry.
    pub fn new(
        registry: Arc<TokenRegistry>,
        auth: Arc<dyn Authenticator>,
        time: Arc<dyn TimeSource>,
        config: TokenConfig,
    ) -> Self {
        Self {
            registry,
            auth,
            time,
            config,
        }
    }

    /// Issues a pending token for one action by `user_id`.
    ///
    /// The returned token carries the single-use secret; it is shown to
    /// the client once and never again.
    ///
    /// # Errors
    ///
    /// - `IdentityInvalid` - the Authenticator does not know the user
    /// - `TooManyPendingTokens` - the per-user pending cap is reached
    pub fn issue(&self, user_id: &UserId, kind: ActionKind) -> Result<ActionToken, EngineError> {
        if !self.auth.knows_user(user_id) {
            warn!(user_id = %user_id, "Token requested for unknown identity");
            return Err(EngineError::IdentityInvalid(user_id.clone()));
        }

        let pending = self.registry.pending_count(user_id);
        if pending >= self.config.max_pending_per_user {
            return Err(EngineError::TooManyPendingTokens {
                user_id: user_id.clone(),
                pending,
                limit: self.config.max_pending_per_user,
            });
        }

        let now = self.time.now();
        let token = ActionToken {
            id: TokenId::generate(),
            user_id: user_id.clone(),
            kind,
            secret: generate_secret(),
            issued_at: now,
            expires_at: now + self.config.ttl_ms,
            state: TokenState::Pending,
        };

        self.registry.insert(token.clone());
        debug!(
            token_id = %token.id,
            user_id = %user_id,
            kind = %token.kind,
            expires_at = token.expires_at,
            "Action token issued"
        );
        Ok(token)
    }

    /// Sweeps expired tokens out of the registry.
    pub fn purge_expired(&self) -> usize {
        self.registry
            .purge_expired(self.time.now(), self.config.retention_ms)
    }

    /// The issuer's configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

/// 32 unguessable bytes from the OS RNG, hex-encoded.
fn generate_secret() -> String {
    let mut bytes = [0u8; TOKEN_SECRET_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}
