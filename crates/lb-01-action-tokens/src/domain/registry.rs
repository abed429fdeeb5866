//! Token registry: pending-token storage and the consume transition.

use dashmap::DashMap;
use shared_types::{ActionToken, EngineError, Timestamp, TokenId, TokenState, UserId};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Registry of issued tokens, keyed by token id.
///
/// Thread-safe; per-token operations lock only that token's shard. The
/// Score Mutator's per-user serialization guarantees no two consumption
/// attempts for the same token race each other.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    /// All known tokens.
    tokens: DashMap<TokenId, ActionToken>,

    /// Pending tokens per user (bounds token flooding).
    pending_counts: DashMap<UserId, usize>,
}

impl TokenRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a freshly issued pending token.
    pub(crate) fn insert(&self, token: ActionToken) {
        *self.pending_counts.entry(token.user_id.clone()).or_insert(0) += 1;
        self.tokens.insert(token.id, token);
    }

    /// Number of pending tokens currently held by `user_id`.
    #[must_use]
    pub fn pending_count(&self, user_id: &UserId) -> usize {
        self.pending_counts.get(user_id).map_or(0, |c| *c)
    }

    /// Total tokens retained (any state).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no tokens are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Read-only lookup (state as currently recorded, no lazy expiry).
    #[must_use]
    pub fn get(&self, token_id: &TokenId) -> Option<ActionToken> {
        self.tokens.get(token_id).map(|t| t.clone())
    }

    /// Validates that a token is consumable right now.
    ///
    /// Run inside the Score Mutator's atomic unit. Does not consume; the
    /// only state it writes is the legitimate lazy `Pending → Expired`
    /// transition for tokens read past their deadline.
    ///
    /// # Errors
    ///
    /// - `TokenInvalid` - unknown id, wrong owner, or secret mismatch
    /// - `TokenExpired` - deadline passed before consumption
    /// - `TokenAlreadyConsumed` - a committed mutation already used it
    pub fn check(
        &self,
        token_id: &TokenId,
        secret: &str,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Err(EngineError::TokenInvalid(*token_id));
        };

        match entry.state {
            TokenState::Consumed => return Err(EngineError::TokenAlreadyConsumed(*token_id)),
            TokenState::Expired => return Err(EngineError::TokenExpired(*token_id)),
            TokenState::Pending => {}
        }

        if entry.is_past_deadline(now) {
            entry.state = TokenState::Expired;
            let user = entry.user_id.clone();
            drop(entry);
            self.decrement_pending(&user);
            debug!(token_id = %token_id, "Token expired lazily on read");
            return Err(EngineError::TokenExpired(*token_id));
        }

        if &entry.user_id != user_id {
            return Err(EngineError::TokenInvalid(*token_id));
        }

        // Constant-time secret comparison.
        let matches: bool = entry
            .secret
            .as_bytes()
            .ct_eq(secret.as_bytes())
            .into();
        if !matches {
            return Err(EngineError::TokenInvalid(*token_id));
        }

        Ok(())
    }

    /// Commits the `Pending → Consumed` transition.
    ///
    /// Called exactly once per token, after the score mutation it gates
    /// has committed, still inside the mutator's per-user critical
    /// section.
    ///
    /// # Errors
    ///
    /// Mirrors `check`: the token must still be `Pending`.
    pub fn mark_consumed(&self, token_id: &TokenId) -> Result<ActionToken, EngineError> {
        let Some(mut entry) = self.tokens.get_mut(token_id) else {
            return Err(EngineError::TokenInvalid(*token_id));
        };

        match entry.state {
            TokenState::Consumed => return Err(EngineError::TokenAlreadyConsumed(*token_id)),
            TokenState::Expired => return Err(EngineError::TokenExpired(*token_id)),
            TokenState::Pending => {}
        }

        entry.state = TokenState::Consumed;
        let token = entry.clone();
        drop(entry);
        self.decrement_pending(&token.user_id);
        debug!(token_id = %token_id, user_id = %token.user_id, "Token consumed");
        Ok(token)
    }

    /// Sweeps the registry.
    ///
    /// Transitions past-deadline pending tokens to `Expired` and drops
    /// tokens past their deadline by more than `retention_ms` (consumed
    /// tokens are kept inside the retention window so replays still get
    /// `TokenAlreadyConsumed` rather than `TokenInvalid`).
    ///
    /// # Returns
    ///
    /// The number of tokens removed.
    pub fn purge_expired(&self, now: Timestamp, retention_ms: u64) -> usize {
        let mut removed = 0;

        // Pass 1: lazy-expire pending tokens past their deadline.
        let mut newly_expired: Vec<UserId> = Vec::new();
        for mut entry in self.tokens.iter_mut() {
            if entry.state == TokenState::Pending && entry.is_past_deadline(now) {
                entry.state = TokenState::Expired;
                newly_expired.push(entry.user_id.clone());
            }
        }
        for user in newly_expired {
            self.decrement_pending(&user);
        }

        // Pass 2: drop tokens beyond the retention window.
        self.tokens.retain(|_, token| {
            let keep = now < token.expires_at.saturating_add(retention_ms);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!(removed, "Purged tokens past retention");
        }
        removed
    }

    fn decrement_pending(&self, user_id: &UserId) {
        if let Some(mut count) = self.pending_counts.get_mut(user_id) {
            *count = count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ActionKind;

    fn token(user: &str, expires_at: Timestamp) -> ActionToken {
        ActionToken {
            id: TokenId::generate(),
            user_id: UserId::new(user),
            kind: ActionKind::new("match_win"),
            secret: "ab".repeat(32),
            issued_at: 1_000,
            expires_at,
            state: TokenState::Pending,
        }
    }

    #[test]
    fn test_check_then_consume() {
        let registry = TokenRegistry::new();
        let t = token("alice", 10_000);
        let secret = t.secret.clone();
        let id = t.id;
        registry.insert(t);

        assert!(registry.check(&id, &secret, &UserId::new("alice"), 5_000).is_ok());
        registry.mark_consumed(&id).unwrap();

        assert_eq!(
            registry.check(&id, &secret, &UserId::new("alice"), 5_000),
            Err(EngineError::TokenAlreadyConsumed(id))
        );
        assert_eq!(registry.pending_count(&UserId::new("alice")), 0);
    }

    #[test]
    fn test_consume_is_exactly_once() {
        let registry = TokenRegistry::new();
        let t = token("alice", 10_000);
        let id = t.id;
        registry.insert(t);

        registry.mark_consumed(&id).unwrap();
        assert_eq!(
            registry.mark_consumed(&id),
            Err(EngineError::TokenAlreadyConsumed(id))
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let registry = TokenRegistry::new();
        let t = token("alice", 10_000);
        let id = t.id;
        registry.insert(t);

        assert_eq!(
            registry.check(&id, "deadbeef", &UserId::new("alice"), 5_000),
            Err(EngineError::TokenInvalid(id))
        );
    }

    #[test]
    fn test_wrong_owner_rejected() {
        let registry = TokenRegistry::new();
        let t = token("alice", 10_000);
        let secret = t.secret.clone();
        let id = t.id;
        registry.insert(t);

        assert_eq!(
            registry.check(&id, &secret, &UserId::new("mallory"), 5_000),
            Err(EngineError::TokenInvalid(id))
        );
    }

    #[test]
    fn test_lazy_expiry_on_read() {
        let registry = TokenRegistry::new();
        let t = token("alice", 10_000);
        let secret = t.secret.clone();
        let id = t.id;
        registry.insert(t);

        assert_eq!(
            registry.check(&id, &secret, &UserId::new("alice"), 10_000),
            Err(EngineError::TokenExpired(id))
        );
        // State transitioned, pending count released.
        assert_eq!(registry.get(&id).unwrap().state, TokenState::Expired);
        assert_eq!(registry.pending_count(&UserId::new("alice")), 0);

        // Expired is terminal even for a later in-window clock value.
        assert_eq!(
            registry.mark_consumed(&id),
            Err(EngineError::TokenExpired(id))
        );
    }

    #[test]
    fn test_unknown_token_invalid() {
        let registry = TokenRegistry::new();
        let id = TokenId::generate();
        assert_eq!(
            registry.check(&id, "x", &UserId::new("alice"), 0),
            Err(EngineError::TokenInvalid(id))
        );
    }

    #[test]
    fn test_purge_respects_retention() {
        let registry = TokenRegistry::new();
        let expired = token("alice", 10_000);
        let live = token("alice", 60_000);
        let expired_id = expired.id;
        let live_id = live.id;
        registry.insert(expired);
        registry.insert(live);

        // Within retention: expired token transitions but stays readable.
        assert_eq!(registry.purge_expired(11_000, 5_000), 0);
        assert_eq!(registry.get(&expired_id).unwrap().state, TokenState::Expired);

        // Past retention: dropped.
        assert_eq!(registry.purge_expired(20_000, 5_000), 1);
        assert!(registry.get(&expired_id).is_none());
        assert!(registry.get(&live_id).is_some());
        assert_eq!(registry.pending_count(&UserId::new("alice")), 1);
    }
}
