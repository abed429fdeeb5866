//! Per-connection state.

use serde::{Deserialize, Serialize};
use shared_bus::{ChangeEvent, EventTopic};
use shared_types::{Timestamp, UserId};
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identifier of one observer connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh connection id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Transport accepted, nothing else yet.
    Connecting,
    /// Bound to a user id via the Authenticator.
    Authenticated,
    /// Subscribed and receiving deliveries.
    Active,
    /// No inbound traffic for the idle period; still receiving.
    Idle,
    /// Terminal.
    Disconnected,
}

/// Fanout tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Outbound buffer capacity per connection. A full buffer marks the
    /// consumer slow and disconnects it.
    pub outbound_buffer: usize,
    /// Inactivity period before `Active → Idle` (ms).
    pub idle_after_ms: u64,
    /// Inactivity ceiling before `Idle → Disconnected` (ms).
    pub disconnect_after_ms: u64,
    /// Maximum topics one connection may subscribe to.
    pub max_topics_per_connection: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            idle_after_ms: 60_000,
            disconnect_after_ms: 300_000,
            max_topics_per_connection: 8,
        }
    }
}

/// One tracked connection.
///
/// Owned by the `ConnectionRegistry`; the receiving half of `outbound`
/// lives with the transport side.
#[derive(Debug)]
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub state: ConnectionState,
    /// Bound identity, once authenticated.
    pub user_id: Option<UserId>,
    /// Topics this connection receives.
    pub topics: HashSet<EventTopic>,
    /// Last inbound client traffic (ms).
    pub last_activity: Timestamp,
    /// Highest sequence the client acknowledged.
    pub last_acked: u64,
    /// Highest sequence pushed to this connection (duplicate guard).
    pub last_delivered: u64,
    /// Outbound event channel (bounded).
    pub outbound: mpsc::Sender<ChangeEvent>,
}

impl Connection {
    pub(crate) fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<ChangeEvent>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            state: ConnectionState::Connecting,
            user_id: None,
            topics: HashSet::new(),
            last_activity: now,
            last_acked: 0,
            last_delivered: 0,
            outbound,
        }
    }

    /// Registers inbound client traffic: refreshes the inactivity clock
    /// and wakes an idle connection.
    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.last_activity = now;
        if self.state == ConnectionState::Idle {
            self.state = ConnectionState::Active;
        }
    }

    /// Whether this connection currently receives deliveries.
    pub(crate) fn is_receiving(&self) -> bool {
        matches!(self.state, ConnectionState::Active | ConnectionState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_wakes_idle() {
        let (tx, _rx) = mpsc::channel(4);
        let mut conn = Connection::new(ConnectionId::generate(), tx, 1_000);
        conn.state = ConnectionState::Idle;

        conn.touch(5_000);
        assert_eq!(conn.state, ConnectionState::Active);
        assert_eq!(conn.last_activity, 5_000);
    }

    #[test]
    fn test_touch_does_not_activate_connecting() {
        let (tx, _rx) = mpsc::channel(4);
        let mut conn = Connection::new(ConnectionId::generate(), tx, 1_000);

        conn.touch(5_000);
        assert_eq!(conn.state, ConnectionState::Connecting);
    }

    #[test]
    fn test_receiving_states() {
        let (tx, _rx) = mpsc::channel(4);
        let mut conn = Connection::new(ConnectionId::generate(), tx, 0);
        assert!(!conn.is_receiving());

        conn.state = ConnectionState::Active;
        assert!(conn.is_receiving());
        conn.state = ConnectionState::Idle;
        assert!(conn.is_receiving());
        conn.state = ConnectionState::Disconnected;
        assert!(!conn.is_receiving());
    }
}
