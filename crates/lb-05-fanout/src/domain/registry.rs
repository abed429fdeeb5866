//! The connection registry: explicit, owned, process-wide subscriber state.

use crate::domain::connection::{Connection, ConnectionId, ConnectionState, FanoutConfig};
use crate::domain::errors::FanoutError;
use dashmap::DashMap;
use shared_bus::{ChangeEvent, EventTopic, ReplayError, ReplaySource};
use shared_types::{Authenticator, TimeSource, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Handed to the transport side on connect: the id to operate the
/// connection with, and the receiving half of its event channel.
pub struct SubscriberHandle {
    /// Registry id of the new connection.
    pub connection_id: ConnectionId,
    /// Ordered event stream for this connection.
    pub receiver: mpsc::Receiver<ChangeEvent>,
}

/// Tracks who is subscribed to what.
///
/// Populated on connect, pruned on disconnect. Per-connection operations
/// lock only that connection's shard; delivery iterates without a global
/// lock.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    auth: Arc<dyn Authenticator>,
    backlog: Arc<dyn ReplaySource>,
    time: Arc<dyn TimeSource>,
    config: FanoutConfig,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new(
        auth: Arc<dyn Authenticator>,
        backlog: Arc<dyn ReplaySource>,
        time: Arc<dyn TimeSource>,
        config: FanoutConfig,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            auth,
            backlog,
            time,
            config,
        }
    }

    /// Accepts a new connection in `Connecting` state.
    pub fn connect(&self) -> SubscriberHandle {
        let id = ConnectionId::generate();
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer);
        self.connections
            .insert(id, Connection::new(id, tx, self.time.now()));

        info!(connection_id = %id, "Connection accepted");
        SubscriberHandle {
            connection_id: id,
            receiver: rx,
        }
    }

    /// Binds a connection to a user id via the Authenticator.
    ///
    /// # Errors
    ///
    /// `UnknownConnection` or `Unauthenticated`.
    pub fn authenticate(
        &self,
        id: &ConnectionId,
        credential: &str,
    ) -> Result<UserId, FanoutError> {
        let mut conn = self
            .connections
            .get_mut(id)
            .ok_or(FanoutError::UnknownConnection(*id))?;

        let Some(user_id) = self.auth.verify(credential) else {
            return Err(FanoutError::Unauthenticated);
        };

        conn.user_id = Some(user_id.clone());
        if conn.state == ConnectionState::Connecting {
            conn.state = ConnectionState::Authenticated;
        }
        conn.touch(self.time.now());

        debug!(connection_id = %id, user_id = %user_id, "Connection authenticated");
        Ok(user_id)
    }

    /// Subscribes a connection to a topic, replays the missed backlog
    /// range, and activates the connection.
    ///
    /// Personal channels require authentication and must match the bound
    /// user; the public leaderboard channel is open to every connection.
    ///
    /// Catch-up runs under the connection's guard: the missed range
    /// (above the connection's ack/delivery watermark) is pushed before
    /// live delivery can reach the connection, so the subscriber observes
    /// one gap-free ascending sequence. Overlap between replay and live
    /// delivery is resolved by the per-connection duplicate guard.
    ///
    /// # Returns
    ///
    /// The number of replayed events.
    ///
    /// # Errors
    ///
    /// `UnknownConnection`, `PersonalChannelRequiresAuth`,
    /// `ForeignPersonalChannel`, `TooManyTopics`, or `ResyncRequired`
    /// when the missed range is no longer retained (the subscription is
    /// not installed; the client must resync and ack before retrying).
    pub fn subscribe(&self, id: &ConnectionId, topic: EventTopic) -> Result<usize, FanoutError> {
        let mut conn = self
            .connections
            .get_mut(id)
            .ok_or(FanoutError::UnknownConnection(*id))?;

        if let EventTopic::User(owner) = &topic {
            match &conn.user_id {
                None => return Err(FanoutError::PersonalChannelRequiresAuth),
                Some(bound) if bound != owner => {
                    return Err(FanoutError::ForeignPersonalChannel);
                }
                Some(_) => {}
            }
        }

        if !conn.topics.contains(&topic)
            && conn.topics.len() >= self.config.max_topics_per_connection
        {
            return Err(FanoutError::TooManyTopics {
                limit: self.config.max_topics_per_connection,
            });
        }

        // Fetch the missed range before installing the topic; a failed
        // replay leaves the subscription state untouched.
        let watermark = conn.last_acked.max(conn.last_delivered);
        let missed = self.backlog.replay_after(watermark).map_err(
            |ReplayError::TooFarBehind {
                 oldest_retained, ..
             }| FanoutError::ResyncRequired { oldest_retained },
        )?;

        conn.topics.insert(topic.clone());

        let mut replayed = 0;
        for event in missed {
            if !conn.topics.contains(&event.topic()) {
                continue;
            }
            if event.sequence <= conn.last_delivered {
                continue;
            }
            match conn.outbound.try_send(event.clone()) {
                Ok(()) => {
                    conn.last_delivered = event.sequence;
                    replayed += 1;
                }
                Err(_) => {
                    drop(conn);
                    self.disconnect(id);
                    warn!(connection_id = %id, "Consumer overflowed during replay; disconnected");
                    return Ok(replayed);
                }
            }
        }

        conn.touch(self.time.now());
        if matches!(
            conn.state,
            ConnectionState::Connecting | ConnectionState::Authenticated
        ) {
            conn.state = ConnectionState::Active;
        }

        debug!(connection_id = %id, topic = ?topic, replayed, "Subscribed");
        Ok(replayed)
    }

    /// Removes a topic subscription.
    ///
    /// # Errors
    ///
    /// `UnknownConnection`.
    pub fn unsubscribe(&self, id: &ConnectionId, topic: &EventTopic) -> Result<bool, FanoutError> {
        let mut conn = self
            .connections
            .get_mut(id)
            .ok_or(FanoutError::UnknownConnection(*id))?;
        conn.touch(self.time.now());
        let removed = conn.topics.remove(topic);
        debug!(connection_id = %id, topic = ?topic, removed, "Unsubscribed");
        Ok(removed)
    }

    /// Records the client's acknowledgement watermark.
    ///
    /// # Errors
    ///
    /// `UnknownConnection`.
    pub fn ack(&self, id: &ConnectionId, sequence: u64) -> Result<(), FanoutError> {
        let mut conn = self
            .connections
            .get_mut(id)
            .ok_or(FanoutError::UnknownConnection(*id))?;
        conn.touch(self.time.now());
        conn.last_acked = conn.last_acked.max(sequence);
        Ok(())
    }

    /// The client's acknowledgement watermark.
    ///
    /// # Errors
    ///
    /// `UnknownConnection`.
    pub fn last_acked(&self, id: &ConnectionId) -> Result<u64, FanoutError> {
        self.connections
            .get(id)
            .map(|c| c.last_acked)
            .ok_or(FanoutError::UnknownConnection(*id))
    }

    /// Delivers one live event to every receiving subscriber of its topic.
    ///
    /// Slow consumers (full outbound buffer) and closed transports are
    /// disconnected; they never backpressure the publisher.
    ///
    /// # Returns
    ///
    /// The number of connections the event was queued for.
    pub fn deliver(&self, event: &ChangeEvent) -> usize {
        let topic = event.topic();
        let mut delivered = 0;
        let mut to_drop: Vec<(ConnectionId, &'static str)> = Vec::new();

        for mut conn in self.connections.iter_mut() {
            if !conn.is_receiving() || !conn.topics.contains(&topic) {
                continue;
            }
            if event.sequence <= conn.last_delivered {
                // At-least-once upstream; exactly-once per connection.
                continue;
            }
            match conn.outbound.try_send(event.clone()) {
                Ok(()) => {
                    conn.last_delivered = event.sequence;
                    delivered += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    to_drop.push((conn.id, "slow consumer"));
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    to_drop.push((conn.id, "transport closed"));
                }
            }
        }

        for (id, reason) in to_drop {
            warn!(connection_id = %id, reason, "Disconnecting subscriber");
            self.disconnect(&id);
        }

        delivered
    }

    /// Transport-level close: terminal from any state; the connection is
    /// pruned from the registry.
    pub fn disconnect(&self, id: &ConnectionId) {
        if let Some((_, conn)) = self.connections.remove(id) {
            info!(
                connection_id = %id,
                user_id = ?conn.user_id,
                "Connection disconnected"
            );
        }
    }

    /// Inactivity sweep: `Active → Idle` past `idle_after_ms`,
    /// `Idle → Disconnected` past `disconnect_after_ms`.
    ///
    /// # Returns
    ///
    /// `(idled, disconnected)` connection counts.
    pub fn tick(&self) -> (usize, usize) {
        let now = self.time.now();
        let mut idled = 0;
        let mut to_disconnect = Vec::new();

        for mut conn in self.connections.iter_mut() {
            let inactive = now.saturating_sub(conn.last_activity);
            match conn.state {
                ConnectionState::Active if inactive >= self.config.idle_after_ms => {
                    conn.state = ConnectionState::Idle;
                    idled += 1;
                    debug!(connection_id = %conn.id, inactive_ms = inactive, "Connection idled");
                }
                ConnectionState::Idle if inactive >= self.config.disconnect_after_ms => {
                    to_disconnect.push(conn.id);
                }
                _ => {}
            }
        }

        let disconnected = to_disconnect.len();
        for id in to_disconnect {
            self.disconnect(&id);
        }
        (idled, disconnected)
    }

    /// Current state of a connection, if tracked.
    #[must_use]
    pub fn state(&self, id: &ConnectionId) -> Option<ConnectionState> {
        self.connections.get(id).map(|c| c.state)
    }

    /// Number of tracked connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Fanout configuration.
    #[must_use]
    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }
}
