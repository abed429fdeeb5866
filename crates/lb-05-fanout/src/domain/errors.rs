//! Fanout error types.

use crate::domain::connection::ConnectionId;
use thiserror::Error;

/// Errors from subscription and delivery operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanoutError {
    /// No connection with this id (never existed, or already pruned).
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The credential did not resolve to a user.
    #[error("credential rejected by the authenticator")]
    Unauthenticated,

    /// Personal channels require an authenticated connection.
    #[error("personal channel requires authentication")]
    PersonalChannelRequiresAuth,

    /// An authenticated connection may only follow its own personal
    /// channel.
    #[error("connection is bound to a different user")]
    ForeignPersonalChannel,

    /// Per-connection topic cap reached.
    #[error("too many topics for this connection (limit {limit})")]
    TooManyTopics {
        /// Configured cap.
        limit: usize,
    },

    /// The missed range is no longer in the backlog; the client must do a
    /// full resynchronization (fresh top-K / rank read) before
    /// resubscribing.
    #[error("too far behind for replay; oldest retained sequence is {oldest_retained}")]
    ResyncRequired {
        /// Oldest sequence still replayable.
        oldest_retained: u64,
    },
}
