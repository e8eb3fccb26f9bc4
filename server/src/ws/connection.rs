use std::sync::{Arc, OnceLock};

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use crate::auth::middleware::DEFAULT_ROLE;
use crate::error::HubError;

/// Opaque per-session identifier. Reconnects always get a fresh one.
pub type ConnectionId = Uuid;

/// Receiving half of a connection's outbox, drained only by its writer task.
pub type Outbox = mpsc::Receiver<Utf8Bytes>;

/// Why a connection was torn down. Picks the close code sent to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed, or the server is shutting down.
    Normal,
    /// Outbox was full when the hub tried to deliver.
    Overflow,
    /// Nothing arrived before the read deadline.
    KeepaliveTimeout,
    /// A read or write on the transport failed.
    TransportError,
}

impl CloseReason {
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Normal | Self::TransportError => 1000,
            Self::KeepaliveTimeout => 1001,
            Self::Overflow => 1008,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "closing",
            Self::Overflow => "client too slow",
            Self::KeepaliveTimeout => "keepalive timeout",
            Self::TransportError => "transport error",
        }
    }
}

/// Handle to one live client session.
///
/// The hub and any number of producers hold `Arc<Connection>` and push
/// pre-serialized frames with [`Connection::push`]; the session's writer task
/// is the sole consumer of the matching [`Outbox`]. Both session loops watch
/// the same cancellation token, so whichever side calls [`Connection::close`]
/// first stops the other.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    /// Empty for anonymous sessions.
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    outbox: mpsc::Sender<Utf8Bytes>,
    shutdown: CancellationToken,
    close_reason: OnceLock<CloseReason>,
}

/// Public view of a connection for introspection endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub connection_id: ConnectionId,
    pub user_id: String,
    pub user_role: String,
    pub joined_at: DateTime<Utc>,
}

impl Connection {
    /// Create a connection and its outbox. An empty role becomes `guest`.
    pub fn new(
        user_id: impl Into<String>,
        role: impl Into<String>,
        outbox_capacity: usize,
    ) -> (Arc<Self>, Outbox) {
        let (tx, rx) = mpsc::channel(outbox_capacity.max(1));
        let role = role.into();
        let conn = Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            role: if role.is_empty() {
                DEFAULT_ROLE.to_string()
            } else {
                role
            },
            joined_at: Utc::now(),
            outbox: tx,
            shutdown: CancellationToken::new(),
            close_reason: OnceLock::new(),
        };
        (Arc::new(conn), rx)
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }

    /// Enqueue a frame without waiting.
    pub fn push(&self, frame: Utf8Bytes) -> Result<(), HubError> {
        if self.is_closed() {
            return Err(HubError::ConnectionClosed);
        }
        self.outbox.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => HubError::MailboxOverflow,
            TrySendError::Closed(_) => HubError::ConnectionClosed,
        })
    }

    /// Signal both session loops to stop. Only the first call records its
    /// reason; later calls are no-ops. Returns whether this call did the work.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self.close_reason.set(reason).is_ok();
        self.shutdown.cancel();
        first
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Reason recorded by the first [`close`](Self::close), if any.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Resolves once the connection has been closed from any side.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }

    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            connection_id: self.id,
            user_id: self.user_id.clone(),
            user_role: self.role.clone(),
            joined_at: self.joined_at,
        }
    }
}
