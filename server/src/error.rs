use thiserror::Error;

use crate::ws::envelope::MessageType;

/// Inbound frame could not be turned into an [`Envelope`](crate::ws::envelope::Envelope).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type `{0}`")]
    UnknownType(String),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidData {
        kind: MessageType,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the hub and the event API. Encoding failures never reach
/// callers; delivery logs them and reports zero recipients.
#[derive(Debug, Error)]
pub enum HubError {
    /// The connection's outbox is full; the caller evicts it.
    #[error("outbox full")]
    MailboxOverflow,

    /// The connection has already been torn down.
    #[error("connection closed")]
    ConnectionClosed,

    /// A required event field was missing or out of range.
    #[error("{0}")]
    Validation(String),
}

impl HubError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
