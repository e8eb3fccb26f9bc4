//! Real-time notification hub.
//!
//! `envelope` is the wire format, `connection` the per-session handle and
//! outbox, `hub` the registry, `broadcast` the delivery strategies, `actor`
//! the per-session loops, and `handler` the HTTP surface.

pub mod actor;
pub mod broadcast;
pub mod connection;
pub mod envelope;
pub mod handler;
pub mod hub;
pub mod protocol;

pub use connection::{ClientInfo, CloseReason, Connection, ConnectionId, Outbox};
pub use envelope::{Envelope, MessageType, Payload};
pub use hub::{Hub, HubStats};
