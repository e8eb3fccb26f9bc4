use axum::extract::ws::Utf8Bytes;

use crate::error::HubError;
use crate::ws::connection::{CloseReason, Connection};
use crate::ws::envelope::Envelope;
use crate::ws::hub::Hub;

impl Hub {
    /// Deliver an envelope to every admitted connection.
    /// Returns how many connections accepted it.
    pub fn broadcast_all(&self, envelope: &Envelope) -> usize {
        self.fan_out(envelope, "all", |_| true)
    }

    /// Deliver an envelope to every session owned by `user_id`.
    pub fn send_to_user(&self, user_id: &str, envelope: &Envelope) -> usize {
        self.fan_out(envelope, "user", |c| c.user_id == user_id)
    }

    /// Deliver an envelope to every session tagged with `role`.
    pub fn send_to_role(&self, role: &str, envelope: &Envelope) -> usize {
        self.fan_out(envelope, "role", |c| c.role == role)
    }

    /// Deliver an envelope to a single connection, evicting it if its outbox is full.
    pub fn deliver_to(&self, conn: &Connection, envelope: &Envelope) -> bool {
        match encode_frame(envelope) {
            Some(frame) => self.push_frame(conn, frame),
            None => false,
        }
    }

    /// Serialize once, snapshot the matching connections, push to each.
    /// Never waits on a slow consumer: a full outbox gets its connection
    /// evicted and delivery moves on.
    fn fan_out(
        &self,
        envelope: &Envelope,
        label: &'static str,
        filter: impl Fn(&Connection) -> bool,
    ) -> usize {
        let Some(frame) = encode_frame(envelope) else {
            return 0;
        };

        let targets = self.snapshot(filter);
        let delivered = targets
            .iter()
            .filter(|conn| self.push_frame(conn, frame.clone()))
            .count();

        tracing::debug!(
            kind = %envelope.kind(),
            label,
            targets = targets.len(),
            delivered,
            "Fan-out complete"
        );
        delivered
    }

    fn push_frame(&self, conn: &Connection, frame: Utf8Bytes) -> bool {
        match conn.push(frame) {
            Ok(()) => {
                self.record_sent();
                true
            }
            Err(HubError::MailboxOverflow) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    user_id = %conn.user_id,
                    "Outbox full, evicting slow client"
                );
                self.record_overflow();
                self.evict_with(conn.id, CloseReason::Overflow);
                false
            }
            Err(e) => {
                // Closed between snapshot and push; its own teardown evicts it
                tracing::trace!(connection_id = %conn.id, error = %e, "Skipping closed connection");
                false
            }
        }
    }
}

fn encode_frame(envelope: &Envelope) -> Option<Utf8Bytes> {
    match envelope.encode() {
        Ok(json) => Some(Utf8Bytes::from(json)),
        Err(e) => {
            tracing::warn!(kind = %envelope.kind(), error = %e, "Failed to encode envelope");
            None
        }
    }
}
