use crate::ws::connection::Connection;
use crate::ws::envelope::{Envelope, Payload};
use crate::ws::hub::Hub;

/// What the inbound loop did with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Frame failed to decode and was dropped.
    Malformed,
    /// Answered an application ping with a pong on the sender's outbox.
    Ponged,
    /// Forwarded to every connection; carries the recipient count.
    Broadcast(usize),
    /// Recognized but not something clients may originate.
    Ignored,
}

/// Handle an incoming text or binary frame.
/// Decodes the Envelope, dispatches on its kind. Never fatal to the session.
pub fn handle_inbound(data: &[u8], conn: &Connection, hub: &Hub) -> Dispatch {
    let envelope = match Envelope::decode(data) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(
                connection_id = %conn.id,
                user_id = %conn.user_id,
                error = %e,
                "Dropping malformed message"
            );
            return Dispatch::Malformed;
        }
    };

    hub.record_received();
    dispatch_envelope(envelope, conn, hub)
}

fn dispatch_envelope(mut envelope: Envelope, conn: &Connection, hub: &Hub) -> Dispatch {
    match &mut envelope.payload {
        Payload::Ping(data) => {
            let mut pong = Envelope::new(Payload::Pong(data.clone()));
            pong.id = envelope.id.clone();
            hub.deliver_to(conn, &pong);
            Dispatch::Ponged
        }
        Payload::Pong(_) => Dispatch::Ignored,
        Payload::UserActivity(activity) => {
            // Activity is always attributed to the sender; guests stay anonymous
            activity.user_id = conn.user_id.clone();
            envelope.user_id = (!conn.is_anonymous()).then(|| conn.user_id.clone());
            Dispatch::Broadcast(hub.broadcast_all(&envelope))
        }
        other => {
            tracing::debug!(
                connection_id = %conn.id,
                user_id = %conn.user_id,
                kind = %other.kind(),
                "Ignoring client-originated event"
            );
            Dispatch::Ignored
        }
    }
}
