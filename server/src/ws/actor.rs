use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::auth::middleware::Identity;
use crate::config::HubConfig;
use crate::ws::connection::{CloseReason, Connection, Outbox};
use crate::ws::envelope::{Envelope, NotificationData, Payload};
use crate::ws::hub::Hub;
use crate::ws::protocol;

/// Run one client session until either side hangs up.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, drains the outbox, sends keepalive pings
/// - Reader loop: enforces the read deadline, decodes and dispatches frames
///
/// Both halves watch the connection's cancellation token; the first to fail
/// closes it and the other follows.
pub async fn run_connection(socket: WebSocket, hub: Hub, identity: Identity) {
    let config = hub.config().clone();
    let (ws_sender, ws_receiver) = socket.split();
    let (conn, outbox) = Connection::new(identity.user_id, identity.role, config.outbox_capacity);

    hub.admit(conn.clone());

    tracing::info!(
        connection_id = %conn.id,
        user_id = %conn.user_id,
        role = %conn.role,
        "WebSocket connection opened"
    );

    hub.deliver_to(&conn, &welcome_envelope(&conn));

    let writer_handle = tokio::spawn(writer_task(
        ws_sender,
        outbox,
        conn.clone(),
        hub.clone(),
        config.clone(),
    ));

    reader_loop(ws_receiver, &conn, &hub, config.read_deadline()).await;

    // Reader is done: make sure the writer stops and the hub forgets us
    conn.close(CloseReason::Normal);
    hub.evict(conn.id);

    if let Err(e) = writer_handle.await {
        tracing::warn!(connection_id = %conn.id, error = %e, "Writer task failed");
    }

    tracing::info!(
        connection_id = %conn.id,
        user_id = %conn.user_id,
        reason = conn.close_reason().unwrap_or(CloseReason::Normal).as_str(),
        "WebSocket connection closed"
    );
}

/// First frame every session sees. Anonymous sessions get no `user_id`.
fn welcome_envelope(conn: &Connection) -> Envelope {
    let welcome = Envelope::new(Payload::Notification(NotificationData {
        title: "Welcome".to_string(),
        message: "Connected to notification hub".to_string(),
        icon: None,
    }));
    if conn.is_anonymous() {
        welcome
    } else {
        welcome.with_user_id(conn.user_id.clone())
    }
}

/// Reader loop: every received frame, control frames included, re-arms the
/// read deadline. Silence past the deadline ends the session.
async fn reader_loop(
    mut ws_receiver: SplitStream<WebSocket>,
    conn: &Connection,
    hub: &Hub,
    read_deadline: Duration,
) {
    loop {
        let next = tokio::select! {
            _ = conn.closed() => break,
            next = timeout(read_deadline, ws_receiver.next()) => next,
        };

        match next {
            Err(_elapsed) => {
                tracing::info!(
                    connection_id = %conn.id,
                    user_id = %conn.user_id,
                    "Read deadline exceeded, closing connection"
                );
                conn.close(CloseReason::KeepaliveTimeout);
                break;
            }
            Ok(None) => {
                // Stream ended, client disconnected
                tracing::debug!(connection_id = %conn.id, "WebSocket stream ended");
                break;
            }
            Ok(Some(Err(e))) => {
                tracing::warn!(
                    connection_id = %conn.id,
                    user_id = %conn.user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                conn.close(CloseReason::TransportError);
                break;
            }
            Ok(Some(Ok(msg))) => match msg {
                Message::Text(text) => {
                    protocol::handle_inbound(text.as_str().as_bytes(), conn, hub);
                }
                Message::Binary(data) => {
                    protocol::handle_inbound(&data, conn, hub);
                }
                // Pings are answered by the transport; either way the deadline was re-armed
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::debug!(
                        connection_id = %conn.id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
        }
    }
}

/// Writer task: drains the outbox, pings on a fixed interval, and sends the
/// close frame once the connection is cancelled.
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut outbox: Outbox,
    conn: Arc<Connection>,
    hub: Hub,
    config: HubConfig,
) {
    let write_deadline = config.write_deadline();
    let mut ping_timer = interval_at(
        Instant::now() + config.ping_interval(),
        config.ping_interval(),
    );
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let msg = tokio::select! {
            biased;
            _ = conn.closed() => break,
            // Ahead of the outbox so a busy client still gets pinged
            _ = ping_timer.tick() => Message::Ping(Default::default()),
            frame = outbox.recv() => match frame {
                Some(text) => Message::Text(text),
                None => break,
            },
        };

        match timeout(write_deadline, ws_sender.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(connection_id = %conn.id, error = %e, "WebSocket send failed");
                conn.close(CloseReason::TransportError);
                break;
            }
            Err(_elapsed) => {
                tracing::warn!(connection_id = %conn.id, "Write deadline exceeded");
                conn.close(CloseReason::TransportError);
                break;
            }
        }
    }

    hub.evict(conn.id);

    // Best-effort close frame; the transport may already be gone
    let reason = conn.close_reason().unwrap_or(CloseReason::Normal);
    let close = Message::Close(Some(CloseFrame {
        code: reason.close_code(),
        reason: reason.as_str().into(),
    }));
    let _ = timeout(write_deadline, ws_sender.send(close)).await;
}
