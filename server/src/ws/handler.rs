use axum::{
    extract::{ws::rejection::WebSocketUpgradeRejection, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::auth::middleware::ConnectIdentity;
use crate::state::AppState;
use crate::ws::actor;
use crate::ws::hub::HubStats;

/// GET /ws
/// WebSocket upgrade endpoint. Identity comes from a bearer token, the
/// `user_id`/`user_role` query, or upstream middleware, in that order.
/// A request that cannot be upgraded gets the rejection's HTTP status and no
/// connection is created.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectIdentity(identity): ConnectIdentity,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "WebSocket upgrade rejected");
            return rejection.into_response();
        }
    };

    tracing::debug!(
        user_id = %identity.user_id,
        role = %identity.role,
        "WebSocket upgrade accepted"
    );

    let hub = state.hub.clone();
    ws.max_message_size(hub.config().max_message_size)
        .on_failed_upgrade(|e| {
            tracing::warn!(error = %e, "WebSocket handshake failed");
        })
        .on_upgrade(move |socket| actor::run_connection(socket, hub, identity))
}

/// GET /api/ws/users — connected-user listing.
pub async fn connected_users(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.hub.stats();
    Json(json!({
        "connected_users": stats.connected_users,
        "total_count": stats.total_clients,
    }))
}

/// GET /api/ws/count
pub async fn client_count(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "client_count": state.hub.connection_count() }))
}

/// GET /api/ws/stats — full hub snapshot.
pub async fn hub_stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats())
}
