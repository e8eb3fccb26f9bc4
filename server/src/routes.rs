use axum::{middleware, routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::JwtSecret;
use crate::events::routes as notify;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint (identity via bearer header, token query, or user_id query)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    // Read-only hub introspection (no auth)
    let introspection_routes = Router::new()
        .route("/api/ws/users", get(ws_handler::connected_users))
        .route("/api/ws/count", get(ws_handler::client_count))
        .route("/api/ws/stats", get(ws_handler::hub_stats));

    // Event triggers (admin JWT required; Claims extractor validates token)
    let notify_routes = Router::new()
        .route("/api/ws/notify/notification", post(notify::notify_notification))
        .route("/api/ws/notify/order-update", post(notify::notify_order_update))
        .route("/api/ws/notify/product-update", post(notify::notify_product_update))
        .route("/api/ws/notify/stock-alert", post(notify::notify_stock_alert))
        .route("/api/ws/notify/price-alert", post(notify::notify_price_alert))
        .route("/api/ws/notify/new-product", post(notify::notify_new_product))
        .route("/api/ws/notify/promotion", post(notify::notify_promotion))
        .route("/api/ws/notify/maintenance", post(notify::notify_maintenance))
        .route("/api/ws/notify/user-activity", post(notify::notify_user_activity))
        .route("/api/ws/notify/analytics", post(notify::notify_analytics))
        .route("/api/ws/notify/stats", post(notify::notify_stats))
        .route("/api/ws/notify/role", post(notify::notify_role));

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(introspection_routes)
        .merge(notify_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
