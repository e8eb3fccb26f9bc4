use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::auth::middleware::Claims;
use crate::error::HubError;
use crate::events;
use crate::state::AppState;
use crate::ws::envelope::{
    AnalyticsUpdateData, MaintenanceAlertData, NewProductAlertData, NotificationData,
    OrderUpdateData, PriceAlertData, ProductUpdateData, PromotionAlertData, RealTimeStatsData,
    StockAlertData, UserActivityData,
};

type ApiResult = Result<Json<serde_json::Value>, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    #[serde(flatten)]
    pub notification: NotificationData,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub message: String,
    /// RFC3339, or `YYYY-MM-DD HH:MM` in UTC.
    pub scheduled_time: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleNotificationRequest {
    pub role: String,
    #[serde(flatten)]
    pub notification: NotificationData,
}

/// POST /api/ws/notify/notification
pub async fn notify_notification(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<NotificationRequest>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    let req = json_body(body)?;
    events::send_notification(&state.hub, req.notification, req.priority, req.category)
        .map_err(reject)?;
    Ok(sent("Notification"))
}

/// POST /api/ws/notify/order-update
pub async fn notify_order_update(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<OrderUpdateData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_order_update(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Order update"))
}

/// POST /api/ws/notify/product-update
pub async fn notify_product_update(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<ProductUpdateData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_product_update(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Product update"))
}

/// POST /api/ws/notify/stock-alert
pub async fn notify_stock_alert(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<StockAlertData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_stock_alert(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Stock alert"))
}

/// POST /api/ws/notify/price-alert
pub async fn notify_price_alert(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<PriceAlertData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_price_alert(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Price alert"))
}

/// POST /api/ws/notify/new-product
pub async fn notify_new_product(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<NewProductAlertData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_new_product_alert(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("New product alert"))
}

/// POST /api/ws/notify/promotion
pub async fn notify_promotion(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<PromotionAlertData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_promotion_alert(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Promotion alert"))
}

/// POST /api/ws/notify/maintenance
pub async fn notify_maintenance(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<MaintenanceRequest>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    let req = json_body(body)?;
    let scheduled_time = parse_scheduled_time(&req.scheduled_time).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "scheduled_time must be RFC3339 or YYYY-MM-DD HH:MM".to_string(),
        )
    })?;

    events::send_maintenance_alert(
        &state.hub,
        MaintenanceAlertData {
            message: req.message,
            scheduled_time,
        },
    )
    .map_err(reject)?;
    Ok(sent("Maintenance alert"))
}

/// POST /api/ws/notify/user-activity
pub async fn notify_user_activity(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<UserActivityData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_user_activity(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("User activity"))
}

/// POST /api/ws/notify/analytics
pub async fn notify_analytics(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<AnalyticsUpdateData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_analytics_update(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Analytics update"))
}

/// POST /api/ws/notify/stats
pub async fn notify_stats(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<RealTimeStatsData>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    events::send_real_time_stats(&state.hub, json_body(body)?).map_err(reject)?;
    Ok(sent("Real-time stats"))
}

/// POST /api/ws/notify/role — notification for one role only.
pub async fn notify_role(
    State(state): State<AppState>,
    claims: Claims,
    body: Result<Json<RoleNotificationRequest>, JsonRejection>,
) -> ApiResult {
    claims.require_admin()?;
    let req = json_body(body)?;
    events::send_role_notification(&state.hub, &req.role, req.notification).map_err(reject)?;
    Ok(sent("Role notification"))
}

/// Malformed or incomplete bodies are a 400, like any other validation failure.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, (StatusCode, String)> {
    body.map(|Json(value)| value)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))
}

fn reject(err: HubError) -> (StatusCode, String) {
    match err {
        HubError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        other @ (HubError::MailboxOverflow | HubError::ConnectionClosed) => {
            tracing::error!(error = %other, "Event delivery failed");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn sent(kind: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": format!("{kind} sent") }))
}

fn parse_scheduled_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_scheduled_time_formats() {
        let ts = parse_scheduled_time("2026-03-01T02:30:00+01:00").unwrap();
        assert_eq!((ts.day(), ts.hour(), ts.minute()), (1, 1, 30));

        let ts = parse_scheduled_time("2026-03-01 02:30").unwrap();
        assert_eq!((ts.month(), ts.hour(), ts.minute()), (3, 2, 30));

        assert!(parse_scheduled_time("tomorrow").is_none());
        assert!(parse_scheduled_time("2026-03-01").is_none());
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let (status, msg) = reject(HubError::validation("title is required"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "title is required");

        for err in [HubError::ConnectionClosed, HubError::MailboxOverflow] {
            let (status, msg) = reject(err);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!msg.is_empty());
        }
    }

    #[test]
    fn test_notification_request_flattens_payload() {
        let req: NotificationRequest = serde_json::from_str(
            r#"{"title":"Sale","message":"50% off","priority":"high"}"#,
        )
        .unwrap();
        assert_eq!(req.notification.title, "Sale");
        assert_eq!(req.notification.icon, None);
        assert_eq!(req.priority.as_deref(), Some("high"));
        assert_eq!(req.category, None);
    }
}
