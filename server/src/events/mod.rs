//! Event API: one function per store event.
//!
//! Each call validates its payload, wraps it in an [`Envelope`] with a fresh
//! id and the default priority/category for its kind, and hands it to the
//! hub. The returned count is informational; delivery is best-effort.

pub mod routes;

use crate::error::HubError;
use crate::ws::envelope::{
    AnalyticsUpdateData, Envelope, MaintenanceAlertData, NewProductAlertData, NotificationData,
    OrderUpdateData, Payload, PriceAlertData, ProductUpdateData, PromotionAlertData,
    RealTimeStatsData, StockAlertData, UserActivityData,
};
use crate::ws::hub::Hub;

/// Broadcast a general notification. `priority` and `category` replace the
/// defaults when given.
pub fn send_notification(
    hub: &Hub,
    data: NotificationData,
    priority: Option<String>,
    category: Option<String>,
) -> Result<usize, HubError> {
    require("title", &data.title)?;
    require("message", &data.message)?;

    let mut envelope = Envelope::event(Payload::Notification(data));
    if let Some(priority) = priority.filter(|p| !p.is_empty()) {
        envelope = envelope.with_priority(priority);
    }
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        envelope = envelope.with_category(category);
    }
    Ok(hub.broadcast_all(&envelope))
}

/// Unicast an order status change to every session of the order's owner.
pub fn send_order_update(hub: &Hub, data: OrderUpdateData) -> Result<usize, HubError> {
    require("order_id", &data.order_id)?;
    require("status", &data.status)?;
    require("message", &data.message)?;
    require("user_id", &data.user_id)?;

    let user_id = data.user_id.clone();
    let envelope = Envelope::event(Payload::OrderUpdate(data)).with_user_id(user_id.as_str());
    Ok(hub.send_to_user(&user_id, &envelope))
}

pub fn send_product_update(hub: &Hub, data: ProductUpdateData) -> Result<usize, HubError> {
    require("product_id", &data.product_id)?;
    require("action", &data.action)?;
    broadcast(hub, Payload::ProductUpdate(data))
}

pub fn send_stock_alert(hub: &Hub, data: StockAlertData) -> Result<usize, HubError> {
    require("product_id", &data.product_id)?;
    require("product_name", &data.product_name)?;
    broadcast(hub, Payload::StockAlert(data))
}

pub fn send_price_alert(hub: &Hub, data: PriceAlertData) -> Result<usize, HubError> {
    require("product_id", &data.product_id)?;
    require("product_name", &data.product_name)?;
    require_price("old_price", data.old_price)?;
    require_price("new_price", data.new_price)?;
    broadcast(hub, Payload::PriceAlert(data))
}

pub fn send_new_product_alert(hub: &Hub, data: NewProductAlertData) -> Result<usize, HubError> {
    require("product_id", &data.product_id)?;
    require("product_name", &data.product_name)?;
    broadcast(hub, Payload::NewProductAlert(data))
}

pub fn send_promotion_alert(hub: &Hub, data: PromotionAlertData) -> Result<usize, HubError> {
    require("title", &data.title)?;
    require("message", &data.message)?;
    broadcast(hub, Payload::PromotionAlert(data))
}

pub fn send_maintenance_alert(hub: &Hub, data: MaintenanceAlertData) -> Result<usize, HubError> {
    require("message", &data.message)?;
    broadcast(hub, Payload::MaintenanceAlert(data))
}

/// Unicast an activity record to the user it describes.
pub fn send_user_activity(hub: &Hub, data: UserActivityData) -> Result<usize, HubError> {
    require("user_id", &data.user_id)?;
    require("activity", &data.activity)?;

    let user_id = data.user_id.clone();
    let envelope = Envelope::event(Payload::UserActivity(data)).with_user_id(user_id.as_str());
    Ok(hub.send_to_user(&user_id, &envelope))
}

pub fn send_analytics_update(hub: &Hub, data: AnalyticsUpdateData) -> Result<usize, HubError> {
    if data.metrics.is_empty() {
        return Err(HubError::validation("metrics must not be empty"));
    }
    broadcast(hub, Payload::AnalyticsUpdate(data))
}

pub fn send_real_time_stats(hub: &Hub, data: RealTimeStatsData) -> Result<usize, HubError> {
    if data.stats.is_empty() {
        return Err(HubError::validation("stats must not be empty"));
    }
    broadcast(hub, Payload::RealTimeStats(data))
}

/// Notification restricted to sessions holding `role` (admin-only notices).
pub fn send_role_notification(
    hub: &Hub,
    role: &str,
    data: NotificationData,
) -> Result<usize, HubError> {
    require("role", role)?;
    require("title", &data.title)?;
    require("message", &data.message)?;

    let envelope = Envelope::event(Payload::Notification(data));
    Ok(hub.send_to_role(role, &envelope))
}

fn broadcast(hub: &Hub, payload: Payload) -> Result<usize, HubError> {
    Ok(hub.broadcast_all(&Envelope::event(payload)))
}

fn require(field: &str, value: &str) -> Result<(), HubError> {
    if value.trim().is_empty() {
        return Err(HubError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_price(field: &str, value: f64) -> Result<(), HubError> {
    if !value.is_finite() || value < 0.0 {
        return Err(HubError::validation(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map};

    use super::*;
    use crate::config::HubConfig;
    use crate::ws::connection::{Connection, Outbox};
    use crate::ws::envelope::MessageType;

    fn admit(hub: &Hub, user: &str, role: &str) -> (Arc<Connection>, Outbox) {
        let (conn, rx) = Connection::new(user, role, 16);
        hub.admit(conn.clone());
        (conn, rx)
    }

    fn recv(rx: &mut Outbox) -> Option<Envelope> {
        rx.try_recv()
            .ok()
            .map(|frame| Envelope::decode(frame.as_str().as_bytes()).unwrap())
    }

    fn notification(title: &str) -> NotificationData {
        NotificationData {
            title: title.into(),
            message: "body".into(),
            icon: None,
        }
    }

    #[test]
    fn test_stock_alert_is_broadcast_with_defaults() {
        let hub = Hub::new(HubConfig::default());
        let (_, mut a) = admit(&hub, "u1", "user");
        let (_, mut b) = admit(&hub, "", "");

        let sent = send_stock_alert(
            &hub,
            StockAlertData {
                product_id: "p-9".into(),
                product_name: "Kettle".into(),
                current_stock: 0,
            },
        )
        .unwrap();
        assert_eq!(sent, 2);

        for rx in [&mut a, &mut b] {
            let env = recv(rx).unwrap();
            assert_eq!(env.kind(), MessageType::StockAlert);
            assert_eq!(env.priority.as_deref(), Some("high"));
            assert_eq!(env.category.as_deref(), Some("products"));
            assert!(env.id.is_some());
        }
    }

    #[test]
    fn test_order_update_only_reaches_owner() {
        let hub = Hub::new(HubConfig::default());
        let (_, mut owner) = admit(&hub, "u1", "user");
        let (_, mut other) = admit(&hub, "u2", "user");

        let sent = send_order_update(
            &hub,
            OrderUpdateData {
                order_id: "o-1".into(),
                status: "shipped".into(),
                message: "On its way".into(),
                user_id: "u1".into(),
            },
        )
        .unwrap();
        assert_eq!(sent, 1);

        let env = recv(&mut owner).unwrap();
        assert_eq!(env.user_id.as_deref(), Some("u1"));
        assert_eq!(env.category.as_deref(), Some("orders"));
        assert!(recv(&mut other).is_none());
    }

    #[test]
    fn test_user_activity_is_unicast() {
        let hub = Hub::new(HubConfig::default());
        let (_, mut owner) = admit(&hub, "u1", "user");
        let (_, mut other) = admit(&hub, "u2", "user");

        let sent = send_user_activity(
            &hub,
            UserActivityData {
                user_id: "u1".into(),
                activity: "login".into(),
                details: Some("from mobile".into()),
            },
        )
        .unwrap();
        assert_eq!(sent, 1);
        assert_eq!(recv(&mut owner).unwrap().kind(), MessageType::UserActivity);
        assert!(recv(&mut other).is_none());
    }

    #[test]
    fn test_notification_overrides_priority_and_category() {
        let hub = Hub::new(HubConfig::default());
        let (_, mut rx) = admit(&hub, "u1", "user");

        send_notification(
            &hub,
            notification("Sale"),
            Some("high".into()),
            Some("promotions".into()),
        )
        .unwrap();
        let env = recv(&mut rx).unwrap();
        assert_eq!(env.priority.as_deref(), Some("high"));
        assert_eq!(env.category.as_deref(), Some("promotions"));

        send_notification(&hub, notification("Hi"), None, Some(String::new())).unwrap();
        let env = recv(&mut rx).unwrap();
        assert_eq!(env.priority.as_deref(), Some("low"));
        assert_eq!(env.category.as_deref(), Some("general"));
    }

    #[test]
    fn test_role_notification_reaches_admins_only() {
        let hub = Hub::new(HubConfig::default());
        let (_, mut admin) = admit(&hub, "a", "admin");
        let (_, mut user) = admit(&hub, "u", "user");

        let sent = send_role_notification(&hub, "admin", notification("Low disk")).unwrap();
        assert_eq!(sent, 1);
        assert!(recv(&mut admin).is_some());
        assert!(recv(&mut user).is_none());
    }

    #[test]
    fn test_validation_rejects_missing_fields_without_delivering() {
        let hub = Hub::new(HubConfig::default());
        let (_, mut rx) = admit(&hub, "u1", "user");

        let err = send_notification(&hub, notification(" "), None, None).unwrap_err();
        assert!(matches!(err, HubError::Validation(ref m) if m == "title is required"));

        let err = send_order_update(
            &hub,
            OrderUpdateData {
                order_id: "o-1".into(),
                status: "paid".into(),
                message: "ok".into(),
                user_id: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));

        let err = send_price_alert(
            &hub,
            PriceAlertData {
                product_id: "p".into(),
                product_name: "Lamp".into(),
                old_price: 10.0,
                new_price: f64::NAN,
            },
        )
        .unwrap_err();
        assert!(matches!(err, HubError::Validation(ref m) if m.starts_with("new_price")));

        assert!(send_analytics_update(&hub, AnalyticsUpdateData { metrics: Map::new() }).is_err());
        assert!(send_role_notification(&hub, "", notification("x")).is_err());

        assert!(recv(&mut rx).is_none());
        assert_eq!(hub.stats().messages_sent, 0);
    }

    #[test]
    fn test_event_with_no_recipients_is_not_an_error() {
        let hub = Hub::new(HubConfig::default());
        let mut stats = Map::new();
        stats.insert("orders_today".into(), json!(12));
        assert_eq!(
            send_real_time_stats(&hub, RealTimeStatsData { stats }).unwrap(),
            0
        );
    }
}
