//! Wire envelope for hub traffic.
//!
//! Every frame is a JSON text message shaped as
//! `{"type", "data", "timestamp", "id"?, "user_id"?, "priority"?, "category"?}`.
//! Decoding resolves `type` against the closed set of message kinds before
//! `data` is interpreted, so an unknown kind never reaches dispatch.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::DecodeError;

/// Closed set of envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Notification,
    OrderUpdate,
    ProductUpdate,
    StockAlert,
    PriceAlert,
    NewProductAlert,
    PromotionAlert,
    MaintenanceAlert,
    UserActivity,
    AnalyticsUpdate,
    RealTimeStats,
    Ping,
    Pong,
}

impl MessageType {
    pub const ALL: [MessageType; 13] = [
        Self::Notification,
        Self::OrderUpdate,
        Self::ProductUpdate,
        Self::StockAlert,
        Self::PriceAlert,
        Self::NewProductAlert,
        Self::PromotionAlert,
        Self::MaintenanceAlert,
        Self::UserActivity,
        Self::AnalyticsUpdate,
        Self::RealTimeStats,
        Self::Ping,
        Self::Pong,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::OrderUpdate => "order_update",
            Self::ProductUpdate => "product_update",
            Self::StockAlert => "stock_alert",
            Self::PriceAlert => "price_alert",
            Self::NewProductAlert => "new_product_alert",
            Self::PromotionAlert => "promotion_alert",
            Self::MaintenanceAlert => "maintenance_alert",
            Self::UserActivity => "user_activity",
            Self::AnalyticsUpdate => "analytics_update",
            Self::RealTimeStats => "real_time_stats",
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Ping and pong are hub housekeeping; everything else is user-facing.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }

    pub fn default_priority(&self) -> &'static str {
        match self {
            Self::MaintenanceAlert | Self::StockAlert => "high",
            Self::OrderUpdate | Self::PriceAlert => "medium",
            _ => "low",
        }
    }

    pub fn default_category(&self) -> &'static str {
        match self {
            Self::OrderUpdate => "orders",
            Self::ProductUpdate | Self::StockAlert | Self::PriceAlert | Self::NewProductAlert => {
                "products"
            }
            Self::PromotionAlert => "promotions",
            Self::MaintenanceAlert => "system",
            Self::UserActivity => "user",
            Self::AnalyticsUpdate | Self::RealTimeStats => "analytics",
            Self::Notification | Self::Ping | Self::Pong => "general",
        }
    }
}

impl FromStr for MessageType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownType(s.to_string()))
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdateData {
    pub order_id: String,
    pub status: String,
    pub message: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdateData {
    pub product_id: String,
    pub action: String,
    /// Free-form product snapshot supplied by the caller. Absent and `null`
    /// are the same thing.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAlertData {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlertData {
    pub product_id: String,
    pub product_name: String,
    pub old_price: f64,
    pub new_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductAlertData {
    pub product_id: String,
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionAlertData {
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceAlertData {
    pub message: String,
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivityData {
    pub user_id: String,
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsUpdateData {
    pub metrics: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeStatsData {
    pub stats: Map<String, Value>,
}

/// Typed body of an envelope, one variant per [`MessageType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Notification(NotificationData),
    OrderUpdate(OrderUpdateData),
    ProductUpdate(ProductUpdateData),
    StockAlert(StockAlertData),
    PriceAlert(PriceAlertData),
    NewProductAlert(NewProductAlertData),
    PromotionAlert(PromotionAlertData),
    MaintenanceAlert(MaintenanceAlertData),
    UserActivity(UserActivityData),
    AnalyticsUpdate(AnalyticsUpdateData),
    RealTimeStats(RealTimeStatsData),
    /// Application-level ping; the data is echoed back in the pong.
    Ping(Value),
    Pong(Value),
}

impl Payload {
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Notification(_) => MessageType::Notification,
            Self::OrderUpdate(_) => MessageType::OrderUpdate,
            Self::ProductUpdate(_) => MessageType::ProductUpdate,
            Self::StockAlert(_) => MessageType::StockAlert,
            Self::PriceAlert(_) => MessageType::PriceAlert,
            Self::NewProductAlert(_) => MessageType::NewProductAlert,
            Self::PromotionAlert(_) => MessageType::PromotionAlert,
            Self::MaintenanceAlert(_) => MessageType::MaintenanceAlert,
            Self::UserActivity(_) => MessageType::UserActivity,
            Self::AnalyticsUpdate(_) => MessageType::AnalyticsUpdate,
            Self::RealTimeStats(_) => MessageType::RealTimeStats,
            Self::Ping(_) => MessageType::Ping,
            Self::Pong(_) => MessageType::Pong,
        }
    }

    fn to_data(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Notification(d) => serde_json::to_value(d),
            Self::OrderUpdate(d) => serde_json::to_value(d),
            Self::ProductUpdate(d) => serde_json::to_value(d),
            Self::StockAlert(d) => serde_json::to_value(d),
            Self::PriceAlert(d) => serde_json::to_value(d),
            Self::NewProductAlert(d) => serde_json::to_value(d),
            Self::PromotionAlert(d) => serde_json::to_value(d),
            Self::MaintenanceAlert(d) => serde_json::to_value(d),
            Self::UserActivity(d) => serde_json::to_value(d),
            Self::AnalyticsUpdate(d) => serde_json::to_value(d),
            Self::RealTimeStats(d) => serde_json::to_value(d),
            Self::Ping(v) | Self::Pong(v) => Ok(v.clone()),
        }
    }

    fn from_data(kind: MessageType, data: Value) -> Result<Self, DecodeError> {
        let payload = match kind {
            MessageType::Notification => Self::Notification(parse(kind, data)?),
            MessageType::OrderUpdate => Self::OrderUpdate(parse(kind, data)?),
            MessageType::ProductUpdate => Self::ProductUpdate(parse(kind, data)?),
            MessageType::StockAlert => Self::StockAlert(parse(kind, data)?),
            MessageType::PriceAlert => Self::PriceAlert(parse(kind, data)?),
            MessageType::NewProductAlert => Self::NewProductAlert(parse(kind, data)?),
            MessageType::PromotionAlert => Self::PromotionAlert(parse(kind, data)?),
            MessageType::MaintenanceAlert => Self::MaintenanceAlert(parse(kind, data)?),
            MessageType::UserActivity => Self::UserActivity(parse(kind, data)?),
            MessageType::AnalyticsUpdate => Self::AnalyticsUpdate(parse(kind, data)?),
            MessageType::RealTimeStats => Self::RealTimeStats(parse(kind, data)?),
            MessageType::Ping => Self::Ping(data),
            MessageType::Pong => Self::Pong(data),
        };
        Ok(payload)
    }
}

fn parse<T: DeserializeOwned>(kind: MessageType, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidData { kind, source })
}

/// One unit of hub traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
    pub id: Option<String>,
    /// Audience hint: the user this envelope is about or addressed to.
    pub user_id: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

/// Serialized shape of [`Envelope`]. `type` stays a string here so that an
/// unknown tag surfaces as [`DecodeError::UnknownType`] rather than a generic
/// serde error.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

impl Envelope {
    /// Bare envelope stamped with the current time.
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            id: None,
            user_id: None,
            priority: None,
            category: None,
        }
    }

    /// Envelope as the event API emits it: fresh id plus the default
    /// priority and category for its kind.
    pub fn event(payload: Payload) -> Self {
        let kind = payload.kind();
        Self::new(payload)
            .with_id(Uuid::now_v7().to_string())
            .with_priority(kind.default_priority())
            .with_category(kind.default_category())
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn kind(&self) -> MessageType {
        self.payload.kind()
    }

    /// Time elapsed since the envelope was stamped. Zero for future timestamps.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.timestamp).to_std().unwrap_or_default()
    }

    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let wire = WireEnvelope {
            kind: self.kind().as_str().to_string(),
            data: self.payload.to_data()?,
            timestamp: self.timestamp,
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            priority: self.priority.clone(),
            category: self.category.clone(),
        };
        serde_json::to_string(&wire)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireEnvelope = serde_json::from_slice(bytes)?;
        let kind: MessageType = wire.kind.parse()?;
        Ok(Self {
            payload: Payload::from_data(kind, wire.data)?,
            timestamp: wire.timestamp,
            id: wire.id,
            user_id: wire.user_id,
            priority: wire.priority,
            category: wire.category,
        })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Envelope{{type: {}, id: {}, user_id: {}, timestamp: {}}}",
            self.kind(),
            self.id.as_deref().unwrap_or(""),
            self.user_id.as_deref().unwrap_or(""),
            self.timestamp.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payloads() -> Vec<Payload> {
        let metrics = json!({"orders": 12, "revenue": 250.5})
            .as_object()
            .cloned()
            .unwrap();
        vec![
            Payload::Notification(NotificationData {
                title: "Hello".into(),
                message: "World".into(),
                icon: Some("bell".into()),
            }),
            Payload::OrderUpdate(OrderUpdateData {
                order_id: "o-1".into(),
                status: "shipped".into(),
                message: "On its way".into(),
                user_id: "u1".into(),
            }),
            Payload::ProductUpdate(ProductUpdateData {
                product_id: "p-1".into(),
                action: "updated".into(),
                data: json!({"name": "Lamp", "tags": ["home"]}),
            }),
            Payload::StockAlert(StockAlertData {
                product_id: "p-1".into(),
                product_name: "Lamp".into(),
                current_stock: 3,
            }),
            Payload::PriceAlert(PriceAlertData {
                product_id: "p-1".into(),
                product_name: "Lamp".into(),
                old_price: 19.99,
                new_price: 14.5,
            }),
            Payload::NewProductAlert(NewProductAlertData {
                product_id: "p-2".into(),
                product_name: "Desk".into(),
            }),
            Payload::PromotionAlert(PromotionAlertData {
                title: "Sale".into(),
                message: "20% off".into(),
                action_url: None,
            }),
            Payload::MaintenanceAlert(MaintenanceAlertData {
                message: "Downtime".into(),
                scheduled_time: "2026-11-01T02:00:00Z".parse().unwrap(),
            }),
            Payload::UserActivity(UserActivityData {
                user_id: "u1".into(),
                activity: "viewing".into(),
                details: None,
            }),
            Payload::AnalyticsUpdate(AnalyticsUpdateData {
                metrics: metrics.clone(),
            }),
            Payload::RealTimeStats(RealTimeStatsData { stats: metrics }),
            Payload::Ping(json!({"seq": 1})),
            Payload::Pong(json!({})),
        ]
    }

    #[test]
    fn test_every_kind_round_trips_bare_and_fully_populated() {
        let payloads = sample_payloads();
        assert_eq!(payloads.len(), MessageType::ALL.len());

        for payload in payloads {
            let bare = Envelope::new(payload.clone());
            let decoded = Envelope::decode(bare.encode().unwrap().as_bytes()).unwrap();
            assert_eq!(decoded, bare, "bare {} envelope", payload.kind());
            assert!(decoded.id.is_none());
            assert!(decoded.user_id.is_none());

            let full = Envelope::event(payload.clone()).with_user_id("u1");
            let decoded = Envelope::decode(full.encode().unwrap().as_bytes()).unwrap();
            assert_eq!(decoded, full, "full {} envelope", payload.kind());
        }
    }

    fn assert_round_trips(payload: Payload) {
        for envelope in [
            Envelope::new(payload.clone()),
            Envelope::event(payload.clone()).with_user_id("u1"),
        ] {
            let wire = envelope.encode().unwrap();
            let decoded = Envelope::decode(wire.as_bytes()).unwrap();
            assert_eq!(decoded, envelope, "wire: {wire}");
        }
    }

    #[test]
    fn test_payload_optionals_round_trip_present_and_absent() {
        for icon in [None, Some("bell".to_string())] {
            assert_round_trips(Payload::Notification(NotificationData {
                title: "Hello".into(),
                message: "World".into(),
                icon,
            }));
        }
        for action_url in [None, Some("https://shop.test/sale".to_string())] {
            assert_round_trips(Payload::PromotionAlert(PromotionAlertData {
                title: "Sale".into(),
                message: "20% off".into(),
                action_url,
            }));
        }
        for details in [None, Some("from mobile".to_string())] {
            assert_round_trips(Payload::UserActivity(UserActivityData {
                user_id: "u1".into(),
                activity: "login".into(),
                details,
            }));
        }
        for data in [Value::Null, json!({}), json!([1, null]), json!("x")] {
            assert_round_trips(Payload::ProductUpdate(ProductUpdateData {
                product_id: "p-1".into(),
                action: "updated".into(),
                data,
            }));
        }
        assert_round_trips(Payload::Ping(Value::Null));
    }

    #[test]
    fn test_product_update_null_and_absent_data_are_equivalent() {
        let absent =
            Envelope::decode(br#"{"type":"product_update","data":{"product_id":"p","action":"a"}}"#)
                .unwrap();
        let null = Envelope::decode(
            br#"{"type":"product_update","data":{"product_id":"p","action":"a","data":null}}"#,
        )
        .unwrap();
        assert_eq!(absent.payload, null.payload);
        assert!(!null.encode().unwrap().contains("null"));
    }

    #[test]
    fn test_prices_round_trip_exactly() {
        let prices = [
            1271.7055921705467,
            9140.220331021943,
            7494.6245124623765,
            9145.055985505509,
            0.1 + 0.2,
            f64::MIN_POSITIVE,
            1e300,
            0.0,
        ];
        for pair in prices.windows(2) {
            assert_round_trips(Payload::PriceAlert(PriceAlertData {
                product_id: "p-1".into(),
                product_name: "Lamp".into(),
                old_price: pair[0],
                new_price: pair[1],
            }));
        }
    }

    #[test]
    fn test_absent_optionals_are_omitted_from_the_wire() {
        let envelope = Envelope::new(Payload::Ping(json!({})));
        let value: Value = serde_json::from_str(&envelope.encode().unwrap()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["type"], "ping");
        for key in ["id", "user_id", "priority", "category"] {
            assert!(!obj.contains_key(key), "{key} should be omitted");
        }
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = Envelope::decode(br#"{"type":"welcome","data":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "welcome"));
    }

    #[test]
    fn test_missing_data_is_rejected() {
        let err = Envelope::decode(br#"{"type":"ping"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_payload_shape_mismatch_is_rejected() {
        let err =
            Envelope::decode(br#"{"type":"stock_alert","data":{"product_id":"p"}}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidData {
                kind: MessageType::StockAlert,
                ..
            }
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            Envelope::decode(b"not json").unwrap_err(),
            DecodeError::Json(_)
        ));
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let envelope = Envelope::decode(br#"{"type":"ping","data":{}}"#).unwrap();
        assert!(envelope.age() < Duration::from_secs(5));
    }

    #[test]
    fn test_default_priority_and_category() {
        assert_eq!(MessageType::MaintenanceAlert.default_priority(), "high");
        assert_eq!(MessageType::PriceAlert.default_priority(), "medium");
        assert_eq!(MessageType::PromotionAlert.default_priority(), "low");
        assert_eq!(MessageType::StockAlert.default_category(), "products");
        assert_eq!(MessageType::RealTimeStats.default_category(), "analytics");
        assert_eq!(MessageType::Ping.default_category(), "general");
        assert_eq!(MessageType::Notification.default_category(), "general");
        assert_eq!(MessageType::Notification.default_priority(), "low");
        assert!(MessageType::Pong.is_system());
        assert!(!MessageType::UserActivity.is_system());
    }

    #[test]
    fn test_event_envelope_carries_id_and_defaults() {
        let envelope = Envelope::event(Payload::Pong(json!({})));
        assert!(envelope.id.is_some());
        assert_eq!(envelope.priority.as_deref(), Some("low"));
        assert_eq!(envelope.category.as_deref(), Some("general"));
    }

    #[test]
    fn test_expiry() {
        let mut envelope = Envelope::new(Payload::Ping(json!({})));
        envelope.timestamp = Utc::now() - chrono::Duration::seconds(120);
        assert!(envelope.is_expired(Duration::from_secs(60)));
        assert!(!envelope.is_expired(Duration::from_secs(600)));
    }
}
