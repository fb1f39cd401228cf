//! Razorpay entities as returned by the REST API and carried in webhooks.
//!
//! Only the fields the backend reads are modelled; everything else in the
//! gateway's JSON is ignored.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a Razorpay payment.
///
/// Unrecognised states are kept verbatim so they can be reported back to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Created,
    Authorized,
    Captured,
    Failed,
    Refunded,
    Unknown(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Unknown(other) => other,
        }
    }

    /// Whether the gateway considers the money secured.
    pub fn is_fulfillable(&self) -> bool {
        matches!(self, PaymentStatus::Captured | PaymentStatus::Authorized)
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "created" => PaymentStatus::Created,
            "authorized" => PaymentStatus::Authorized,
            "captured" => PaymentStatus::Captured,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Unknown(value),
        }
    }
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        PaymentStatus::from(value.to_owned())
    }
}

impl From<PaymentStatus> for String {
    fn from(value: PaymentStatus) -> Self {
        match value {
            PaymentStatus::Unknown(other) => other,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment entity (`GET /v1/payments/{id}`, `payload.payment.entity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    pub status: PaymentStatus,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

/// An order entity (`POST /v1/orders`, `payload.order.entity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntity {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper<PaymentEntity>>,
    #[serde(default)]
    pub order: Option<EntityWrapper<OrderEntity>>,
}

/// Top-level webhook delivery body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub payload: WebhookPayload,
}

impl WebhookEnvelope {
    pub fn payment(&self) -> Option<&PaymentEntity> {
        self.payload.payment.as_ref().map(|p| &p.entity)
    }

    /// The gateway order this event refers to, from either entity.
    pub fn order_id(&self) -> Option<&str> {
        self.payment()
            .and_then(|p| p.order_id.as_deref())
            .or_else(|| self.payload.order.as_ref().map(|o| o.entity.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_unknown() {
        let captured: PaymentStatus = serde_json::from_str("\"captured\"").unwrap();
        assert_eq!(captured, PaymentStatus::Captured);
        assert!(captured.is_fulfillable());

        let odd: PaymentStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(odd, PaymentStatus::Unknown("on_hold".into()));
        assert!(!odd.is_fulfillable());
        assert_eq!(serde_json::to_string(&odd).unwrap(), "\"on_hold\"");
    }

    #[test]
    fn test_only_captured_and_authorized_fulfill() {
        assert!(PaymentStatus::Authorized.is_fulfillable());
        assert!(!PaymentStatus::Created.is_fulfillable());
        assert!(!PaymentStatus::Failed.is_fulfillable());
        assert!(!PaymentStatus::Refunded.is_fulfillable());
    }

    #[test]
    fn test_webhook_envelope() {
        let json = r#"{
            "entity": "event",
            "account_id": "acc_1",
            "event": "order.paid",
            "contains": ["payment", "order"],
            "payload": {
                "payment": {"entity": {"id": "pay_1", "entity": "payment", "amount": 50000, "currency": "INR", "status": "captured", "order_id": "order_1", "method": "upi"}},
                "order": {"entity": {"id": "order_1", "amount": 50000, "currency": "INR", "status": "paid"}}
            },
            "created_at": 1700000000
        }"#;
        let envelope: WebhookEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.event, "order.paid");
        assert_eq!(envelope.order_id(), Some("order_1"));
        assert_eq!(envelope.payment().unwrap().status, PaymentStatus::Captured);
    }

    #[test]
    fn test_envelope_without_payload() {
        let envelope: WebhookEnvelope =
            serde_json::from_str(r#"{"event": "refund.created"}"#).unwrap();
        assert!(envelope.payment().is_none());
        assert!(envelope.order_id().is_none());
    }
}
