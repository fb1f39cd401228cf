//! Request and response bodies of the checkout API.

use serde::{Deserialize, Serialize};

/// Reference to the photo being bought.
///
/// `storage_path` may be decorated (`gs://bucket/…`, percent-encoded, leading
/// slashes); the server normalizes it before signing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRef {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Price shown to the buyer, in major units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// `POST /verify-payment` body.
///
/// Field names follow the Razorpay checkout handler response. The short
/// names are accepted too.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(rename = "razorpay_order_id", alias = "order_id", default)]
    pub order_id: Option<String>,
    #[serde(rename = "razorpay_payment_id", alias = "payment_id", default)]
    pub payment_id: Option<String>,
    #[serde(rename = "razorpay_signature", alias = "signature", default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub photo: Option<PhotoRef>,
}

/// `POST /verify-payment` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub purchase_id: String,
    pub download_url: String,
}

/// `POST /create-order` body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Amount in minor units (paise for INR).
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default)]
    pub photo: Option<PhotoRef>,
}

/// `POST /create-order` success body, fed to the checkout widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

/// `POST /webhook` success body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// The single error shape returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    /// Gateway payment status, for `PAYMENT_NOT_COMPLETE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Failing upstream provider, for `UPSTREAM_FAILURE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_request_razorpay_names() {
        let json = r#"{
            "razorpay_order_id": "order_1",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": "abc",
            "photo": {"id": "p1", "storagePath": "public/images/a.jpg", "displayName": "A", "fileName": "a.jpg", "price": 499}
        }"#;
        let req: VerifyPaymentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.order_id.as_deref(), Some("order_1"));
        assert_eq!(req.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(req.signature.as_deref(), Some("abc"));
        let photo = req.photo.unwrap();
        assert_eq!(photo.storage_path.as_deref(), Some("public/images/a.jpg"));
        assert_eq!(photo.price, Some(499.0));
    }

    #[test]
    fn test_verify_request_short_names() {
        let json = r#"{"order_id": "order_1", "payment_id": "pay_1", "signature": "abc"}"#;
        let req: VerifyPaymentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.order_id.as_deref(), Some("order_1"));
        assert!(req.photo.is_none());
    }

    #[test]
    fn test_response_is_camel_case() {
        let body = VerifyPaymentResponse {
            success: true,
            purchase_id: "order_1_pay_1".into(),
            download_url: "https://example.com".into(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["purchaseId"], "order_1_pay_1");
        assert_eq!(value["downloadUrl"], "https://example.com");
    }

    #[test]
    fn test_error_response_omits_empty_extras() {
        let body = ErrorResponse {
            error: "Missing bearer token".into(),
            code: "AUTH_MISSING".into(),
            status: None,
            source: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("status").is_none());
        assert!(value.get("source").is_none());
    }
}
