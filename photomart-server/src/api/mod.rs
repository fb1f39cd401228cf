//! HTTP API of the payments backend.

mod checkout;
mod error;
mod extractors;
mod webhook;

pub use error::ApiError;

use axum::Router;

use crate::state::AppState;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(checkout::router())
        .merge(webhook::router())
}

#[cfg(test)]
mod tests {
    use crate::server::build_router;
    use crate::state::AppState;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
    };
    use photomart_core::config::RazorpayConfig;
    use photomart_core::gateway::PaymentStatus;
    use photomart_core::identity::Caller;
    use photomart_core::ledger::MemoryLedger;
    use photomart_core::pipeline::PaymentPipeline;
    use photomart_core::storage::MAX_SIGNED_URL_TTL;
    use photomart_core::testing::{CallLog, FakeGateway, FakeIdentity, FakeSigner, payment};
    use photomart_sdk::signature;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY_SECRET: &str = "key_secret";
    const WEBHOOK_SECRET: &str = "whsec_test";

    struct TestApp {
        router: Router,
        ledger: Arc<MemoryLedger>,
        gateway: Arc<FakeGateway>,
        log: CallLog,
    }

    fn app() -> TestApp {
        let log = CallLog::default();
        let identity = FakeIdentity::new(log.clone())
            .with_token("good-token", Caller::new("buyer-1", None));
        let gateway = Arc::new(FakeGateway::new(log.clone()));
        let ledger = Arc::new(MemoryLedger::new());
        let pipeline = PaymentPipeline::new(
            Arc::new(identity),
            gateway.clone(),
            Arc::new(FakeSigner::new(log.clone())),
            ledger.clone(),
            RazorpayConfig::new("rzp_test_key", KEY_SECRET, WEBHOOK_SECRET),
            MAX_SIGNED_URL_TTL,
        );
        TestApp {
            router: build_router(AppState::new(pipeline)),
            ledger,
            gateway,
            log,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn verify_request(token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::post("/verify-payment").header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn claim_body(order_id: &str, payment_id: &str) -> Value {
        json!({
            "razorpay_order_id": order_id,
            "razorpay_payment_id": payment_id,
            "razorpay_signature": signature::sign_payment(order_id, payment_id, KEY_SECRET.as_bytes()),
            "photo": {
                "id": "photo_1",
                "storagePath": "public/images/a.jpg",
                "displayName": "Sunset",
                "fileName": "a.jpg"
            }
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_verify_payment_success() {
        let app = app();
        app.gateway
            .put_payment(payment("pay_1", "order_1", PaymentStatus::Captured, 49900));

        let (status, body) = send(
            &app.router,
            verify_request(Some("good-token"), &claim_body("order_1", "pay_1")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["purchaseId"], "order_1_pay_1");
        assert!(!body["downloadUrl"].as_str().unwrap().is_empty());
        assert_eq!(app.ledger.purchases().len(), 1);
    }

    #[tokio::test]
    async fn test_verify_payment_without_auth_touches_nothing() {
        let app = app();
        let (status, body) = send(
            &app.router,
            verify_request(None, &claim_body("order_1", "pay_1")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_MISSING");
        assert!(app.log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_verify_payment_auth_precedes_body_parsing() {
        let app = app();
        let request = Request::post("/verify-payment")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_MISSING");

        let request = Request::post("/verify-payment")
            .header(header::AUTHORIZATION, "Bearer good-token")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_verify_payment_invalid_token() {
        let app = app();
        let (status, body) = send(
            &app.router,
            verify_request(Some("forged"), &claim_body("order_1", "pay_1")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_INVALID");
    }

    #[tokio::test]
    async fn test_verify_payment_not_captured() {
        let app = app();
        app.gateway
            .put_payment(payment("pay_1", "order_1", PaymentStatus::Created, 49900));
        let (status, body) = send(
            &app.router,
            verify_request(Some("good-token"), &claim_body("order_1", "pay_1")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PAYMENT_NOT_COMPLETE");
        assert_eq!(body["status"], "created");
        assert!(app.ledger.purchases().is_empty());
    }

    #[tokio::test]
    async fn test_verify_payment_bad_signature() {
        let app = app();
        let mut claim = claim_body("order_1", "pay_1");
        claim["razorpay_signature"] = json!("00".repeat(32));
        let (status, body) = send(&app.router, verify_request(Some("good-token"), &claim)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid payment signature");
    }

    #[tokio::test]
    async fn test_create_order() {
        let app = app();
        let request = Request::post("/create-order")
            .header(header::AUTHORIZATION, "Bearer good-token")
            .body(Body::from(
                json!({"amount": 49900, "photo": {"id": "photo_1", "storagePath": "public/images/a.jpg"}})
                    .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["orderId"], "order_fake1");
        assert_eq!(body["keyId"], "rzp_test_key");
        assert_eq!(body["currency"], "INR");
    }

    #[tokio::test]
    async fn test_webhook_signature_over_raw_body() {
        let app = app();
        let raw = r#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_1","status":"captured","amount":49900,"currency":"INR"}}}}"#;

        let request = Request::post("/webhook")
            .header("x-razorpay-signature", "deadbeef")
            .body(Body::from(raw))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "SIGNATURE_INVALID");
        assert!(app.ledger.webhooks().is_empty());

        let request = Request::post("/webhook")
            .header(
                "x-razorpay-signature",
                signature::sign_webhook(raw.as_bytes(), WEBHOOK_SECRET.as_bytes()),
            )
            .header("x-razorpay-event-id", "evt_1")
            .body(Body::from(raw))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"received": true}));

        let logged = app.ledger.webhooks();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].payload, raw);
        assert_eq!(logged[0].event_id.as_deref(), Some("evt_1"));
    }

    #[tokio::test]
    async fn test_webhook_missing_signature() {
        let app = app();
        let request = Request::post("/webhook")
            .body(Body::from(r#"{"event":"payment.captured"}"#))
            .unwrap();
        let (status, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid webhook signature");
    }
}
