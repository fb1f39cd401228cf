//! Mapping of pipeline failures onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use photomart_core::pipeline::FulfillmentError;
use photomart_sdk::objects::ErrorResponse;

/// A refused request. Every endpoint answers failures with the same JSON
/// shape: `{error, code}` plus `status` or `source` where relevant.
#[derive(Debug)]
pub struct ApiError(pub FulfillmentError);

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(FulfillmentError::Validation(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            FulfillmentError::AuthMissing | FulfillmentError::AuthInvalid { .. } => {
                StatusCode::UNAUTHORIZED
            }
            FulfillmentError::Validation(_)
            | FulfillmentError::SignatureInvalid(_)
            | FulfillmentError::PaymentNotComplete { .. } => StatusCode::BAD_REQUEST,
            FulfillmentError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().to_owned(),
            status: None,
            source: None,
        };
        match &self.0 {
            FulfillmentError::AuthInvalid { reason } => {
                tracing::debug!(reason = %reason, "Rejected bearer token");
            }
            FulfillmentError::PaymentNotComplete { status } => {
                body.status = Some(status.to_string());
            }
            FulfillmentError::Upstream { provider, message } => {
                tracing::error!(provider = %provider, error = %message, "Upstream failure");
                body.source = Some(provider.to_string());
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photomart_core::gateway::PaymentStatus;
    use photomart_core::pipeline::{SignatureKind, UpstreamProvider};

    async fn render(err: FulfillmentError) -> (StatusCode, serde_json::Value) {
        let response = ApiError(err).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_table() {
        let (status, body) = render(FulfillmentError::AuthMissing).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_MISSING");
        assert_eq!(body["error"], "Missing bearer token");

        let (status, body) = render(FulfillmentError::AuthInvalid {
            reason: "expired".into(),
        })
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_INVALID");
        assert_eq!(body["error"], "Invalid or expired token");

        let (status, body) =
            render(FulfillmentError::SignatureInvalid(SignatureKind::Payment)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid payment signature");
    }

    #[tokio::test]
    async fn test_payment_status_is_echoed() {
        let (status, body) = render(FulfillmentError::PaymentNotComplete {
            status: PaymentStatus::Created,
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PAYMENT_NOT_COMPLETE");
        assert_eq!(body["error"], "Payment not completed");
        assert_eq!(body["status"], "created");
    }

    #[tokio::test]
    async fn test_upstream_names_provider() {
        let (status, body) = render(FulfillmentError::Upstream {
            provider: UpstreamProvider::Gateway,
            message: "The id provided does not exist".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "UPSTREAM_FAILURE");
        assert_eq!(body["error"], "The id provided does not exist");
        assert_eq!(body["source"], "razorpay");
        assert!(body.get("status").is_none());
    }
}
