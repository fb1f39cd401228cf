//! Checkout API handlers.
//!
//! Called by the storefront with the buyer's Firebase ID token in the
//! `Authorization: Bearer` header.
//!
//! # Endpoints
//!
//! - `POST /create-order`   – open a gateway order for a photo
//! - `POST /verify-payment` – verify a completed checkout and fulfill it

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use photomart_sdk::objects::{
    CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};
use serde::de::DeserializeOwned;

use crate::api::ApiError;
use crate::api::extractors::BearerAuthorization;
use crate::state::AppState;

/// Build the Checkout API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify-payment", post(verify_payment))
}

/// Parse a JSON body that was held back until the caller authenticated.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))
}

/// `POST /create-order`: open a Razorpay order the checkout widget can pay.
async fn create_order(
    State(state): State<AppState>,
    BearerAuthorization(authorization): BearerAuthorization,
    body: Bytes,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let caller = state.pipeline.authenticate(authorization.as_deref()).await?;
    let request: CreateOrderRequest = parse_body(&body)?;
    let created = state.pipeline.create_order(&caller, request).await?;
    Ok(Json(created))
}

/// `POST /verify-payment`: check the checkout callback and hand out the
/// download link.
async fn verify_payment(
    State(state): State<AppState>,
    BearerAuthorization(authorization): BearerAuthorization,
    body: Bytes,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let caller = state.pipeline.authenticate(authorization.as_deref()).await?;
    let request: VerifyPaymentRequest = parse_body(&body)?;
    let fulfilled = state.pipeline.fulfill(&caller, request).await?;
    Ok(Json(VerifyPaymentResponse {
        success: true,
        purchase_id: fulfilled.purchase_id,
        download_url: fulfilled.download_url,
    }))
}
