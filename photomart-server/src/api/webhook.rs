//! Gateway webhook receiver.
//!
//! # Endpoints
//!
//! - `POST /webhook` – Razorpay event delivery, signed over the raw body

use axum::{Json, Router, extract::State, routing::post};
use photomart_core::pipeline::WebhookOutcome;
use photomart_sdk::objects::WebhookAck;

use crate::api::ApiError;
use crate::api::extractors::WebhookDelivery;
use crate::state::AppState;

/// Build the webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(receive_webhook))
}

/// `POST /webhook`: verify, log and reconcile a delivery.
///
/// Any signature-valid delivery is acknowledged, including ones that could
/// not be matched to an order; redelivering them would not help.
async fn receive_webhook(
    State(state): State<AppState>,
    delivery: WebhookDelivery,
) -> Result<Json<WebhookAck>, ApiError> {
    let outcome = state
        .pipeline
        .receive_webhook(
            delivery.signature.as_deref(),
            delivery.event_id.as_deref(),
            &delivery.body,
        )
        .await?;
    match &outcome {
        WebhookOutcome::Fulfilled(purchase) => {
            tracing::info!(purchase_id = %purchase.purchase_id, "Webhook fulfilled purchase");
        }
        WebhookOutcome::AlreadyFulfilled { purchase_id } => {
            tracing::debug!(purchase_id = %purchase_id, "Webhook for a recorded purchase");
        }
        WebhookOutcome::Unreconciled => {
            tracing::info!("Webhook logged without a matching pending order");
        }
        WebhookOutcome::Logged => {}
    }
    Ok(Json(WebhookAck { received: true }))
}
