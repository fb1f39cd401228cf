//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `BearerAuthorization`: the raw `Authorization` header, handed to the
//!   pipeline so that authentication runs before the body is looked at.
//! - `WebhookDelivery`: the webhook signature headers and the body bytes
//!   exactly as received.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
};
use photomart_sdk::signature::{WEBHOOK_EVENT_ID_HEADER, WEBHOOK_SIGNATURE_HEADER};
use std::convert::Infallible;

use crate::api::ApiError;

/// Largest webhook body accepted.
pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// The `Authorization` header value, if any.
pub struct BearerAuthorization(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for BearerAuthorization {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header_str(&parts.headers, header::AUTHORIZATION.as_str())))
    }
}

/// A gateway webhook delivery, body untouched.
///
/// The body must not pass through a JSON extractor first: the signature
/// covers the exact bytes, and re-serializing changes them.
pub struct WebhookDelivery {
    pub signature: Option<String>,
    pub event_id: Option<String>,
    pub body: Bytes,
}

impl<S: Send + Sync> FromRequest<S> for WebhookDelivery {
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let signature = header_str(req.headers(), WEBHOOK_SIGNATURE_HEADER);
        let event_id = header_str(req.headers(), WEBHOOK_EVENT_ID_HEADER);
        let body = axum::body::to_bytes(req.into_body(), MAX_WEBHOOK_BODY)
            .await
            .map_err(|_| ApiError::validation("Failed to read request body"))?;
        Ok(Self {
            signature,
            event_id,
            body,
        })
    }
}
