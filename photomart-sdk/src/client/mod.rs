//! HTTP client for the checkout API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod checkout;

pub use checkout::CheckoutClient;

use reqwest::StatusCode;

use crate::objects::ErrorResponse;

/// Errors produced by the SDK HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with its JSON error shape.
    #[error("api error: status {status}, {}: {}", .body.code, .body.error)]
    Api {
        status: StatusCode,
        body: ErrorResponse,
    },

    /// The server returned a non-2xx status code with an unexpected body.
    #[error("unexpected response: status {status}, body: {body}")]
    Unexpected { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        return Err(match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(body) => ClientError::Api { status, body },
            Err(_) => ClientError::Unexpected {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            },
        });
    }
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
