//! Payment gateway access.
//!
//! The pipeline never trusts a client-side success callback on its own: the
//! payment is always re-read from the gateway's server API and only
//! `captured`/`authorized` payments are fulfilled.

use crate::config::RazorpayConfig;
use async_trait::async_trait;
use photomart_sdk::objects::OrderEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Gateway-confirmed payment state, fetched fresh for every request.
pub use photomart_sdk::objects::PaymentEntity as VerifiedPayment;
pub use photomart_sdk::objects::PaymentStatus;

/// Errors that can occur while talking to the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status
    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// A gateway order to open for a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGatewayOrder {
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

/// Server-side access to the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Fetch the authoritative state of a payment.
    async fn fetch_payment(&self, payment_id: &str) -> Result<VerifiedPayment, GatewayError>;

    /// Open an order the checkout widget can collect payment against.
    async fn create_order(&self, order: NewGatewayOrder) -> Result<OrderEntity, GatewayError>;
}

/// Razorpay REST API client authenticated with the key id and secret.
pub struct RazorpayClient {
    http: reqwest::Client,
    api_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    /// Create a client from the gateway credentials.
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: ErrorDetail,
        }
        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(default)]
            code: Option<String>,
            #[serde(default)]
            description: Option<String>,
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody { error }) => error
                .description
                .or(error.code)
                .unwrap_or_else(|| status.to_string()),
            Err(_) if text.is_empty() => status.to_string(),
            Err(_) => text,
        };
        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    #[tracing::instrument(skip(self), err, name = "Razorpay:FetchPayment")]
    async fn fetch_payment(&self, payment_id: &str) -> Result<VerifiedPayment, GatewayError> {
        let url = format!(
            "{}/v1/payments/{}",
            self.api_url,
            urlencoding::encode(payment_id)
        );
        let response = self
            .http
            .get(url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await?;
        let payment: VerifiedPayment = Self::parse(response).await?;
        debug!(payment_id = %payment.id, status = %payment.status, "Fetched payment");
        Ok(payment)
    }

    #[tracing::instrument(skip_all, err, name = "Razorpay:CreateOrder")]
    async fn create_order(&self, order: NewGatewayOrder) -> Result<OrderEntity, GatewayError> {
        let response = self
            .http
            .post(format!("{}/v1/orders", self.api_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&order)
            .send()
            .await?;
        let created: OrderEntity = Self::parse(response).await?;
        debug!(order_id = %created.id, amount = created.amount, "Created gateway order");
        Ok(created)
    }
}
