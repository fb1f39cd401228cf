//! Checkout API client (storefront → Photomart backend).
//!
//! Every call carries the buyer's Firebase ID token as a bearer token.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::{
    CreateOrderRequest, CreateOrderResponse, VerifyPaymentRequest, VerifyPaymentResponse,
};

/// Typed HTTP client for the checkout endpoints.
#[derive(Debug, Clone)]
pub struct CheckoutClient {
    http: Client,
    base_url: Url,
    id_token: String,
}

impl CheckoutClient {
    /// Create a new `CheckoutClient`.
    ///
    /// * `base_url` – root URL of the backend (e.g. `https://api.example.com`).
    /// * `id_token` – the signed-in buyer's Firebase ID token.
    pub fn new(base_url: Url, id_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
            id_token: id_token.into(),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one (e.g. to
    /// configure timeouts or a proxy).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Swap the ID token after a refresh.
    pub fn set_id_token(&mut self, id_token: impl Into<String>) {
        self.id_token = id_token.into();
    }

    /// `POST /create-order` – open a gateway order for a photo.
    pub async fn create_order(
        &self,
        payload: &CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ClientError> {
        let url = self.base_url.join("/create-order")?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.id_token)
            .json(payload)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /verify-payment` – hand the checkout widget's result to the
    /// backend and receive the purchase id and download URL.
    pub async fn verify_payment(
        &self,
        payload: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ClientError> {
        let url = self.base_url.join("/verify-payment")?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.id_token)
            .json(payload)
            .send()
            .await?;
        parse_response(resp).await
    }
}
