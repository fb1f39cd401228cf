//! Razorpay gateway credentials.

/// Credentials for the Razorpay REST API and webhook verification.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id, also handed to the checkout widget.
    pub key_id: String,
    /// API key secret. Also the HMAC key of payment confirmations.
    pub key_secret: String,
    /// Secret configured on the dashboard for webhook signatures.
    pub webhook_secret: String,
    /// Base URL of the REST API.
    pub api_url: String,
}

impl RazorpayConfig {
    pub const DEFAULT_API_URL: &str = "https://api.razorpay.com";

    /// Create a new RazorpayConfig against the public API.
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            webhook_secret: webhook_secret.into(),
            api_url: Self::DEFAULT_API_URL.to_owned(),
        }
    }

    /// Get the key secret bytes for HMAC verification.
    pub fn key_secret_bytes(&self) -> &[u8] {
        self.key_secret.as_bytes()
    }

    /// Get the webhook secret bytes for HMAC verification.
    pub fn webhook_secret_bytes(&self) -> &[u8] {
        self.webhook_secret.as_bytes()
    }
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("webhook_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}
