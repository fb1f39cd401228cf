//! Signature algorithm and verification for Razorpay callbacks.
//!
//! Razorpay authenticates everything it hands back to us with a hex-encoded
//! HMAC-SHA256. Two messages are signed:
//!
//! * **Payment confirmation** (checkout widget → client → `/verify-payment`):
//!   `HMAC-SHA256("{order_id}|{payment_id}", key_secret)`
//!
//! * **Webhook delivery** (gateway → `/webhook`):
//!   `HMAC-SHA256(raw_request_body, webhook_secret)`, carried in the
//!   `X-Razorpay-Signature` header.
//!
//! Webhook bodies must be verified over the exact bytes received. Parsing
//! and re-serializing JSON does not preserve key order or whitespace.

/// Header carrying the webhook body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Header carrying the unique id of a webhook delivery.
pub const WEBHOOK_EVENT_ID_HEADER: &str = "x-razorpay-event-id";

fn hmac_key(secret: &[u8]) -> ring::hmac::Key {
    ring::hmac::Key::new(ring::hmac::HMAC_SHA256, secret)
}

/// Compute the lowercase hex HMAC-SHA256 of `message`.
pub fn sign(message: &[u8], secret: &[u8]) -> String {
    let tag = ring::hmac::sign(&hmac_key(secret), message);
    hex::encode(tag.as_ref())
}

/// Check a hex HMAC-SHA256 `signature` over `message`.
///
/// Only the canonical lowercase hex form is accepted, so this behaves like
/// exact string equality with the value produced by [`sign`], but the
/// comparison of the MAC itself runs in constant time. Missing secrets and
/// signatures never verify.
pub fn verify(message: &[u8], signature: &str, secret: &[u8]) -> bool {
    if secret.is_empty() || signature.is_empty() {
        return false;
    }
    let Some(raw) = decode_lower_hex(signature) else {
        return false;
    };
    ring::hmac::verify(&hmac_key(secret), message, &raw).is_ok()
}

fn decode_lower_hex(value: &str) -> Option<Vec<u8>> {
    if !value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    hex::decode(value).ok()
}

// ---------------------------------------------------------------------------
// Payment confirmation
// ---------------------------------------------------------------------------

/// The canonical message Razorpay signs on payment completion.
pub fn payment_message(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}|{payment_id}")
}

/// Sign a payment confirmation the way Razorpay does.
pub fn sign_payment(order_id: &str, payment_id: &str, key_secret: &[u8]) -> String {
    sign(payment_message(order_id, payment_id).as_bytes(), key_secret)
}

/// Verify the `razorpay_signature` returned by the checkout widget.
pub fn verify_payment(order_id: &str, payment_id: &str, signature: &str, key_secret: &[u8]) -> bool {
    verify(
        payment_message(order_id, payment_id).as_bytes(),
        signature,
        key_secret,
    )
}

// ---------------------------------------------------------------------------
// Webhook delivery
// ---------------------------------------------------------------------------

/// Sign a raw webhook body.
pub fn sign_webhook(body: &[u8], webhook_secret: &[u8]) -> String {
    sign(body, webhook_secret)
}

/// Verify the `X-Razorpay-Signature` header against the raw webhook body.
pub fn verify_webhook(body: &[u8], signature: &str, webhook_secret: &[u8]) -> bool {
    verify(body, signature, webhook_secret)
}
