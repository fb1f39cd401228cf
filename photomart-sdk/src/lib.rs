//! Shared types for the Photomart payments backend.
//!
//! * [`signature`]: Razorpay HMAC-SHA256 signing and verification.
//! * [`objects`]: request/response bodies of the HTTP API and the Razorpay
//!   entities the backend consumes.
//! * `client` (feature `client`): a typed HTTP client for the checkout API.

#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod signature;
