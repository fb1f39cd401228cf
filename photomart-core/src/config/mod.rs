//! Configuration types for the Photomart payments backend.
//!
//! These types represent the validated runtime configuration and are shared
//! across crates. Reading the TOML file and the environment is handled by
//! the server crate.

mod firebase;
mod razorpay;
mod server;
mod storage;

pub use firebase::{FirebaseConfig, ServiceAccount, ServiceAccountError};
pub use razorpay::RazorpayConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;
