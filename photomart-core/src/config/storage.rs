//! Object storage configuration.

use std::time::Duration;

/// Where purchased assets live and how long download links stay valid.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding the original photos.
    pub bucket: String,
    /// Lifetime of minted download URLs.
    pub signed_url_ttl: Duration,
}

impl StorageConfig {
    /// Seven days, the longest a V4 signed URL may live.
    pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            signed_url_ttl: Self::DEFAULT_SIGNED_URL_TTL,
        }
    }
}
