//! TOML file configuration structures.
//!
//! These structs directly map to the `photomart.toml` file format. Every
//! section may be omitted when the values come from the environment.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub razorpay: RazorpayConfig,
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Razorpay credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RazorpayConfig {
    #[serde(default)]
    pub key_id: String,
    #[serde(default)]
    pub key_secret: String,
    #[serde(default)]
    pub webhook_secret: String,
    /// Override of the REST API base URL.
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Firebase project settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirebaseConfig {
    /// Defaults to the service account's project.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Path to the service-account JSON key.
    #[serde(default)]
    pub service_account: Option<PathBuf>,
    /// Override of the ID token signing key endpoint.
    #[serde(default)]
    pub jwks_url: Option<String>,
}

/// Asset bucket settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: String,
    /// Download link lifetime in seconds. At most seven days.
    #[serde(default)]
    pub signed_url_ttl_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[razorpay]
key_id = "rzp_test_key"
key_secret = "secret"
webhook_secret = "whsec"

[firebase]
service_account = "/etc/photomart/service-account.json"

[storage]
bucket = "demo-project.appspot.com"
signed_url_ttl_secs = 3600
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.razorpay.key_id, "rzp_test_key");
        assert!(config.razorpay.api_url.is_none());
        assert_eq!(
            config.firebase.service_account,
            Some(PathBuf::from("/etc/photomart/service-account.json"))
        );
        assert_eq!(config.storage.signed_url_ttl_secs, Some(3600));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert!(config.razorpay.key_secret.is_empty());
        assert!(config.storage.bucket.is_empty());
    }
}
