//! Time-limited access to purchased assets.
//!
//! Assets live in a Cloud Storage bucket. A buyer receives a V4 signed URL
//! (`GOOG4-RSA-SHA256`) for the original object, signed with the service
//! account's RSA key, never a public link.

use crate::config::ServiceAccount;
use async_trait::async_trait;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

/// The longest lifetime a V4 signed URL may have.
pub const MAX_SIGNED_URL_TTL: Duration = Duration::from_secs(604_800);

const STORAGE_HOST: &str = "storage.googleapis.com";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing photo storage path")]
    MissingPath,
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("failed to sign url")]
    Signing,
}

/// Reduce a client-supplied storage reference to an object name.
///
/// Accepts bare object names, `/`-prefixed names, `gs://{bucket}/...` URIs
/// and percent-encoded forms of each. An empty result is an error.
pub fn normalize_storage_path(raw: &str) -> Result<String, StorageError> {
    let mut path = raw.trim();
    if let Some(rest) = path.strip_prefix("gs://") {
        path = rest.split_once('/').map(|(_, object)| object).unwrap_or("");
    }
    let decoded = urlencoding::decode(path)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| path.to_owned());
    let object = decoded.trim().trim_start_matches('/');
    if object.is_empty() {
        return Err(StorageError::MissingPath);
    }
    Ok(object.to_owned())
}

/// Mints read URLs for objects in the asset bucket.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// A minted download link and the object it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub object: String,
    pub url: String,
}

/// Normalize `raw_path` and mint a download URL for it.
pub async fn grant(
    signer: &dyn UrlSigner,
    raw_path: &str,
    ttl: Duration,
) -> Result<AccessGrant, StorageError> {
    let object = normalize_storage_path(raw_path)?;
    let url = signer.signed_url(&object, ttl).await?;
    debug!(object = %object, ttl_secs = ttl.as_secs(), "Granted asset access");
    Ok(AccessGrant { object, url })
}

/// Signs V4 URLs locally with a service-account key.
pub struct GcsUrlSigner {
    bucket: String,
    client_email: String,
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl std::fmt::Debug for GcsUrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsUrlSigner")
            .field("bucket", &self.bucket)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

impl GcsUrlSigner {
    pub fn new(bucket: impl Into<String>, account: &ServiceAccount) -> Result<Self, StorageError> {
        let der = pem_to_der(&account.private_key)?;
        let key_pair = RsaKeyPair::from_pkcs8(&der)
            .map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        Ok(Self {
            bucket: bucket.into(),
            client_email: account.client_email.clone(),
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    /// Sign a URL as of `now`.
    pub fn sign_at(
        &self,
        object: &str,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> Result<String, StorageError> {
        let (resource, query, string_to_sign) = self.signing_parts(object, ttl, now);
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &RSA_PKCS1_SHA256,
                &self.rng,
                string_to_sign.as_bytes(),
                &mut signature,
            )
            .map_err(|_| StorageError::Signing)?;
        Ok(format!(
            "https://{STORAGE_HOST}{resource}?{query}&X-Goog-Signature={}",
            hex::encode(signature)
        ))
    }

    /// Returns the canonical resource, the canonical query string and the
    /// string to sign.
    fn signing_parts(
        &self,
        object: &str,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> (String, String, String) {
        let expires = ttl.as_secs().clamp(1, MAX_SIGNED_URL_TTL.as_secs());
        let now = now.to_offset(time::UtcOffset::UTC);
        let date = format!(
            "{:04}{:02}{:02}",
            now.year(),
            u8::from(now.month()),
            now.day()
        );
        let datetime = format!(
            "{date}T{:02}{:02}{:02}Z",
            now.hour(),
            now.minute(),
            now.second()
        );
        let scope = format!("{date}/auto/storage/goog4_request");
        let credential = format!("{}/{scope}", self.client_email);

        let encoded_object = object
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let resource = format!("/{}/{encoded_object}", self.bucket);

        // Already in lexical order.
        let query = [
            ("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_owned()),
            ("X-Goog-Credential", credential),
            ("X-Goog-Date", datetime.clone()),
            ("X-Goog-Expires", expires.to_string()),
            ("X-Goog-SignedHeaders", "host".to_owned()),
        ]
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

        let canonical_request =
            format!("GET\n{resource}\n{query}\nhost:{STORAGE_HOST}\n\nhost\nUNSIGNED-PAYLOAD");
        let digest = ring::digest::digest(&ring::digest::SHA256, canonical_request.as_bytes());
        let string_to_sign = format!(
            "GOOG4-RSA-SHA256\n{datetime}\n{scope}\n{}",
            hex::encode(digest.as_ref())
        );
        (resource, query, string_to_sign)
    }
}

#[async_trait]
impl UrlSigner for GcsUrlSigner {
    async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String, StorageError> {
        self.sign_at(object, ttl, OffsetDateTime::now_utc())
    }
}

fn pem_to_der(pem: &str) -> Result<Vec<u8>, StorageError> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    if body.is_empty() {
        return Err(StorageError::InvalidKey("empty PEM".to_owned()));
    }
    fast32::base64::RFC4648_NOPAD
        .decode_str(body.trim_end_matches('='))
        .map_err(|_| StorageError::InvalidKey("PEM body is not base64".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ring::signature::{RSA_PKCS1_2048_8192_SHA256, UnparsedPublicKey};

    const TEST_KEY_PEM: &str = include_str!("../testdata/test_rsa_key.pem");

    fn signer() -> GcsUrlSigner {
        let account = ServiceAccount {
            project_id: "demo-project".into(),
            client_email: "signer@demo-project.iam.gserviceaccount.com".into(),
            private_key: TEST_KEY_PEM.into(),
        };
        GcsUrlSigner::new("demo-project.appspot.com", &account).unwrap()
    }

    #[test]
    fn test_normalize_storage_path() {
        let cases = [
            ("photos/originals/a.jpg", "photos/originals/a.jpg"),
            ("  /photos/a.jpg  ", "photos/a.jpg"),
            ("gs://demo-project.appspot.com/photos/a.jpg", "photos/a.jpg"),
            ("gs://other-bucket/photos/a.jpg", "photos/a.jpg"),
            ("photos%2Fmy%20pic.jpg", "photos/my pic.jpg"),
            ("%2Fphotos%2Fa.jpg", "photos/a.jpg"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_storage_path(raw).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn test_empty_path_is_rejected() {
        for raw in ["", "   ", "/", "gs://bucket", "gs://bucket/", "%2F"] {
            assert!(
                matches!(normalize_storage_path(raw), Err(StorageError::MissingPath)),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_signed_url_shape() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let url = signer()
            .sign_at("photos/my pic.jpg", MAX_SIGNED_URL_TTL, now)
            .unwrap();
        assert!(url.starts_with(
            "https://storage.googleapis.com/demo-project.appspot.com/photos/my%20pic.jpg?"
        ));
        assert!(url.contains("X-Goog-Algorithm=GOOG4-RSA-SHA256"));
        assert!(url.contains(
            "X-Goog-Credential=signer%40demo-project.iam.gserviceaccount.com%2F20231114%2Fauto%2Fstorage%2Fgoog4_request"
        ));
        assert!(url.contains("X-Goog-Date=20231114T221320Z"));
        assert!(url.contains("X-Goog-Expires=604800"));
    }

    #[test]
    fn test_ttl_is_clamped() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let url = signer()
            .sign_at("a.jpg", Duration::from_secs(30 * 24 * 3600), now)
            .unwrap();
        assert!(url.contains("X-Goog-Expires=604800"));
    }

    #[test]
    fn test_signature_verifies_with_public_key() {
        let signer = signer();
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let url = signer.sign_at("photos/a.jpg", Duration::from_secs(3600), now).unwrap();

        let parsed = url::Url::parse(&url).unwrap();
        let signature = parsed
            .query_pairs()
            .find(|(k, _)| k == "X-Goog-Signature")
            .map(|(_, v)| hex::decode(v.as_bytes()).unwrap())
            .unwrap();
        let (_, _, string_to_sign) =
            signer.signing_parts("photos/a.jpg", Duration::from_secs(3600), now);

        let public_key = UnparsedPublicKey::new(
            &RSA_PKCS1_2048_8192_SHA256,
            signer.key_pair.public().as_ref().to_vec(),
        );
        public_key
            .verify(string_to_sign.as_bytes(), &signature)
            .unwrap();
        assert!(
            public_key
                .verify(b"something else", &signature)
                .is_err()
        );
    }

    struct RecordingSigner;

    #[async_trait]
    impl UrlSigner for RecordingSigner {
        async fn signed_url(&self, object: &str, _ttl: Duration) -> Result<String, StorageError> {
            Ok(format!("signed:{object}"))
        }
    }

    #[tokio::test]
    async fn test_grant_normalizes_before_signing() {
        let access = grant(&RecordingSigner, "gs://b/photos/a.jpg", MAX_SIGNED_URL_TTL)
            .await
            .unwrap();
        assert_eq!(access.object, "photos/a.jpg");
        assert_eq!(access.url, "signed:photos/a.jpg");
        assert!(matches!(
            grant(&RecordingSigner, " ", MAX_SIGNED_URL_TTL).await,
            Err(StorageError::MissingPath)
        ));
    }
}
