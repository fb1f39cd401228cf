//! Firebase Auth ID token verification.
//!
//! ID tokens are RS256 JWTs signed by Google's `securetoken` service
//! account. A token is accepted when its `kid` names a published key, the
//! signature verifies, `aud` is the project id, `iss` is
//! `https://securetoken.google.com/{project_id}`, `sub` is non-empty and
//! `exp`/`iat` are sane.

use super::{Caller, IdentityError, IdentityVerifier};
use crate::config::FirebaseConfig;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Used when the key endpoint sends no usable `Cache-Control`.
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// An unknown `kid` refetches a fresh key set at most this often.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    /// `None` for keys supplied up front, which never expire.
    expires_at: Option<Instant>,
    fetched_at: Instant,
}

impl KeyCache {
    fn is_fresh(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }

    /// Whether a fresh cache may be refetched to look for a rotated key.
    fn may_refetch(&self) -> bool {
        self.expires_at.is_some() && self.fetched_at.elapsed() >= MIN_REFETCH_INTERVAL
    }

    /// Whether this cache answers for `kid` without a refetch.
    fn is_settled(&self, kid: &str) -> bool {
        self.is_fresh() && (self.keys.contains_key(kid) || !self.may_refetch())
    }
}

fn unknown_kid(kid: &str) -> IdentityError {
    IdentityError::Invalid(format!("unknown key id {kid}"))
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

/// Verifies Firebase ID tokens against Google's published signing keys.
pub struct FirebaseTokenVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    cache: RwLock<Option<KeyCache>>,
}

impl FirebaseTokenVerifier {
    /// Create a verifier that fetches keys from `config.jwks_url`.
    pub fn new(config: &FirebaseConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            jwks_url: config.jwks_url.clone(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            cache: RwLock::new(None),
        }
    }

    /// Create a verifier with a fixed key set and no network access.
    pub fn with_static_keys(
        project_id: impl Into<String>,
        keys: impl IntoIterator<Item = (String, DecodingKey)>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            jwks_url: String::new(),
            http: reqwest::Client::new(),
            cache: RwLock::new(Some(KeyCache {
                keys: keys.into_iter().collect(),
                expires_at: None,
                fetched_at: Instant::now(),
            })),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation.set_required_spec_claims(&["exp", "iat", "aud", "iss", "sub"]);
        validation
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cache = self.cache.read().await;
            if let Some(cache) = cache.as_ref().filter(|c| c.is_settled(kid)) {
                return cache.keys.get(kid).cloned().ok_or_else(|| unknown_kid(kid));
            }
        }

        // Stale cache or a possibly rotated key. Requests that queued on the
        // lock behind a refetch reuse its result.
        let mut cache = self.cache.write().await;
        if let Some(current) = cache.as_ref().filter(|c| c.is_settled(kid)) {
            return current.keys.get(kid).cloned().ok_or_else(|| unknown_kid(kid));
        }
        let fresh = self.fetch_keys().await?;
        let key = fresh.keys.get(kid).cloned();
        *cache = Some(fresh);
        key.ok_or_else(|| unknown_kid(kid))
    }

    async fn fetch_keys(&self) -> Result<KeyCache, IdentityError> {
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IdentityError::Upstream(format!(
                "key endpoint returned {}",
                response.status()
            )));
        }
        let ttl = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_TTL);
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| IdentityError::Upstream(e.to_string()))?;

        let mut keys = HashMap::with_capacity(set.keys.len());
        for jwk in set.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => debug!(kid = %jwk.kid, error = %e, "Skipping unusable signing key"),
            }
        }
        info!(keys = keys.len(), ttl_secs = ttl.as_secs(), "Refreshed ID token signing keys");
        let fetched_at = Instant::now();
        Ok(KeyCache {
            keys,
            expires_at: Some(fetched_at + ttl),
            fetched_at,
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<Caller, IdentityError> {
        let header =
            jsonwebtoken::decode_header(token).map_err(|e| IdentityError::Invalid(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(IdentityError::Invalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::Invalid("token has no key id".to_owned()))?;
        let key = self.key_for(&kid).await?;

        let data = jsonwebtoken::decode::<FirebaseClaims>(token, &key, &self.validation())
            .map_err(|e| IdentityError::Invalid(e.to_string()))?;
        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(IdentityError::Invalid("empty subject".to_owned()));
        }
        Ok(Caller {
            uid: claims.sub,
            email: claims.email,
            claims: claims.rest,
        })
    }
}

/// Read `max-age` out of a `Cache-Control` header value.
fn parse_max_age(value: &str) -> Option<Duration> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
