//! Identity provider metadata and signing keys
//!
//! Discovery metadata is fetched once and kept for the process lifetime. The
//! JSON Web Key Set is cached with a time-to-live and can be refreshed on
//! demand when a token references a key id the cache does not know yet.

use crate::error::AuthError;
use anyhow::{Result, anyhow};
use base64::Engine;
use jsonwebtoken::DecodingKey;
use moka::future::Cache;
use openidconnect::core::{CoreJsonWebKey, CoreJsonWebKeySet, CoreProviderMetadata};
use openidconnect::{IssuerUrl, JsonWebKey};
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::{BigUint, RsaPublicKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const JWKS_CACHE_KEY: &str = "jwks";

/// Discovery metadata of the identity provider
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Issuer identifier, compared verbatim with the `iss` claim
    pub issuer: String,
    /// Authorization endpoint (login page)
    pub authorization_endpoint: String,
    /// Token endpoint (code exchange and refresh)
    pub token_endpoint: Option<String>,
    /// JWKS endpoint
    pub jwks_uri: String,
    core: CoreProviderMetadata,
}

impl ProviderMetadata {
    pub fn new(core: CoreProviderMetadata) -> Self {
        Self {
            issuer: core.issuer().as_str().to_string(),
            authorization_endpoint: core.authorization_endpoint().url().as_str().to_string(),
            token_endpoint: core.token_endpoint().map(|u| u.url().as_str().to_string()),
            jwks_uri: core.jwks_uri().url().as_str().to_string(),
            core,
        }
    }

    /// Metadata in the shape expected by the openidconnect client
    pub fn core(&self) -> &CoreProviderMetadata {
        &self.core
    }
}

/// Public verification keys of the identity provider, by key id
#[derive(Clone)]
pub struct KeySet {
    jwks: CoreJsonWebKeySet,
    keys: Vec<(Option<String>, DecodingKey)>,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field(
                "kids",
                &self.keys.iter().map(|(kid, _)| kid).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl KeySet {
    /// Build a key set from a JWKS document, skipping keys that are not RSA signing keys
    pub fn from_jwks(jwks: CoreJsonWebKeySet) -> Self {
        let keys = jwks
            .keys()
            .iter()
            .filter_map(|jwk| {
                let kid = jwk.key_id().map(|id| id.as_str().to_string());
                match jwk_to_decoding_key(jwk) {
                    Ok(key) => Some((kid, key)),
                    Err(e) => {
                        debug!("skipping jwk kid={kid:?}: {e}");
                        None
                    }
                }
            })
            .collect();
        Self { jwks, keys }
    }

    /// Find the key for a token header's key id
    ///
    /// A token without a key id only resolves when the set holds a single key.
    pub fn find(&self, kid: Option<&str>) -> Option<&DecodingKey> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|(id, _)| id.as_deref() == Some(kid))
                .map(|(_, key)| key),
            None if self.keys.len() == 1 => self.keys.first().map(|(_, key)| key),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Raw JWKS document, used to verify ID tokens during login
    pub fn jwks(&self) -> &CoreJsonWebKeySet {
        &self.jwks
    }
}

/// Convert an RSA JWK to a DecodingKey for jsonwebtoken
fn jwk_to_decoding_key(jwk: &CoreJsonWebKey) -> Result<DecodingKey> {
    let jwk_json = serde_json::to_value(jwk).map_err(|e| anyhow!("Failed to serialize JWK: {e:?}"))?;

    let kty = jwk_json.get("kty").and_then(|v| v.as_str());
    if kty != Some("RSA") {
        return Err(anyhow!("unsupported key type {kty:?}"));
    }
    if jwk_json.get("use").and_then(|v| v.as_str()) == Some("enc") {
        return Err(anyhow!("encryption key"));
    }

    let n = jwk_json
        .get("n")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("JWK missing 'n' parameter"))?;
    let e = jwk_json
        .get("e")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("JWK missing 'e' parameter"))?;

    let n_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(n.as_bytes())
        .map_err(|e| anyhow!("Failed to decode 'n': {e:?}"))?;
    let e_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(e.as_bytes())
        .map_err(|e| anyhow!("Failed to decode 'e': {e:?}"))?;

    let public_key = RsaPublicKey::new(
        BigUint::from_bytes_be(&n_bytes),
        BigUint::from_bytes_be(&e_bytes),
    )
    .map_err(|e| anyhow!("Failed to create RSA public key: {e:?}"))?;

    let pem = public_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .map_err(|e| anyhow!("Failed to encode public key as PEM: {e:?}"))?;

    DecodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|e| anyhow!("Failed to create decoding key: {e:?}"))
}

/// Source of provider metadata and signing keys
///
/// Implementations must be safe to call concurrently. Duplicate fetches on a
/// cold cache are acceptable; once a value is cached every caller sees it.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Provider discovery metadata, fetched on first use
    async fn metadata(&self) -> Result<Arc<ProviderMetadata>, AuthError>;

    /// Current key set, fetched on first use or after expiry
    async fn key_set(&self) -> Result<Arc<KeySet>, AuthError>;

    /// Drop the cached key set and fetch it again
    async fn refresh_key_set(&self) -> Result<Arc<KeySet>, AuthError>;
}

/// Create HTTP client for provider calls
///
/// Redirects are not followed so a compromised endpoint cannot bounce requests
/// to internal addresses.
pub fn create_http_client() -> Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| anyhow!("Failed to create HTTP client: {e:?}"))
}

async fn discover(issuer_url: &IssuerUrl, http_client: &reqwest::Client) -> Result<ProviderMetadata> {
    let core = CoreProviderMetadata::discover_async(issuer_url.clone(), http_client)
        .await
        .map_err(|e| {
            anyhow!(
                "Failed to discover OIDC metadata from {}: {e:?}",
                issuer_url.as_str()
            )
        })?;
    Ok(ProviderMetadata::new(core))
}

async fn fetch_key_set(jwks_uri: &str, http_client: &reqwest::Client) -> Result<Arc<KeySet>> {
    let jwks: CoreJsonWebKeySet = http_client
        .get(jwks_uri)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to fetch JWKS from {jwks_uri}: {e:?}"))?
        .error_for_status()
        .map_err(|e| anyhow!("JWKS endpoint returned an error: {e:?}"))?
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse JWKS: {e:?}"))?;

    let key_set = KeySet::from_jwks(jwks);
    if key_set.is_empty() {
        return Err(anyhow!("JWKS at {jwks_uri} contains no usable signing key"));
    }
    Ok(Arc::new(key_set))
}

/// Metadata provider backed by OIDC discovery
pub struct OidcMetadataProvider {
    issuer_url: IssuerUrl,
    http_client: reqwest::Client,
    metadata: OnceCell<Arc<ProviderMetadata>>,
    key_cache: Cache<String, Arc<KeySet>>,
}

impl std::fmt::Debug for OidcMetadataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcMetadataProvider")
            .field("issuer_url", &self.issuer_url.as_str())
            .field("metadata_loaded", &self.metadata.initialized())
            .finish()
    }
}

impl OidcMetadataProvider {
    /// Create a provider for `issuer`; nothing is fetched until first use
    pub fn new(issuer: &str, jwks_ttl: Duration) -> Result<Self> {
        let issuer_url = IssuerUrl::new(issuer.to_string())
            .map_err(|e| anyhow!("Invalid issuer URL '{issuer}': {e:?}"))?;
        let key_cache = Cache::builder().time_to_live(jwks_ttl).build();
        Ok(Self {
            issuer_url,
            http_client: create_http_client()?,
            metadata: OnceCell::new(),
            key_cache,
        })
    }
}

#[async_trait::async_trait]
impl MetadataProvider for OidcMetadataProvider {
    async fn metadata(&self) -> Result<Arc<ProviderMetadata>, AuthError> {
        self.metadata
            .get_or_try_init(|| async {
                let metadata = discover(&self.issuer_url, &self.http_client).await?;
                info!(
                    "discovered oidc provider issuer={} jwks_uri={}",
                    metadata.issuer, metadata.jwks_uri
                );
                Ok::<_, anyhow::Error>(Arc::new(metadata))
            })
            .await
            .cloned()
            .map_err(|e| {
                warn!("oidc discovery failed: {e:?}");
                AuthError::ProviderUnavailable(e.to_string())
            })
    }

    async fn key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        let metadata = self.metadata().await?;
        let http_client = self.http_client.clone();

        self.key_cache
            .try_get_with(JWKS_CACHE_KEY.to_string(), async move {
                let key_set = fetch_key_set(&metadata.jwks_uri, &http_client).await?;
                debug!("fetched jwks: {key_set:?}");
                Ok::<_, anyhow::Error>(key_set)
            })
            .await
            .map_err(|e| {
                warn!("jwks fetch failed: {e:?}");
                AuthError::ProviderUnavailable(e.to_string())
            })
    }

    async fn refresh_key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        self.key_cache.invalidate(JWKS_CACHE_KEY).await;
        self.key_set().await
    }
}
