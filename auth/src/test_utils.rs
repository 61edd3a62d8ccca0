//! Helpers for testing against a fake identity provider
//!
//! Enabled with the `test-utils` feature.

use crate::error::AuthError;
use crate::provider::{KeySet, MetadataProvider, ProviderMetadata};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use openidconnect::core::{CoreJsonWebKeySet, CoreProviderMetadata};
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test key pair for signing tokens, published as an RSA JWK
pub struct TestKeyPair {
    pub kid: String,
    encoding_key: EncodingKey,
    n: String,
    e: String,
}

impl TestKeyPair {
    /// Generate a new 2048-bit RSA key pair
    pub fn generate(kid: &str) -> Self {
        let mut rng = rand::thread_rng();
        let private_key =
            RsaPrivateKey::new(&mut rng, 2048).expect("failed to generate RSA private key");
        let private_pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("failed to encode private key as PEM");
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .expect("failed to create encoding key");

        Self {
            kid: kid.to_string(),
            encoding_key,
            n: URL_SAFE_NO_PAD.encode(private_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(private_key.e().to_bytes_be()),
        }
    }

    /// Public key as a JWK
    pub fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": self.kid,
            "n": self.n,
            "e": self.e,
        })
    }

    /// Sign `claims` with RS256, the header carrying this key's kid
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key).expect("failed to encode token")
    }

    /// Sign `claims` with RS256 without a kid in the header
    pub fn sign_without_kid<T: Serialize>(&self, claims: &T) -> String {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .expect("failed to encode token")
    }
}

/// JWKS document publishing `keys`
pub fn jwks_document(keys: &[&TestKeyPair]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// Minimal OIDC discovery document for `issuer`
pub fn discovery_document(issuer: &str) -> Value {
    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{issuer}/authorize"),
        "token_endpoint": format!("{issuer}/token"),
        "jwks_uri": format!("{issuer}/jwks"),
        "response_types_supported": ["code"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["RS256"],
    })
}

/// Access token claims valid for one hour
pub fn access_claims(issuer: &str, subject: &str) -> Value {
    let now = Utc::now();
    json!({
        "iss": issuer,
        "sub": subject,
        "aud": "account",
        "email": format!("{subject}@example.com"),
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
    })
}

/// Create a valid signed access token
pub fn create_valid_token(keypair: &TestKeyPair, issuer: &str, subject: &str) -> String {
    keypair.sign(&access_claims(issuer, subject))
}

/// Create a token that expired one hour ago
pub fn create_expired_token(keypair: &TestKeyPair, issuer: &str, subject: &str) -> String {
    let now = Utc::now();
    let mut claims = access_claims(issuer, subject);
    claims["iat"] = json!((now - Duration::hours(2)).timestamp());
    claims["exp"] = json!((now - Duration::hours(1)).timestamp());
    keypair.sign(&claims)
}

/// Create a token issued by `wrong-{issuer}`
pub fn create_wrong_issuer_token(keypair: &TestKeyPair, issuer: &str, subject: &str) -> String {
    keypair.sign(&access_claims(&format!("wrong-{issuer}"), subject))
}

/// ID token claims as issued at the end of a login
pub fn id_token_claims(issuer: &str, audience: &str, subject: &str, nonce: &str) -> Value {
    let now = Utc::now();
    json!({
        "iss": issuer,
        "sub": subject,
        "aud": audience,
        "nonce": nonce,
        "email": format!("{subject}@example.com"),
        "name": "Test User",
        "preferred_username": subject,
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
    })
}

/// In-memory metadata provider
///
/// `publish` changes the keys the "remote" endpoint serves without touching
/// the cache, mimicking a key rotation at the provider.
pub struct StaticMetadataProvider {
    metadata: Arc<ProviderMetadata>,
    published: Mutex<Arc<KeySet>>,
    cached: Mutex<Option<Arc<KeySet>>>,
    /// Calls of any provider operation
    pub calls: AtomicUsize,
    /// Reads of the published key set
    pub key_fetches: AtomicUsize,
    /// Calls of `refresh_key_set`
    pub refreshes: AtomicUsize,
}

impl StaticMetadataProvider {
    pub fn new(issuer: &str, keys: &[&TestKeyPair]) -> Self {
        let core: CoreProviderMetadata = serde_json::from_value(discovery_document(issuer))
            .expect("failed to parse discovery document");
        Self {
            metadata: Arc::new(ProviderMetadata::new(core)),
            published: Mutex::new(Arc::new(key_set(keys))),
            cached: Mutex::new(None),
            calls: AtomicUsize::new(0),
            key_fetches: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Replace the published keys
    pub fn publish(&self, keys: &[&TestKeyPair]) {
        *self.published.lock().expect("lock") = Arc::new(key_set(keys));
    }

    fn fetch(&self) -> Arc<KeySet> {
        self.key_fetches.fetch_add(1, Ordering::SeqCst);
        let key_set = self.published.lock().expect("lock").clone();
        *self.cached.lock().expect("lock") = Some(key_set.clone());
        key_set
    }
}

/// Build a key set from test key pairs
pub fn key_set(keys: &[&TestKeyPair]) -> KeySet {
    let jwks: CoreJsonWebKeySet =
        serde_json::from_value(jwks_document(keys)).expect("failed to parse jwks");
    KeySet::from_jwks(jwks)
}

#[async_trait::async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn metadata(&self) -> Result<Arc<ProviderMetadata>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata.clone())
    }

    async fn key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cached = self.cached.lock().expect("lock").clone();
        Ok(cached.unwrap_or_else(|| self.fetch()))
    }

    async fn refresh_key_set(&self) -> Result<Arc<KeySet>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(self.fetch())
    }
}

/// Identity provider served by wiremock: discovery document and JWKS
pub struct MockIdentityProvider {
    pub server: MockServer,
    pub keypair: TestKeyPair,
}

impl MockIdentityProvider {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let keypair = TestKeyPair::generate("test-key-1");

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(discovery_document(&server.uri())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(&[&keypair])))
            .mount(&server)
            .await;

        Self { server, keypair }
    }

    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// Answer token endpoint calls with `status` and `body`
    pub async fn mount_token_response(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
