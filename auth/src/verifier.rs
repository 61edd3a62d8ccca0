use crate::error::AuthError;
use crate::provider::MetadataProvider;
use crate::types::{AuthContext, AuthProvider};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Signature algorithms accepted for RSA keys
const SUPPORTED_ALGORITHMS: [Algorithm; 6] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

/// Reject tokens that are not `header.payload.signature` with a JSON object payload
///
/// Runs before any key lookup so garbage never reaches the key provider.
fn check_structure(token: &str) -> Result<(), AuthError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::Malformed);
    };
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::Malformed)?;
    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice::<Map<String, Value>>(&payload).map_err(|e| {
        debug!("invalid jwt payload: {e}");
        AuthError::Malformed
    })?;
    Ok(())
}

/// Verifies bearer tokens issued by the identity provider
///
/// A token is trusted only when its signature validates against a key of the
/// current key set, its issuer equals the metadata issuer and its expiry is in
/// the future.
pub struct TokenVerifier {
    provider: Arc<dyn MetadataProvider>,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self { provider }
    }

    /// Verify a token against the current time
    pub async fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.verify_at(token, Utc::now()).await
    }

    /// Verify a token as of `now`
    pub async fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AuthContext, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!("invalid jwt header: {e}");
            AuthError::Malformed
        })?;
        if !SUPPORTED_ALGORITHMS.contains(&header.alg) {
            debug!("unsupported jwt algorithm {:?}", header.alg);
            return Err(AuthError::BadSignature);
        }
        check_structure(token)?;
        let kid = header.kid.as_deref();

        let mut key_set = self.provider.key_set().await?;
        if key_set.find(kid).is_none() {
            debug!("kid {kid:?} not in key set, refreshing");
            key_set = self.provider.refresh_key_set().await?;
        }
        let key = key_set.find(kid).ok_or(AuthError::UnknownKey)?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = SUPPORTED_ALGORITHMS.to_vec();
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let claims = decode::<Map<String, Value>>(token, key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::BadSignature,
                _ => {
                    debug!("token decoding failed: {e}");
                    AuthError::Malformed
                }
            })?
            .claims;

        let metadata = self.provider.metadata().await?;
        let issuer = claims.get("iss").and_then(Value::as_str);
        if issuer != Some(metadata.issuer.as_str()) {
            return Err(AuthError::BadIssuer);
        }

        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or(AuthError::Malformed)?;
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(AuthError::Malformed)?;
        if expires_at <= now {
            return Err(AuthError::Expired);
        }

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or(AuthError::Malformed)?
            .to_string();

        Ok(AuthContext {
            subject,
            issuer: metadata.issuer.clone(),
            expires_at,
            claims,
        })
    }
}

#[async_trait::async_trait]
impl AuthProvider for TokenVerifier {
    async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.verify(token).await.inspect_err(|e| {
            if !e.is_unauthenticated() {
                warn!("token verification could not complete: {e}");
            }
        })
    }
}
