//! Anti-forgery state carried through the login redirect
//!
//! The `state` parameter sent to the identity provider is
//! `base64url(json).base64url(hmac_sha256(json))`. The HMAC keeps the return
//! path from being tampered with while the browser is away; the embedded nonce
//! is also stored in a cookie so the callback can prove it belongs to the
//! browser that started the login. The PKCE verifier stays in that cookie and
//! never appears in the state.

use crate::error::AuthError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Login state round-tripped through the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthState {
    /// Anti-forgery nonce, mirrored in the login cookie
    pub nonce: String,
    /// Relative path to land on after login
    pub return_url: String,
    /// Nonce expected in the ID token
    pub oidc_nonce: String,
}

/// Generate a random 256-bit nonce, base64url encoded
pub fn generate_nonce() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn mac(secret: &[u8]) -> Result<HmacSha256, AuthError> {
    HmacSha256::new_from_slice(secret)
        .map_err(|e| AuthError::Internal(format!("Failed to create HMAC: {e}")))
}

/// Sign login state for the `state` query parameter
pub fn sign_state(state: &OAuthState, secret: &[u8]) -> Result<String, AuthError> {
    let state_json = serde_json::to_vec(state)
        .map_err(|e| AuthError::Internal(format!("Failed to serialize state: {e}")))?;

    let mut mac = mac(secret)?;
    mac.update(&state_json);
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&state_json),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Check the signature of a `state` parameter and decode it
pub fn verify_state(signed_state: &str, secret: &[u8]) -> Result<OAuthState, AuthError> {
    let (payload, signature) = signed_state.split_once('.').ok_or_else(|| {
        debug!("state parameter without signature");
        AuthError::StateMismatch
    })?;

    let state_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::StateMismatch)?;
    let signature_bytes = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AuthError::StateMismatch)?;

    let mut mac = mac(secret)?;
    mac.update(&state_bytes);
    mac.verify_slice(&signature_bytes).map_err(|_| {
        debug!("state signature verification failed");
        AuthError::StateMismatch
    })?;

    serde_json::from_slice(&state_bytes).map_err(|_| AuthError::StateMismatch)
}
