use crate::error::AuthError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Authentication context of a verified bearer token
///
/// Inserted into the request extensions by the gateway middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Subject identifier (`sub` claim)
    pub subject: String,
    /// Issuer (`iss` claim), equal to the provider metadata issuer
    pub issuer: String,
    /// Token expiration time
    pub expires_at: DateTime<Utc>,
    /// Full claim set of the token
    pub claims: Map<String, Value>,
}

impl AuthContext {
    /// Email claim, if the provider included one
    pub fn email(&self) -> Option<&str> {
        self.claims.get("email").and_then(Value::as_str)
    }
}

/// Trait for bearer token validation
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Validate a bearer token and return authentication context
    async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError>;
}
