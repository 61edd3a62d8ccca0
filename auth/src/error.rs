use thiserror::Error;

/// Classified authentication failure
///
/// The variant is kept for logs and diagnostics. HTTP responses collapse the
/// token rejections into a single "not authenticated" answer, see
/// [`crate::axum`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not a well-formed JWT or lacks a required claim
    #[error("malformed token")]
    Malformed,
    /// No key in the key set matches the token's key id, even after a refresh
    #[error("signing key not found in key set")]
    UnknownKey,
    /// Signature does not validate against the located key
    #[error("invalid token signature")]
    BadSignature,
    /// `iss` claim differs from the provider metadata issuer
    #[error("invalid token issuer")]
    BadIssuer,
    /// `exp` claim is not in the future
    #[error("token expired")]
    Expired,
    /// No Authorization header on a protected request
    #[error("no authorization header found")]
    MissingHeader,
    /// Authorization header does not use the Bearer scheme
    #[error("invalid authorization header format")]
    BadScheme,
    /// The login callback yielded no verifiable user profile claims
    #[error("failed to get user info from token response")]
    NoUserInfo,
    /// Discovery metadata or key set could not be fetched or parsed
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Refresh token exchange failed for any reason
    #[error("failed to refresh token")]
    RefreshFailed,
    /// Anti-forgery state missing, tampered or not matching the login cookie
    #[error("oauth state mismatch")]
    StateMismatch,
    /// Requested post-login return path is not a safe relative path
    #[error("invalid return url")]
    InvalidReturnUrl,
    /// Provider redirected back with an error or without an authorization code
    #[error("login denied by provider: {0}")]
    LoginDenied(String),
    /// Authorization code could not be exchanged for tokens
    #[error("authorization code exchange failed")]
    TokenExchangeFailed,
    /// Misconfiguration detected while serving a request
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for failures that mean "the presented credentials are not valid"
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::Malformed
                | AuthError::UnknownKey
                | AuthError::BadSignature
                | AuthError::BadIssuer
                | AuthError::Expired
                | AuthError::MissingHeader
                | AuthError::BadScheme
        )
    }
}
