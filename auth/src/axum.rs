//! Axum middleware for HTTP authentication
//!
//! Provides authentication middleware for Axum HTTP services that:
//! 1. Extracts Bearer token from Authorization header
//! 2. Validates it using the configured AuthProvider
//! 3. Injects AuthContext into request extensions
//! 4. Returns 401 Unauthorized on auth failures

use crate::error::AuthError;
use crate::types::AuthProvider;
use axum::{
    Json,
    extract::Request,
    http::{HeaderMap, StatusCode, header::WWW_AUTHENTICATE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::header::AUTHORIZATION;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Body of every 401 caused by a rejected or missing bearer token
pub const NOT_AUTHENTICATED: &str = "You are not authenticated.";

/// Extract the bearer token of the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::BadScheme)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::BadScheme)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(token)
}

/// Axum middleware for bearer token authentication
///
/// # Example
///
/// ```rust,ignore
/// use axum::{Router, middleware};
/// use transcriber_auth::axum::auth_middleware;
///
/// let verifier: Arc<dyn AuthProvider> = Arc::new(TokenVerifier::new(provider));
/// let app = Router::new()
///     .layer(middleware::from_fn(move |req, next| {
///         auth_middleware(verifier.clone(), req, next)
///     }));
/// ```
pub async fn auth_middleware(
    auth_provider: Arc<dyn AuthProvider>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let uri = req.uri().clone();
    let token = bearer_token(req.headers()).inspect_err(|e| {
        warn!("authentication failed uri={uri}: {e}");
    })?;

    let auth_ctx = auth_provider.validate_token(token).await.inspect_err(|e| {
        warn!("authentication failed uri={uri}: {e}");
    })?;

    info!(
        "authenticated: subject={} issuer={}",
        auth_ctx.subject, auth_ctx.issuer
    );

    req.extensions_mut().insert(auth_ctx);
    Ok(next.run(req).await)
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_unauthenticated() {
            return (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, "Bearer")],
                Json(json!({ "detail": NOT_AUTHENTICATED })),
            )
                .into_response();
        }

        let (status, message) = match self {
            AuthError::RefreshFailed => (StatusCode::BAD_REQUEST, "Failed to refresh token"),
            AuthError::StateMismatch | AuthError::InvalidReturnUrl => {
                (StatusCode::BAD_REQUEST, "Invalid login request")
            }
            AuthError::NoUserInfo | AuthError::LoginDenied(_) | AuthError::TokenExchangeFailed => {
                (StatusCode::UNAUTHORIZED, "Login failed")
            }
            AuthError::ProviderUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Identity provider unavailable",
            ),
            e => {
                error!("auth internal error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(AuthError::MissingHeader));

        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().expect("header"));
        assert_eq!(bearer_token(&headers), Err(AuthError::BadScheme));

        headers.insert(AUTHORIZATION, "bearer abc".parse().expect("header"));
        assert_eq!(bearer_token(&headers), Err(AuthError::BadScheme));

        headers.insert(AUTHORIZATION, "Bearer ".parse().expect("header"));
        assert_eq!(bearer_token(&headers), Err(AuthError::Malformed));

        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().expect("header"));
        assert_eq!(bearer_token(&headers), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_error_status_codes() {
        for e in [
            AuthError::Malformed,
            AuthError::UnknownKey,
            AuthError::BadSignature,
            AuthError::BadIssuer,
            AuthError::Expired,
            AuthError::MissingHeader,
            AuthError::BadScheme,
        ] {
            assert_eq!(e.into_response().status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            AuthError::RefreshFailed.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::StateMismatch.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::NoUserInfo.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ProviderUnavailable("down".to_string())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AuthError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
