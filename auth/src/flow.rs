//! OIDC authorization code flow with PKCE
//!
//! - [`AuthorizationFlow::begin_login`] builds the redirect to the provider's
//!   login page.
//! - [`AuthorizationFlow::complete_login`] handles the callback: it checks the
//!   anti-forgery state, exchanges the code for tokens and extracts the user
//!   profile from the ID token.
//!
//! Neither operation touches the session cookie; the caller applies the
//! returned [`SessionUpdate`] only when the login succeeded.

use crate::client::build_oidc_client;
use crate::config::OidcClientConfig;
use crate::error::AuthError;
use crate::oauth_state::{OAuthState, generate_nonce, sign_state, verify_state};
use crate::provider::{MetadataProvider, create_http_client};
use crate::session::{PendingLogin, SessionRecord};
use crate::url_validation::{DEFAULT_RETURN_URL, validate_return_url};
use openidconnect::core::{CoreIdToken, CoreIdTokenClaims, CoreResponseType};
use openidconnect::{
    AuthenticationFlow, AuthorizationCode, ClaimsVerificationError, CsrfToken, Nonce,
    OAuth2TokenResponse, PkceCodeChallenge, PkceCodeVerifier, Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Redirect to the provider's authorization endpoint
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Authorization URL the browser is sent to
    pub authorization_url: Url,
    /// Nonce and PKCE verifier to persist for the duration of the flow
    pub pending: PendingLogin,
}

/// Query parameters of the provider callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Signed state issued by `begin_login`
    pub state: Option<String>,
    /// Error code when the provider refused the login
    pub error: Option<String>,
    /// Human-readable detail accompanying `error`
    pub error_description: Option<String>,
}

/// User profile claims of the ID token
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Subject identifier
    pub sub: String,
    /// Email address, when the `email` scope was granted
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Login name at the provider
    pub preferred_username: Option<String>,
}

impl From<&CoreIdTokenClaims> for UserProfile {
    fn from(claims: &CoreIdTokenClaims) -> Self {
        Self {
            sub: claims.subject().as_str().to_string(),
            email: claims.email().map(|e| e.as_str().to_string()),
            name: claims
                .name()
                .and_then(|n| n.get(None))
                .map(|n| n.as_str().to_string()),
            preferred_username: claims.preferred_username().map(|u| u.as_str().to_string()),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// Tokens to bind to the browser session
    pub session: SessionRecord,
    /// Application landing URL carrying the tokens for client-side pickup
    pub redirect_url: Url,
    /// Profile claims of the verified ID token
    pub profile: UserProfile,
}

/// Drives the authorization code flow against the configured provider
pub struct AuthorizationFlow {
    config: Arc<OidcClientConfig>,
    provider: Arc<dyn MetadataProvider>,
    state_secret: Vec<u8>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("config", &self.config)
            .field("state_secret", &"(not printed)")
            .finish()
    }
}

impl AuthorizationFlow {
    pub fn new(
        config: Arc<OidcClientConfig>,
        provider: Arc<dyn MetadataProvider>,
        state_secret: Vec<u8>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            provider,
            state_secret,
            http_client: create_http_client()?,
        })
    }

    /// Build the authorization URL for a new login
    pub async fn begin_login(&self, return_url: Option<&str>) -> Result<LoginRedirect, AuthError> {
        let return_url = validate_return_url(return_url.unwrap_or(DEFAULT_RETURN_URL))?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let nonce = generate_nonce();
        let oidc_nonce = generate_nonce();
        let signed_state = sign_state(
            &OAuthState {
                nonce: nonce.clone(),
                return_url: return_url.to_string(),
                oidc_nonce: oidc_nonce.clone(),
            },
            &self.state_secret,
        )?;

        let metadata = self.provider.metadata().await?;
        let client = build_oidc_client(&self.config, &metadata, None)?;

        let scopes = self
            .config
            .scopes
            .iter()
            .filter(|s| s.as_str() != "openid")
            .map(|s| Scope::new(s.clone()));
        let (authorization_url, _csrf_token, _nonce) = client
            .authorize_url(
                AuthenticationFlow::<CoreResponseType>::AuthorizationCode,
                move || CsrfToken::new(signed_state),
                move || Nonce::new(oidc_nonce),
            )
            .add_scopes(scopes)
            .set_pkce_challenge(pkce_challenge)
            .url();

        debug!("login redirect to {}", metadata.authorization_endpoint);
        Ok(LoginRedirect {
            authorization_url,
            pending: PendingLogin {
                nonce,
                pkce_verifier: pkce_verifier.secret().to_string(),
            },
        })
    }

    /// Complete a login from the provider callback
    ///
    /// `pending` is the login state persisted by the caller when the login
    /// began.
    pub async fn complete_login(
        &self,
        params: CallbackParams,
        pending: Option<&PendingLogin>,
    ) -> Result<SessionUpdate, AuthError> {
        let state = verify_state(
            params.state.as_deref().ok_or(AuthError::StateMismatch)?,
            &self.state_secret,
        )?;
        let pending = pending
            .filter(|p| p.nonce == state.nonce)
            .ok_or_else(|| {
                warn!("login callback state does not match the login cookie");
                AuthError::StateMismatch
            })?;

        if let Some(error) = params.error {
            warn!(
                "provider refused login: {error} {}",
                params.error_description.as_deref().unwrap_or_default()
            );
            return Err(AuthError::LoginDenied(error));
        }
        let code = params
            .code
            .ok_or_else(|| AuthError::LoginDenied("missing authorization code".to_string()))?;

        let metadata = self.provider.metadata().await?;
        let client = build_oidc_client(&self.config, &metadata, None)?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .map_err(|e| AuthError::Internal(format!("Failed to create code exchange: {e:?}")))?
            .set_pkce_verifier(PkceCodeVerifier::new(pending.pkce_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                warn!("token exchange failed: {e}");
                AuthError::TokenExchangeFailed
            })?;

        let id_token = token_response.id_token().ok_or_else(|| {
            warn!("token response carries no id_token");
            AuthError::NoUserInfo
        })?;
        let nonce = Nonce::new(state.oidc_nonce);
        let profile = self.user_profile(id_token, &nonce).await?;

        let session = SessionRecord {
            access_token: token_response.access_token().secret().to_string(),
            refresh_token: token_response
                .refresh_token()
                .map(|t| t.secret().to_string()),
        };
        let redirect_url = landing_url(&self.config.app_redirect_base, &state.return_url, &session)?;

        info!("login completed for subject={}", profile.sub);
        Ok(SessionUpdate {
            session,
            redirect_url,
            profile,
        })
    }

    /// Verify the ID token and extract its profile claims
    ///
    /// A signature failure is retried once with a refreshed key set.
    async fn user_profile(&self, id_token: &CoreIdToken, nonce: &Nonce) -> Result<UserProfile, AuthError> {
        let metadata = self.provider.metadata().await?;
        let key_set = self.provider.key_set().await?;
        let client = build_oidc_client(&self.config, &metadata, Some(&key_set))?;
        match id_token.claims(&client.id_token_verifier(), nonce) {
            Ok(claims) => return Ok(UserProfile::from(claims)),
            Err(ClaimsVerificationError::SignatureVerification(e)) => {
                debug!("id token signature not verified with cached keys ({e}), refreshing");
            }
            Err(e) => {
                warn!("id token rejected: {e}");
                return Err(AuthError::NoUserInfo);
            }
        }

        let key_set = self.provider.refresh_key_set().await?;
        let client = build_oidc_client(&self.config, &metadata, Some(&key_set))?;
        id_token
            .claims(&client.id_token_verifier(), nonce)
            .map(UserProfile::from)
            .map_err(|e| {
                warn!("id token rejected: {e}");
                AuthError::NoUserInfo
            })
    }
}

/// `{app_redirect_base}{return_url}?token=…[&refresh_token=…]`
fn landing_url(app_redirect_base: &str, return_url: &str, session: &SessionRecord) -> Result<Url, AuthError> {
    let mut url = Url::parse(&format!(
        "{}{return_url}",
        app_redirect_base.trim_end_matches('/')
    ))
    .map_err(|e| AuthError::Internal(format!("Invalid app redirect base: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", &session.access_token);
        if let Some(refresh_token) = &session.refresh_token {
            query.append_pair("refresh_token", refresh_token);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_url_with_refresh_token() {
        let session = SessionRecord {
            access_token: "abc".to_string(),
            refresh_token: Some("def".to_string()),
        };
        let url = landing_url("https://app.example.com", "/", &session).expect("url");
        assert_eq!(
            url.as_str(),
            "https://app.example.com/?token=abc&refresh_token=def"
        );
    }

    #[test]
    fn test_landing_url_without_refresh_token() {
        let session = SessionRecord {
            access_token: "abc".to_string(),
            refresh_token: None,
        };
        let url = landing_url("https://app.example.com/", "/jobs?tab=1", &session).expect("url");
        assert_eq!(url.as_str(), "https://app.example.com/jobs?tab=1&token=abc");
    }

    #[test]
    fn test_landing_url_rejects_bad_base() {
        let session = SessionRecord {
            access_token: "abc".to_string(),
            refresh_token: None,
        };
        assert!(matches!(
            landing_url("not a url", "/", &session),
            Err(AuthError::Internal(_))
        ));
    }
}
