use crate::client::build_oidc_client;
use crate::config::OidcClientConfig;
use crate::error::AuthError;
use crate::provider::{MetadataProvider, create_http_client};
use openidconnect::{OAuth2TokenResponse, RefreshToken};
use std::sync::Arc;
use tracing::{info, warn};

/// Exchanges refresh tokens for new access tokens at the provider's token endpoint
///
/// Every failure is reported as [`AuthError::RefreshFailed`]; provider error
/// bodies and transport details only reach the logs. A refresh token returned
/// by the provider is ignored, the caller keeps using the one it has.
pub struct RefreshExchanger {
    config: Arc<OidcClientConfig>,
    provider: Arc<dyn MetadataProvider>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for RefreshExchanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshExchanger")
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

impl RefreshExchanger {
    pub fn new(
        config: Arc<OidcClientConfig>,
        provider: Arc<dyn MetadataProvider>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            provider,
            http_client: create_http_client()?,
        })
    }

    /// Mint a new access token from `refresh_token`
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let metadata = self.provider.metadata().await.map_err(|e| {
            warn!("refresh unavailable: {e}");
            AuthError::RefreshFailed
        })?;
        let client = build_oidc_client(&self.config, &metadata, None).map_err(|e| {
            warn!("refresh unavailable: {e}");
            AuthError::RefreshFailed
        })?;

        let token_response = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .map_err(|e| {
                warn!("refresh token exchange setup failed: {e}");
                AuthError::RefreshFailed
            })?
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                warn!("refresh token exchange failed: {e}");
                AuthError::RefreshFailed
            })?;

        info!("access token refreshed");
        Ok(token_response.access_token().secret().to_string())
    }
}
