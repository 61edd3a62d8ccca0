use anyhow::{Result, anyhow};
use serde::Deserialize;

const DEFAULT_JWKS_REFRESH_INTERVAL_SECS: u64 = 3600;

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_jwks_refresh_interval_secs() -> u64 {
    DEFAULT_JWKS_REFRESH_INTERVAL_SECS
}

/// OIDC client registration
///
/// Built once at startup and shared immutably by the verifier, the login flow
/// and the refresh exchanger.
#[derive(Clone, Deserialize)]
pub struct OidcClientConfig {
    /// OIDC provider issuer URL (discovery document lives under it)
    pub issuer: String,
    /// Client ID
    pub client_id: String,
    /// Client secret (confidential client)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Redirect URI of the login callback endpoint
    pub redirect_uri: String,
    /// Base URL of the web application receiving the tokens after login
    pub app_redirect_base: String,
    /// Where logout sends the browser (defaults to `app_redirect_base`)
    #[serde(default)]
    pub post_logout_redirect_uri: Option<String>,
    /// Scopes requested at login, `openid` is always added
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Maximum age of the cached key set in seconds (default: 3600)
    #[serde(default = "default_jwks_refresh_interval_secs")]
    pub jwks_refresh_interval_secs: u64,
}

impl std::fmt::Debug for OidcClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcClientConfig")
            .field("issuer", &self.issuer)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "(not printed)"))
            .field("redirect_uri", &self.redirect_uri)
            .field("app_redirect_base", &self.app_redirect_base)
            .field("post_logout_redirect_uri", &self.post_logout_redirect_uri)
            .field("scopes", &self.scopes)
            .field("jwks_refresh_interval_secs", &self.jwks_refresh_interval_secs)
            .finish()
    }
}

impl OidcClientConfig {
    /// Load configuration from the `TRANSCRIBER_OIDC_CLIENT_CONFIG` environment variable
    pub fn from_env() -> Result<Self> {
        let json = std::env::var("TRANSCRIBER_OIDC_CLIENT_CONFIG")
            .map_err(|_| anyhow!("TRANSCRIBER_OIDC_CLIENT_CONFIG environment variable not set"))?;
        Self::from_json(&json)
    }

    /// Parse configuration from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow!("Failed to parse OIDC client config: {e:?}"))
    }

    /// Post-logout destination
    pub fn post_logout_url(&self) -> &str {
        self.post_logout_redirect_uri
            .as_deref()
            .unwrap_or(&self.app_redirect_base)
    }
}
