use anyhow::Result;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use std::sync::Arc;
use transcriber_auth::config::OidcClientConfig;
use transcriber_auth::flow::AuthorizationFlow;
use transcriber_auth::provider::MetadataProvider;
use transcriber_auth::refresh::RefreshExchanger;
use transcriber_auth::session::SessionStore;
use transcriber_auth::types::AuthProvider;
use transcriber_auth::verifier::TokenVerifier;

/// Shared state of the gateway handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<OidcClientConfig>,
    pub flow: Arc<AuthorizationFlow>,
    pub refresher: Arc<RefreshExchanger>,
    pub verifier: Arc<dyn AuthProvider>,
    pub sessions: SessionStore,
    cookie_key: Key,
}

impl AppState {
    /// `secret` signs both the cookies and the login state; it must be at
    /// least 32 bytes long.
    pub fn new(
        config: OidcClientConfig,
        provider: Arc<dyn MetadataProvider>,
        sessions: SessionStore,
        secret: &[u8],
    ) -> Result<Self> {
        let config = Arc::new(config);
        let flow = AuthorizationFlow::new(config.clone(), provider.clone(), secret.to_vec())?;
        let refresher = RefreshExchanger::new(config.clone(), provider.clone())?;
        Ok(Self {
            config,
            flow: Arc::new(flow),
            refresher: Arc::new(refresher),
            verifier: Arc::new(TokenVerifier::new(provider)),
            sessions,
            cookie_key: Key::derive_from(secret),
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
