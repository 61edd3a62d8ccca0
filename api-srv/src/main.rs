use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transcriber_api_srv::config::{Args, normalize_api_prefix, validate_secret_key};
use transcriber_api_srv::state::AppState;
use transcriber_api_srv::{build_router, cors_layer};
use transcriber_auth::config::OidcClientConfig;
use transcriber_auth::provider::OidcMetadataProvider;
use transcriber_auth::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let api_prefix = normalize_api_prefix(&args.api_prefix)?;
    let secret = validate_secret_key(&args.secret_key)?;

    let oidc_config = OidcClientConfig::from_env().context("Failed to load OIDC client config")?;
    info!("oidc client config: {oidc_config:?}");

    // discovery happens on first use, a provider outage does not prevent startup
    let provider = Arc::new(OidcMetadataProvider::new(
        &oidc_config.issuer,
        Duration::from_secs(oidc_config.jwks_refresh_interval_secs),
    )?);
    let sessions = SessionStore::new(args.cookie_domain.clone(), args.secure_cookies);
    let state = AppState::new(oidc_config, provider, sessions, secret)?;

    let app = build_router(state, &api_prefix, cors_layer(&args.cors_origin)?);

    info!("transcriber gateway listening on {}", args.listen);
    info!("CORS origin configured for: {}", args.cors_origin);
    info!("API prefix: '{api_prefix}'");

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    axum::serve(listener, app).await?;
    Ok(())
}
