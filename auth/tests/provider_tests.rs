use std::sync::Arc;
use std::time::Duration;
use transcriber_auth::error::AuthError;
use transcriber_auth::provider::{MetadataProvider, OidcMetadataProvider};
use transcriber_auth::test_utils::{MockIdentityProvider, create_valid_token};
use transcriber_auth::verifier::TokenVerifier;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn jwks_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/jwks")
        .count()
}

#[tokio::test]
async fn test_discovery() {
    let idp = MockIdentityProvider::start().await;
    let provider = OidcMetadataProvider::new(&idp.issuer(), Duration::from_secs(3600))
        .expect("create provider");

    let metadata = provider.metadata().await.expect("discovery");
    assert_eq!(metadata.issuer, idp.issuer());
    assert_eq!(
        metadata.authorization_endpoint,
        format!("{}/authorize", idp.issuer())
    );
    assert_eq!(
        metadata.token_endpoint.as_deref(),
        Some(format!("{}/token", idp.issuer()).as_str())
    );
    assert_eq!(metadata.jwks_uri, format!("{}/jwks", idp.issuer()));

    let key_set = provider.key_set().await.expect("key set");
    assert_eq!(key_set.len(), 1);
    assert!(key_set.find(Some("test-key-1")).is_some());
}

#[tokio::test]
async fn test_key_set_cached_until_refresh() {
    let idp = MockIdentityProvider::start().await;
    let provider = OidcMetadataProvider::new(&idp.issuer(), Duration::from_secs(3600))
        .expect("create provider");

    provider.key_set().await.expect("key set");
    let after_first = jwks_requests(&idp.server).await;

    provider.key_set().await.expect("key set");
    assert_eq!(jwks_requests(&idp.server).await, after_first);

    provider.refresh_key_set().await.expect("refreshed key set");
    assert_eq!(jwks_requests(&idp.server).await, after_first + 1);
}

#[tokio::test]
async fn test_discovery_failure_is_provider_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = OidcMetadataProvider::new(&server.uri(), Duration::from_secs(3600))
        .expect("create provider");
    assert!(matches!(
        provider.metadata().await,
        Err(AuthError::ProviderUnavailable(_))
    ));
    assert!(matches!(
        provider.key_set().await,
        Err(AuthError::ProviderUnavailable(_))
    ));
}

#[tokio::test]
async fn test_verifier_reports_unreachable_provider() {
    // nothing listens on port 1
    let provider: Arc<dyn MetadataProvider> = Arc::new(
        OidcMetadataProvider::new("http://127.0.0.1:1", Duration::from_secs(3600))
            .expect("create provider"),
    );
    let verifier = TokenVerifier::new(provider);

    let idp = MockIdentityProvider::start().await;
    let token = create_valid_token(&idp.keypair, &idp.issuer(), "alice");
    assert!(matches!(
        verifier.verify(&token).await,
        Err(AuthError::ProviderUnavailable(_))
    ));
}

#[tokio::test]
async fn test_verify_against_discovered_keys() {
    let idp = MockIdentityProvider::start().await;
    let provider: Arc<dyn MetadataProvider> = Arc::new(
        OidcMetadataProvider::new(&idp.issuer(), Duration::from_secs(3600))
            .expect("create provider"),
    );
    let verifier = TokenVerifier::new(provider);

    let token = create_valid_token(&idp.keypair, &idp.issuer(), "alice");
    let ctx = verifier.verify(&token).await.expect("valid token");
    assert_eq!(ctx.subject, "alice");
    assert_eq!(ctx.issuer, idp.issuer());
}

#[test]
fn test_invalid_issuer_url() {
    assert!(OidcMetadataProvider::new("not a url", Duration::from_secs(60)).is_err());
}
