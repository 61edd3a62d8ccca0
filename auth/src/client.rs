use crate::config::OidcClientConfig;
use crate::error::AuthError;
use crate::provider::{KeySet, ProviderMetadata};
use openidconnect::{AuthType, ClientId, ClientSecret, RedirectUrl};

/// Type alias for the OIDC client with endpoints set from provider metadata
pub(crate) type ConfiguredCoreClient = openidconnect::Client<
    openidconnect::EmptyAdditionalClaims,
    openidconnect::core::CoreAuthDisplay,
    openidconnect::core::CoreGenderClaim,
    openidconnect::core::CoreJweContentEncryptionAlgorithm,
    openidconnect::core::CoreJsonWebKey,
    openidconnect::core::CoreAuthPrompt,
    openidconnect::StandardErrorResponse<openidconnect::core::CoreErrorResponseType>,
    openidconnect::core::CoreTokenResponse,
    openidconnect::core::CoreTokenIntrospectionResponse,
    openidconnect::core::CoreRevocableToken,
    openidconnect::core::CoreRevocationErrorResponse,
    openidconnect::EndpointSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointMaybeSet,
    openidconnect::EndpointMaybeSet,
>;

/// Build the OIDC client for the configured registration
///
/// Client credentials travel in the request body of token endpoint calls.
/// When `key_set` is given it replaces the JWKS captured at discovery so ID
/// tokens signed with a rotated key still verify.
pub(crate) fn build_oidc_client(
    config: &OidcClientConfig,
    metadata: &ProviderMetadata,
    key_set: Option<&KeySet>,
) -> Result<ConfiguredCoreClient, AuthError> {
    let mut core = metadata.core().clone();
    if let Some(key_set) = key_set {
        core = core.set_jwks(key_set.jwks().clone());
    }

    let redirect_uri = RedirectUrl::new(config.redirect_uri.clone())
        .map_err(|e| AuthError::Internal(format!("Invalid redirect URI: {e:?}")))?;

    Ok(openidconnect::core::CoreClient::from_provider_metadata(
        core,
        ClientId::new(config.client_id.clone()),
        config.client_secret.clone().map(ClientSecret::new),
    )
    .set_redirect_uri(redirect_uri)
    .set_auth_type(AuthType::RequestBody))
}
