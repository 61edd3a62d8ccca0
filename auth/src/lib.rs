//! OIDC authentication gateway for the transcriber API
//!
//! This crate sits between browsers or API clients and the transcriber API:
//!
//! - **Token verification**: bearer access tokens are checked against the
//!   identity provider's published signing keys, fetched through discovery
//!   and cached.
//! - **Gateway middleware**: an Axum middleware that rejects unauthenticated
//!   requests and hands the verified [`types::AuthContext`] to handlers.
//! - **Login flow**: authorization code flow with PKCE, a signed anti-forgery
//!   state and a signed session cookie.
//! - **Refresh**: refresh tokens are exchanged for new access tokens.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use transcriber_auth::provider::{MetadataProvider, OidcMetadataProvider};
//! use transcriber_auth::verifier::TokenVerifier;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider: Arc<dyn MetadataProvider> = Arc::new(OidcMetadataProvider::new(
//!     "https://keycloak.example.com/realms/transcriber",
//!     Duration::from_secs(3600),
//! )?);
//! let verifier = TokenVerifier::new(provider);
//!
//! let auth_ctx = verifier.verify("eyJhbGciOiJSUzI1NiJ9...").await?;
//! println!("Authenticated: {}", auth_ctx.subject);
//! # Ok(())
//! # }
//! ```

/// Core authentication types and traits
pub mod types;

/// Authentication failure classification
pub mod error;

/// OIDC client registration
pub mod config;

/// Provider discovery metadata and signing key set
pub mod provider;

/// Bearer access token verification
pub mod verifier;

/// Signed OAuth state for the login flow
pub mod oauth_state;

/// URL validation utilities for authentication flows
pub mod url_validation;

/// Signed cookie session store
pub mod session;

mod client;

/// Authorization code flow
pub mod flow;

/// Refresh token exchange
pub mod refresh;

/// Axum middleware for HTTP authentication
pub mod axum;

/// Test key pairs, token minting and fake identity providers
#[cfg(feature = "test-utils")]
pub mod test_utils;
