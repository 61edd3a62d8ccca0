//! Login, callback, logout and refresh endpoints

use crate::state::AppState;
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use transcriber_auth::error::AuthError;
use transcriber_auth::flow::CallbackParams;
use transcriber_auth::types::AuthContext;

/// 302 Found to `url`
fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

/// Query parameters for login endpoint
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Application path to land on after login
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Identity of the caller of a protected route
#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub issuer: String,
    pub expires_at: DateTime<Utc>,
}

/// Start the login: redirect to the identity provider
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(query): Query<LoginQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let redirect = state.flow.begin_login(query.return_url.as_deref()).await?;
    let jar = state.sessions.begin_login(jar, &redirect.pending)?;
    Ok((jar, found(redirect.authorization_url.as_str())))
}

/// Callback of the identity provider
///
/// The session cookie is only written once the whole login succeeded.
pub async fn auth_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AuthError> {
    let pending = state.sessions.pending_login(&jar);
    let update = state
        .flow
        .complete_login(params, pending.as_ref())
        .await?;

    let jar = state.sessions.write(jar, &update.session)?;
    let jar = state.sessions.end_login(jar);
    Ok((jar, found(update.redirect_url.as_str())))
}

/// Send the browser to the post-logout page
pub async fn logout(State(state): State<AppState>) -> Response {
    info!("logout");
    found(state.config.post_logout_url())
}

/// Exchange a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    if request.token.is_empty() {
        warn!("refresh requested without a token");
        return Err(AuthError::RefreshFailed);
    }
    let access_token = state.refresher.refresh(&request.token).await?;
    Ok(Json(RefreshResponse { access_token }))
}

/// Identity of the authenticated caller
pub async fn me(Extension(ctx): Extension<AuthContext>) -> Json<UserInfo> {
    Json(UserInfo {
        sub: ctx.subject,
        issuer: ctx.issuer,
        expires_at: ctx.expires_at,
    })
}
