//! Browser session bound to the tokens obtained at login
//!
//! There is no server-side session table: the record lives in a signed,
//! HTTP-only cookie, so any instance sharing the signing key can read it.

use crate::error::AuthError;
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Cookie names
pub const SESSION_COOKIE: &str = "session";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const SESSION_MAX_AGE_SECS: i64 = 14 * 24 * 3600;
const LOGIN_STATE_MAX_AGE_SECS: i64 = 600;

/// Tokens bound to a browser session
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("access_token", &"(not printed)")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Login in progress, kept in the `oauth_state` cookie until the callback
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingLogin {
    /// Anti-forgery nonce, also embedded in the signed `state` parameter
    pub nonce: String,
    /// PKCE code verifier, never sent through the browser URL
    pub pkce_verifier: String,
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("nonce", &self.nonce)
            .field("pkce_verifier", &"(not printed)")
            .finish()
    }
}

/// Cookie-backed session store
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    /// Cookie domain (optional)
    pub cookie_domain: Option<String>,
    /// Only send cookies over https
    pub secure_cookies: bool,
}

impl SessionStore {
    pub fn new(cookie_domain: Option<String>, secure_cookies: bool) -> Self {
        Self {
            cookie_domain,
            secure_cookies,
        }
    }

    fn cookie(&self, name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
        let mut cookie = Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(max_age_secs));

        if let Some(domain) = &self.cookie_domain {
            cookie = cookie.domain(domain.clone());
        }

        cookie.build()
    }

    /// Bind the session to `record`, replacing any previous one
    pub fn write(
        &self,
        jar: SignedCookieJar,
        record: &SessionRecord,
    ) -> Result<SignedCookieJar, AuthError> {
        let json = serde_json::to_vec(record)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize session: {e}")))?;
        let value = URL_SAFE_NO_PAD.encode(json);
        Ok(jar.add(self.cookie(SESSION_COOKIE, value, SESSION_MAX_AGE_SECS)))
    }

    /// Session record of the request, if the cookie is present and its signature valid
    pub fn read(&self, jar: &SignedCookieJar) -> Option<SessionRecord> {
        let cookie = jar.get(SESSION_COOKIE)?;
        let json = URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Remember a login in progress
    pub fn begin_login(
        &self,
        jar: SignedCookieJar,
        pending: &PendingLogin,
    ) -> Result<SignedCookieJar, AuthError> {
        let json = serde_json::to_vec(pending)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize login state: {e}")))?;
        let value = URL_SAFE_NO_PAD.encode(json);
        Ok(jar.add(self.cookie(OAUTH_STATE_COOKIE, value, LOGIN_STATE_MAX_AGE_SECS)))
    }

    /// Login in progress, if the cookie is present and its signature valid
    pub fn pending_login(&self, jar: &SignedCookieJar) -> Option<PendingLogin> {
        let cookie = jar.get(OAUTH_STATE_COOKIE)?;
        let json = URL_SAFE_NO_PAD.decode(cookie.value()).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// Forget the login in progress
    pub fn end_login(&self, jar: SignedCookieJar) -> SignedCookieJar {
        jar.remove(self.cookie(OAUTH_STATE_COOKIE, String::new(), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Key;

    fn jar() -> SignedCookieJar {
        SignedCookieJar::new(Key::generate())
    }

    #[test]
    fn test_session_round_trip() {
        let store = SessionStore::default();
        let record = SessionRecord {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
        };
        let jar = store.write(jar(), &record).expect("write session");
        assert_eq!(store.read(&jar), Some(record));
    }

    #[test]
    fn test_rewrite_overwrites_session() {
        let store = SessionStore::default();
        let first = SessionRecord {
            access_token: "first".to_string(),
            refresh_token: Some("refresh".to_string()),
        };
        let second = SessionRecord {
            access_token: "second".to_string(),
            refresh_token: None,
        };
        let jar = store.write(jar(), &first).expect("write session");
        let jar = store.write(jar, &second).expect("rewrite session");
        assert_eq!(store.read(&jar), Some(second));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let store = SessionStore::new(Some(".example.com".to_string()), true);
        let cookie = store.cookie(SESSION_COOKIE, "v".to_string(), 60);
        assert!(cookie.http_only().unwrap_or(false));
        assert!(cookie.secure().unwrap_or(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        // cookie library strips the leading dot
        assert_eq!(cookie.domain(), Some("example.com"));
    }

    #[test]
    fn test_pending_login_lifecycle() {
        let store = SessionStore::default();
        let pending = PendingLogin {
            nonce: "nonce-1".to_string(),
            pkce_verifier: "verifier-1".to_string(),
        };
        let jar = store.begin_login(jar(), &pending).expect("begin login");
        assert_eq!(store.pending_login(&jar), Some(pending));
        let jar = store.end_login(jar);
        assert_eq!(store.pending_login(&jar), None);
    }

    #[test]
    fn test_pending_login_debug_hides_verifier() {
        let pending = PendingLogin {
            nonce: "nonce-1".to_string(),
            pkce_verifier: "verifier-1".to_string(),
        };
        assert!(!format!("{pending:?}").contains("verifier-1"));
    }

    #[test]
    fn test_record_debug_hides_tokens() {
        let record = SessionRecord {
            access_token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
        };
        let printed = format!("{record:?}");
        assert!(!printed.contains("secret"));
    }
}
