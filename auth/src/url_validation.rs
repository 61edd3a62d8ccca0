//! Post-login return path validation
//!
//! The login endpoint accepts a `return_url` that is appended to the
//! application base after a successful login. Only same-origin relative paths
//! are accepted so the login flow cannot be turned into an open redirect.

use crate::error::AuthError;
use url::Url;

/// Default return path when the login request does not name one
pub const DEFAULT_RETURN_URL: &str = "/";

/// Validate a requested return path and return it unchanged
///
/// Rejected, also after percent-decoding: absolute and protocol-relative URLs,
/// paths not starting with `/`, backslashes and embedded schemes.
pub fn validate_return_url(url: &str) -> Result<&str, AuthError> {
    let decoded = percent_encoding::percent_decode_str(url)
        .decode_utf8()
        .map_err(|_| AuthError::InvalidReturnUrl)?;

    let safe = decoded.starts_with('/')
        && !decoded.starts_with("//")
        && !decoded.contains("://")
        && !decoded.contains('\\')
        && !decoded.chars().any(char::is_control);
    if !safe {
        return Err(AuthError::InvalidReturnUrl);
    }

    let base = Url::parse("http://localhost").map_err(|e| AuthError::Internal(e.to_string()))?;
    match base.join(url) {
        Ok(joined) if joined.host_str() == Some("localhost") => Ok(url),
        _ => Err(AuthError::InvalidReturnUrl),
    }
}
