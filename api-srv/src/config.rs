use anyhow::{Result, bail};
use clap::Parser;
use std::net::SocketAddr;

/// Minimum length of the secret used to sign cookies and login state
pub const MIN_SECRET_KEY_LEN: usize = 32;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000", env = "TRANSCRIBER_LISTEN")]
    pub listen: SocketAddr,

    /// Prefix of the API routes (e.g. "/api", or "" for the root)
    #[arg(long, default_value = "/api", env = "TRANSCRIBER_API_PREFIX")]
    pub api_prefix: String,

    /// Origin of the web application allowed to call the API
    #[arg(long, env = "TRANSCRIBER_CORS_ORIGIN")]
    pub cors_origin: String,

    /// Only send cookies over https
    #[arg(long, env = "TRANSCRIBER_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Domain attribute of the session cookies
    #[arg(long, env = "TRANSCRIBER_COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Secret signing cookies and login state, shared by all instances
    #[arg(long, env = "TRANSCRIBER_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,
}

/// Normalize the API prefix: empty for the root, otherwise `/segment` without trailing slash
pub fn normalize_api_prefix(prefix: &str) -> Result<String> {
    let prefix = prefix.trim_end_matches('/');
    if !prefix.is_empty() && !prefix.starts_with('/') {
        bail!("API prefix must start with '/' (e.g., '/api')");
    }
    Ok(prefix.to_string())
}

pub fn validate_secret_key(secret: &str) -> Result<&[u8]> {
    if secret.len() < MIN_SECRET_KEY_LEN {
        bail!(
            "TRANSCRIBER_SECRET_KEY must be at least {MIN_SECRET_KEY_LEN} bytes (e.g., openssl rand -base64 32)"
        );
    }
    Ok(secret.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_api_prefix() {
        assert_eq!(normalize_api_prefix("/api").expect("prefix"), "/api");
        assert_eq!(normalize_api_prefix("/api/").expect("prefix"), "/api");
        assert_eq!(normalize_api_prefix("/").expect("prefix"), "");
        assert_eq!(normalize_api_prefix("").expect("prefix"), "");
        assert!(normalize_api_prefix("api").is_err());
    }

    #[test]
    fn test_secret_key_length() {
        assert!(validate_secret_key("too-short").is_err());
        assert!(validate_secret_key(&"x".repeat(MIN_SECRET_KEY_LEN)).is_ok());
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from([
            "transcriber-api-srv",
            "--cors-origin",
            "http://localhost:3000",
            "--secret-key",
            "0123456789abcdef0123456789abcdef",
            "--secure-cookies",
        ])
        .expect("parse args");
        assert_eq!(args.listen, "0.0.0.0:8000".parse().expect("addr"));
        assert_eq!(args.api_prefix, "/api");
        assert!(args.secure_cookies);
        assert_eq!(args.cookie_domain, None);
    }
}
