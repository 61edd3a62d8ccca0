use transcriber_auth::config::OidcClientConfig;

#[test]
fn test_config_parsing_with_defaults() {
    let json = r#"{
        "issuer": "https://keycloak.example.com/realms/transcriber",
        "client_id": "transcriber",
        "redirect_uri": "http://localhost:8000/api/auth",
        "app_redirect_base": "http://localhost:3000"
    }"#;

    let config = OidcClientConfig::from_json(json).expect("Failed to parse config");
    assert_eq!(config.issuer, "https://keycloak.example.com/realms/transcriber");
    assert_eq!(config.client_secret, None);
    assert_eq!(config.scopes, vec!["openid", "profile", "email"]);
    assert_eq!(config.jwks_refresh_interval_secs, 3600); // default
    assert_eq!(config.post_logout_url(), "http://localhost:3000");
}

#[test]
fn test_config_with_custom_values() {
    let json = r#"{
        "issuer": "https://keycloak.example.com/realms/transcriber",
        "client_id": "transcriber",
        "client_secret": "s3cr3t",
        "redirect_uri": "https://api.example.com/api/auth",
        "app_redirect_base": "https://app.example.com",
        "post_logout_redirect_uri": "https://www.example.com/goodbye",
        "scopes": ["openid", "email", "offline_access"],
        "jwks_refresh_interval_secs": 600
    }"#;

    let config = OidcClientConfig::from_json(json).expect("Failed to parse config");
    assert_eq!(config.client_secret.as_deref(), Some("s3cr3t"));
    assert_eq!(config.scopes, vec!["openid", "email", "offline_access"]);
    assert_eq!(config.jwks_refresh_interval_secs, 600);
    assert_eq!(config.post_logout_url(), "https://www.example.com/goodbye");
}

#[test]
fn test_debug_hides_client_secret() {
    let json = r#"{
        "issuer": "https://keycloak.example.com/realms/transcriber",
        "client_id": "transcriber",
        "client_secret": "s3cr3t",
        "redirect_uri": "http://localhost:8000/api/auth",
        "app_redirect_base": "http://localhost:3000"
    }"#;

    let config = OidcClientConfig::from_json(json).expect("Failed to parse config");
    assert!(!format!("{config:?}").contains("s3cr3t"));
}

#[test]
fn test_missing_required_field() {
    let json = r#"{ "issuer": "https://keycloak.example.com/realms/transcriber" }"#;
    let err = OidcClientConfig::from_json(json).unwrap_err();
    assert!(err.to_string().contains("Failed to parse OIDC client config"));
}
