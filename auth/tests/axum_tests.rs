use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Extension, Request},
    http::{StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE},
    response::Response,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tower::ServiceExt;
use transcriber_auth::{
    axum::auth_middleware,
    test_utils::{StaticMetadataProvider, TestKeyPair, create_expired_token, create_valid_token},
    types::{AuthContext, AuthProvider},
    verifier::TokenVerifier,
};

const ISSUER: &str = "https://idp.example.com/realms/transcriber";

fn app(provider: Arc<StaticMetadataProvider>) -> Router {
    let verifier: Arc<dyn AuthProvider> = Arc::new(TokenVerifier::new(provider));
    Router::new()
        .route(
            "/protected",
            axum::routing::get(|Extension(ctx): Extension<AuthContext>| async move {
                axum::Json(json!({ "sub": ctx.subject, "issuer": ctx.issuer }))
            }),
        )
        .layer(axum::middleware::from_fn(move |req, next| {
            auth_middleware(verifier.clone(), req, next)
        }))
}

async fn call(app: Router, authorization: Option<&str>) -> Response {
    let mut request = Request::builder().uri("/protected");
    if let Some(value) = authorization {
        request = request.header(AUTHORIZATION, value);
    }
    app.oneshot(request.body(Body::empty()).expect("build request"))
        .await
        .expect("call service")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn assert_not_authenticated(response: Response) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );
    assert_eq!(
        json_body(response).await,
        json!({ "detail": "You are not authenticated." })
    );
}

#[tokio::test]
async fn test_valid_token_reaches_handler() {
    let keypair = TestKeyPair::generate("key-1");
    let provider = Arc::new(StaticMetadataProvider::new(ISSUER, &[&keypair]));
    let token = create_valid_token(&keypair, ISSUER, "alice");

    let response = call(app(provider), Some(&format!("Bearer {token}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "sub": "alice", "issuer": ISSUER })
    );
}

#[tokio::test]
async fn test_missing_header_never_contacts_provider() {
    let keypair = TestKeyPair::generate("key-1");
    let provider = Arc::new(StaticMetadataProvider::new(ISSUER, &[&keypair]));

    assert_not_authenticated(call(app(provider.clone()), None).await).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme() {
    let keypair = TestKeyPair::generate("key-1");
    let provider = Arc::new(StaticMetadataProvider::new(ISSUER, &[&keypair]));

    assert_not_authenticated(call(app(provider.clone()), Some("Basic dXNlcjpwYXNz")).await).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejections_are_indistinguishable() {
    let keypair = TestKeyPair::generate("key-1");
    let rogue = TestKeyPair::generate("rogue");
    let provider = Arc::new(StaticMetadataProvider::new(ISSUER, &[&keypair]));

    let tokens = [
        create_expired_token(&keypair, ISSUER, "alice"),
        create_valid_token(&rogue, ISSUER, "mallory"),
        create_valid_token(&keypair, "https://other-idp.example.com", "alice"),
        "garbage".to_string(),
    ];
    for token in tokens {
        let response = call(app(provider.clone()), Some(&format!("Bearer {token}"))).await;
        assert_not_authenticated(response).await;
    }
}
