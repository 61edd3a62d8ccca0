use axum::response::Response;
use axum::{extract::Request, middleware::Next};
use std::time::Instant;
use tracing::info;

pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    // path only: the callback query carries the authorization code
    let path = parts.uri.path().to_string();
    info!("request method={} path={path}", parts.method);
    let begin = Instant::now();
    let response = next.run(Request::from_parts(parts, body)).await;
    info!(
        "response status={} path={path} duration_ms={}",
        response.status(),
        begin.elapsed().as_millis()
    );
    response
}
