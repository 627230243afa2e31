use axum::{extract::Request, http::header, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// One access-log line per request under the `access_log` target.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_agent = header_or_dash(&request, header::USER_AGENT.as_str());
    let remote_addr = request
        .headers()
        .get("x-forwarded-for")
        .or_else(|| request.headers().get("x-real-ip"))
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    info!(
        target: "access_log",
        remote_addr = %remote_addr,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        user_agent = %user_agent,
        "{} {} {}",
        method,
        uri.path(),
        response.status().as_u16()
    );

    response
}

fn header_or_dash(request: &Request, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("-")
        .to_string()
}
