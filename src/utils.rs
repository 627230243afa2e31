//! Utility functions for SCIM responses

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};

use crate::config::ServerConfig;

/// Route prefix shared by every SCIM endpoint.
pub const SCIM_ROUTE_PREFIX: &str = "/v1-scim";

/// Formats a DateTime to SCIM 2.0 compliant XSD dateTime format
///
/// Example output: "2025-06-14T10:03:54.374Z"
pub fn format_scim_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Scheme and authority of the externally visible server address.
///
/// The configured `base_url` wins. Otherwise the scheme comes from
/// `X-Forwarded-Proto` (default `http`) and the authority from `Host`.
pub fn request_base_url(server: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(base_url) = server.base_url.as_deref().filter(|b| !b.is_empty()) {
        return base_url.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}", scheme, host)
}

/// `<base>/v1-scim/<provider>/<endpoint>/<id>`
pub fn resource_location(base_url: &str, provider: &str, endpoint: &str, id: &str) -> String {
    format!(
        "{}{}/{}/{}/{}",
        base_url, SCIM_ROUTE_PREFIX, provider, endpoint, id
    )
}

/// Unicode case folding used for userName, displayName and filter comparisons.
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// Case-insensitive equality over the full Unicode range.
pub fn eq_fold(a: &str, b: &str) -> bool {
    a == b || fold_case(a) == fold_case(b)
}
