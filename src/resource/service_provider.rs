use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Serialize;

use super::scim_response;
use crate::error::AppResult;
use crate::models::SCIM_SCHEMA_SERVICE_PROVIDER_CONFIG;
use crate::startup::AppState;
use crate::utils::{request_base_url, SCIM_ROUTE_PREFIX};

/// Upper bound advertised for filtered list responses.
pub const MAX_FILTER_RESULTS: usize = 1000;

#[derive(Debug, Serialize)]
pub struct Supported {
    pub supported: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bulk {
    pub supported: bool,
    pub max_operations: usize,
    pub max_payload_size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSupport {
    pub supported: bool,
    pub max_results: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationScheme {
    #[serde(rename = "type")]
    pub scheme_type: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub spec_uri: &'static str,
    pub primary: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderMeta {
    pub resource_type: &'static str,
    pub location: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProviderConfig {
    pub schemas: Vec<&'static str>,
    pub patch: Supported,
    pub bulk: Bulk,
    pub filter: FilterSupport,
    pub change_password: Supported,
    pub sort: Supported,
    pub etag: Supported,
    pub authentication_schemes: Vec<AuthenticationScheme>,
    pub meta: ServiceProviderMeta,
}

fn bearer_token_scheme() -> AuthenticationScheme {
    AuthenticationScheme {
        scheme_type: "oauthbearertoken",
        name: "OAuth Bearer Token",
        description: "Authentication using a provider-scoped bearer token",
        spec_uri: "https://tools.ietf.org/html/rfc6750",
        primary: true,
    }
}

pub async fn service_provider_config(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let base_url = request_base_url(&state.config.server, &headers);

    let config = ServiceProviderConfig {
        schemas: vec![SCIM_SCHEMA_SERVICE_PROVIDER_CONFIG],
        patch: Supported { supported: true },
        bulk: Bulk {
            supported: false,
            max_operations: 0,
            max_payload_size: 0,
        },
        filter: FilterSupport {
            supported: true,
            max_results: MAX_FILTER_RESULTS,
        },
        change_password: Supported { supported: false },
        sort: Supported { supported: false },
        etag: Supported { supported: false },
        authentication_schemes: vec![bearer_token_scheme()],
        meta: ServiceProviderMeta {
            resource_type: "ServiceProviderConfig",
            location: format!(
                "{}{}/{}/ServiceProviderConfig",
                base_url, SCIM_ROUTE_PREFIX, provider
            ),
        },
    };

    Ok(scim_response(StatusCode::OK, &config))
}
